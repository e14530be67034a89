#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use flagplane_account::{Account, AccountCommand, AdminAccount, CreateAccount, Environment, Project};
use flagplane_api::services::{AccountService, ExperimentService, PushService};
use flagplane_api::{Locale, RequestContext};
use flagplane_auth::{IdToken, Role};
use flagplane_core::TenantId;
use flagplane_events::{DomainEvent, InMemoryEventBus, Subscription, execute};
use flagplane_infra::StorageDirectory;
use flagplane_infra::storage::{Database, InMemoryDatabase, Repository};

pub const ADMIN: &str = "root@example.com";

pub type Directory = StorageDirectory<InMemoryDatabase>;
pub type Bus = Arc<InMemoryEventBus>;

pub struct Harness {
    pub db: InMemoryDatabase,
    pub bus: Bus,
    pub pushes: PushService<InMemoryDatabase, Directory, Bus>,
    pub experiments: ExperimentService<InMemoryDatabase, Directory, Bus>,
    pub accounts: AccountService<InMemoryDatabase, Directory, Bus>,
}

impl Harness {
    /// Empty store with one admin account and no projects.
    pub async fn new() -> Self {
        let db = InMemoryDatabase::new();
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let harness = Self {
            pushes: PushService::new(db.clone(), StorageDirectory::new(db.clone()), Arc::clone(&bus)),
            experiments: ExperimentService::new(db.clone(), StorageDirectory::new(db.clone()), Arc::clone(&bus)),
            accounts: AccountService::new(db.clone(), StorageDirectory::new(db.clone()), Arc::clone(&bus)),
            db,
            bus,
        };
        harness.seed_admin(ADMIN).await;
        harness
    }

    pub fn subscribe(&self) -> Subscription<DomainEvent> {
        self.bus.subscribe()
    }

    pub async fn seed_project(&self, id: &str, disabled: bool, trial: bool) {
        let project = Project {
            id: id.into(),
            name: format!("Project {id}"),
            disabled,
            trial,
            created_at: project_created_at(),
        };
        let mut conn = self.db.connection().await.unwrap();
        conn.create(&TenantId::global(), &project).await.unwrap();
    }

    pub async fn seed_environment(&self, id: &str, project_id: &str) {
        let environment = Environment {
            id: id.into(),
            name: format!("Env {id}"),
            project_id: project_id.into(),
        };
        let mut conn = self.db.connection().await.unwrap();
        conn.create(&TenantId::global(), &environment).await.unwrap();
    }

    pub async fn seed_account(&self, tenant: &str, email: &str, role: Role) {
        let mut account = Account::empty(email);
        execute(&mut account, &create(email, role)).unwrap();
        let mut conn = self.db.connection().await.unwrap();
        conn.create(&TenantId::new(tenant), &account).await.unwrap();
    }

    pub async fn seed_admin(&self, email: &str) {
        let mut admin = AdminAccount::empty(email);
        execute(&mut admin, &create(email, Role::Owner)).unwrap();
        let mut conn = self.db.connection().await.unwrap();
        conn.create(&TenantId::global(), &admin).await.unwrap();
    }
}

pub fn create(email: &str, role: Role) -> AccountCommand {
    AccountCommand::Create(CreateAccount {
        email: email.into(),
        role,
    })
}

pub fn project_created_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
}

pub fn ctx(email: &str) -> RequestContext {
    let now = Utc::now();
    RequestContext::authenticated(
        IdToken {
            email: email.into(),
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        },
        Locale::JaJp,
    )
}

pub fn admin() -> RequestContext {
    ctx(ADMIN)
}

pub fn ns(tenant: &str) -> TenantId {
    TenantId::new(tenant)
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
