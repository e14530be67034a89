mod common;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use flagplane_api::pipeline::update_in;
use flagplane_api::services::{CreatePushRequest, PushService, UpdatePushRequest};
use flagplane_api::{Pipeline, ServiceError};
use flagplane_auth::{Editor, Role};
use flagplane_core::{AggregateRoot, TenantId};
use flagplane_infra::StorageDirectory;
use flagplane_infra::storage::{
    Database, InMemoryConnection, InMemoryDatabase, InMemoryTransaction, ListQuery, Page, Record, Repository,
    StorageError, Transaction,
};
use flagplane_push::{CreatePush, Push, PushCommand, RenamePush};

use common::{ADMIN, Harness, admin, ns, strings};

fn rename(name: &str) -> Vec<PushCommand> {
    vec![PushCommand::Rename(RenamePush { name: name.into() })]
}

async fn seeded_push(h: &Harness) -> Push {
    h.seed_project("p1", false, false).await;
    h.seed_environment("ns1", "p1").await;
    h.pushes
        .create_push(
            &admin(),
            &ns("ns1"),
            CreatePushRequest {
                command: Some(CreatePush {
                    name: "n1".into(),
                    delivery_key: "k1".into(),
                    tags: strings(&["t1"]),
                }),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn second_writer_at_same_version_loses() {
    let h = Harness::new().await;
    let push = seeded_push(&h).await;
    let id = push.id().as_str().to_string();
    let ns1 = ns("ns1");
    let pipeline = Pipeline::new(h.db.clone(), Arc::clone(&h.bus));
    let editor = Editor::new(ADMIN, Role::Owner, true);
    let events = h.subscribe();

    let mut first = pipeline.begin().await.unwrap();
    let mut second = pipeline.begin().await.unwrap();
    let a = update_in::<Push, _>(first.repository(), &editor, &ns1, &id, &rename("a")).await;
    let b = update_in::<Push, _>(second.repository(), &editor, &ns1, &id, &rename("b")).await;
    assert_eq!(a.as_ref().unwrap().value.version(), push.version() + 1);
    assert_eq!(b.as_ref().unwrap().value.version(), push.version() + 1);

    let winner = pipeline.complete(first, a).await.unwrap();
    assert_eq!(pipeline.complete(second, b).await.unwrap_err(), ServiceError::NotFound);

    let stored = h.pushes.get_push(&admin(), &ns1, &id).await.unwrap();
    assert_eq!(stored, winner);
    assert_eq!(stored.name(), "a");
    assert_eq!(events.drain().len(), 1);
}

#[tokio::test]
async fn concurrent_updates_commit_exactly_once() {
    let h = Harness::new().await;
    let push = seeded_push(&h).await;
    let id = push.id().as_str().to_string();
    let ns1 = ns("ns1");
    let ctx = admin();

    let update = |name: &str| UpdatePushRequest {
        id: id.clone(),
        commands: rename(name),
    };
    let (a, b) = tokio::join!(
        h.pushes.update_push(&ctx, &ns1, update("a")),
        h.pushes.update_push(&ctx, &ns1, update("b")),
    );

    let outcomes = [a, b];
    let committed: Vec<&Push> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(committed.len(), 1);
    assert!(outcomes.iter().any(|r| r.as_ref().err() == Some(&ServiceError::NotFound)));

    let stored = h.pushes.get_push(&ctx, &ns1, &id).await.unwrap();
    assert_eq!(stored.version(), push.version() + 1);
    assert_eq!(&stored, committed[0]);
}

/// Store whose commits park until released, reporting when one is reached.
#[derive(Clone)]
struct GatedDatabase {
    inner: InMemoryDatabase,
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

struct GatedTransaction {
    inner: InMemoryTransaction,
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Database for GatedDatabase {
    type Connection = InMemoryConnection;
    type Transaction = GatedTransaction;

    async fn connection(&self) -> Result<Self::Connection, StorageError> {
        self.inner.connection().await
    }

    async fn begin(&self) -> Result<Self::Transaction, StorageError> {
        Ok(GatedTransaction {
            inner: self.inner.begin().await?,
            reached: Arc::clone(&self.reached),
            release: Arc::clone(&self.release),
        })
    }
}

#[async_trait]
impl Repository for GatedTransaction {
    async fn get<R: Record>(&mut self, tenant: &TenantId, id: &str) -> Result<R, StorageError> {
        self.inner.get(tenant, id).await
    }

    async fn list<R: Record>(&mut self, query: &ListQuery) -> Result<Page<R>, StorageError> {
        self.inner.list(query).await
    }

    async fn create<R: Record>(&mut self, tenant: &TenantId, record: &R) -> Result<(), StorageError> {
        self.inner.create(tenant, record).await
    }

    async fn update<R: Record>(
        &mut self,
        tenant: &TenantId,
        record: &R,
        expected_version: u64,
    ) -> Result<(), StorageError> {
        self.inner.update(tenant, record, expected_version).await
    }
}

#[async_trait]
impl Transaction for GatedTransaction {
    async fn commit(self) -> Result<(), StorageError> {
        self.reached.notify_one();
        self.release.notified().await;
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn cancelled_create_leaves_nothing_behind() {
    let h = Harness::new().await;
    h.seed_project("p1", false, false).await;
    h.seed_environment("ns1", "p1").await;
    let events = h.subscribe();

    let gated = GatedDatabase {
        inner: h.db.clone(),
        reached: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
    };
    let service = Arc::new(PushService::new(
        gated.clone(),
        StorageDirectory::new(h.db.clone()),
        Arc::clone(&h.bus),
    ));

    let task = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let request = CreatePushRequest {
                command: Some(CreatePush {
                    name: "n1".into(),
                    delivery_key: "k1".into(),
                    tags: strings(&["t1"]),
                }),
            };
            service.create_push(&admin(), &ns("ns1"), request).await
        })
    };

    gated.reached.notified().await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert_eq!(h.db.row_count("pushes").unwrap(), 0);
    assert!(events.drain().is_empty());

    // Nothing was reserved: the same key and tag are still free.
    let listed = h.pushes.list_pushes(&admin(), &ns("ns1"), &Default::default()).await.unwrap();
    assert_eq!(listed.total_count, 0);
    h.pushes
        .create_push(
            &admin(),
            &ns("ns1"),
            CreatePushRequest {
                command: Some(CreatePush {
                    name: "n1".into(),
                    delivery_key: "k1".into(),
                    tags: strings(&["t1"]),
                }),
            },
        )
        .await
        .unwrap();
}
