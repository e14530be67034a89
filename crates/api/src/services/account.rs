//! Account service: identity lookups, per-tenant accounts and admin accounts.

use serde_json::Value;
use tracing::{info, instrument};

use flagplane_account::{Account, AccountCommand, AdminAccount, ChangeAccountRole, CreateAccount};
use flagplane_auth::{Editor, Role, validate_email};
use flagplane_core::{TenantId, Violation};
use flagplane_events::EventPublisher;
use flagplane_infra::ProjectDirectory;
use flagplane_infra::storage::{Database, Filter, ListQuery, Repository, StorageError};

use crate::context::RequestContext;
use crate::cursor::{ListOptions, ListResponse, parse_cursor, parse_order};
use crate::error::{Conflict, ServiceError, storage_failure};
use crate::pipeline::{Applied, Pipeline, create_in, update_in};
use crate::resolver::{IdentityProjection, RoleResolver};
use crate::services::require_environment;

const ORDER_COLUMNS: &[&str] = &["email", "created_at", "updated_at"];
const SEARCH_COLUMNS: &[&str] = &["email"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountRequest {
    pub command: Option<CreateAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListAdminAccountsRequest {
    pub options: ListOptions,
    pub disabled: Option<bool>,
}

pub struct AccountService<D, Dir, P> {
    pipeline: Pipeline<D, P>,
    resolver: RoleResolver<D, Dir>,
}

impl<D, Dir, P> AccountService<D, Dir, P>
where
    D: Database + Clone,
    Dir: ProjectDirectory,
    P: EventPublisher,
{
    pub fn new(db: D, directory: Dir, publisher: P) -> Self {
        Self {
            pipeline: Pipeline::new(db.clone(), publisher),
            resolver: RoleResolver::new(db, directory),
        }
    }

    pub fn resolver(&self) -> &RoleResolver<D, Dir> {
        &self.resolver
    }

    // ── identity ────────────────────────────────────────────────────────────

    /// The caller's own identity projection.
    pub async fn get_me(&self, ctx: &RequestContext) -> Result<IdentityProjection, ServiceError> {
        let email = self.resolver.authenticate(ctx)?;
        validate_email(email)?;
        self.resolver.resolve(email).await
    }

    /// Identity projection of another account; admin callers only.
    pub async fn get_me_by_email(&self, ctx: &RequestContext, email: &str) -> Result<IdentityProjection, ServiceError> {
        self.resolver.require_admin(ctx).await?;
        validate_email(email)?;
        self.resolver.resolve(email).await
    }

    // ── per-tenant accounts ─────────────────────────────────────────────────

    #[instrument(skip_all, fields(tenant = %tenant))]
    pub async fn create_account(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        request: CreateAccountRequest,
    ) -> Result<Account, ServiceError> {
        let editor = self.resolver.require_role(ctx, tenant, Role::Owner).await?;
        require_environment(tenant)?;
        let create = request.command.ok_or(Violation::NoCommand)?;
        let account = Account::empty(&create.email);
        let command = AccountCommand::Create(create);
        command.validate()?;

        self.pipeline
            .create(&editor, tenant, account, &command)
            .await
            .map_err(email_conflict)
    }

    pub async fn change_account_role(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
        role: Role,
    ) -> Result<Account, ServiceError> {
        self.update_account(ctx, tenant, id, AccountCommand::ChangeRole(ChangeAccountRole { role }))
            .await
    }

    pub async fn enable_account(&self, ctx: &RequestContext, tenant: &TenantId, id: &str) -> Result<Account, ServiceError> {
        self.update_account(ctx, tenant, id, AccountCommand::Enable).await
    }

    pub async fn disable_account(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Account, ServiceError> {
        self.update_account(ctx, tenant, id, AccountCommand::Disable).await
    }

    pub async fn delete_account(&self, ctx: &RequestContext, tenant: &TenantId, id: &str) -> Result<(), ServiceError> {
        self.update_account(ctx, tenant, id, AccountCommand::Delete).await?;
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(tenant = %tenant))]
    async fn update_account(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
        command: AccountCommand,
    ) -> Result<Account, ServiceError> {
        let editor = self.resolver.require_role(ctx, tenant, Role::Owner).await?;
        require_environment(tenant)?;
        if id.is_empty() {
            return Err(Violation::IdRequired.into());
        }
        command.validate()?;
        self.pipeline.update::<Account>(&editor, tenant, id, &[command]).await
    }

    // ── admin accounts ──────────────────────────────────────────────────────

    /// Create a global admin account.
    ///
    /// The email must not already belong to an admin account or to a
    /// per-tenant account in any environment.
    #[instrument(skip_all)]
    pub async fn create_admin_account(
        &self,
        ctx: &RequestContext,
        request: CreateAccountRequest,
    ) -> Result<AdminAccount, ServiceError> {
        let editor = self.resolver.require_admin(ctx).await?;
        let create = request.command.ok_or(Violation::NoCommand)?;
        let admin = AdminAccount::empty(&create.email);
        let command = AccountCommand::Create(create);
        command.validate()?;

        self.ensure_no_tenant_accounts(admin.email()).await?;
        self.pipeline
            .create(&editor, &TenantId::global(), admin, &command)
            .await
            .map_err(email_conflict)
    }

    pub async fn enable_admin_account(&self, ctx: &RequestContext, id: &str) -> Result<AdminAccount, ServiceError> {
        self.update_admin_account(ctx, id, AccountCommand::Enable).await
    }

    pub async fn disable_admin_account(&self, ctx: &RequestContext, id: &str) -> Result<AdminAccount, ServiceError> {
        self.update_admin_account(ctx, id, AccountCommand::Disable).await
    }

    pub async fn get_admin_account(&self, ctx: &RequestContext, id: &str) -> Result<AdminAccount, ServiceError> {
        self.resolver.require_admin(ctx).await?;
        validate_email(id)?;
        let global = TenantId::global();
        let mut conn = self.pipeline.database().connection().await?;
        conn.get(&global, id).await.map_err(|err| storage_failure(err, &global, id))
    }

    pub async fn list_admin_accounts(
        &self,
        ctx: &RequestContext,
        request: &ListAdminAccountsRequest,
    ) -> Result<ListResponse<AdminAccount>, ServiceError> {
        self.resolver.require_admin(ctx).await?;
        let options = &request.options;
        let offset = parse_cursor(&options.cursor)?;
        let order = parse_order(&options.order_by, options.direction, ORDER_COLUMNS)?;

        let mut query = ListQuery::new(TenantId::global())
            .order_by(order)
            .page(options.page_size, offset);
        if let Some(disabled) = request.disabled {
            query = query.filter(Filter::Eq("disabled", Value::Bool(disabled)));
        }
        if !options.search_keyword.is_empty() {
            query = query.filter(Filter::Search {
                columns: SEARCH_COLUMNS.to_vec(),
                keyword: options.search_keyword.clone(),
            });
        }

        let mut conn = self.pipeline.database().connection().await?;
        let page = conn
            .list::<AdminAccount>(&query)
            .await
            .map_err(|err| storage_failure(err, &query.tenant, ""))?;
        Ok(page.into())
    }

    /// Replace every per-tenant account of `email` with one admin account,
    /// in a single transaction.
    #[instrument(skip(self, ctx))]
    pub async fn convert_account(&self, ctx: &RequestContext, email: &str) -> Result<AdminAccount, ServiceError> {
        let editor = self.resolver.require_admin(ctx).await?;
        validate_email(email)?;
        let environments = self.resolver.directory().list_environments().await?;

        let mut scope = self.pipeline.begin().await?;
        let outcome = convert_in(scope.repository(), &editor, &environments, email).await;
        let admin = self.pipeline.complete(scope, outcome).await?;
        info!(email, "account converted to admin account");
        Ok(admin)
    }

    async fn update_admin_account(
        &self,
        ctx: &RequestContext,
        id: &str,
        command: AccountCommand,
    ) -> Result<AdminAccount, ServiceError> {
        let editor = self.resolver.require_admin(ctx).await?;
        validate_email(id)?;
        self.pipeline
            .update::<AdminAccount>(&editor, &TenantId::global(), id, &[command])
            .await
    }

    async fn ensure_no_tenant_accounts(&self, email: &str) -> Result<(), ServiceError> {
        let environments = self.resolver.directory().list_environments().await?;
        let mut conn = self.pipeline.database().connection().await?;

        let global = TenantId::global();
        match conn.get::<AdminAccount>(&global, email).await {
            Ok(_) => return Err(ServiceError::AlreadyExists(Conflict::Email)),
            Err(StorageError::NotFound) => {}
            Err(err) => return Err(storage_failure(err, &global, email)),
        }
        for env in environments {
            let tenant = TenantId::new(env.id);
            match conn.get::<Account>(&tenant, email).await {
                Ok(_) => return Err(ServiceError::AlreadyExists(Conflict::Email)),
                Err(StorageError::NotFound) => {}
                Err(err) => return Err(storage_failure(err, &tenant, email)),
            }
        }
        Ok(())
    }
}

async fn convert_in<R: Repository>(
    repo: &mut R,
    editor: &Editor,
    environments: &[flagplane_account::Environment],
    email: &str,
) -> Result<Applied<AdminAccount>, ServiceError> {
    let mut events = Vec::new();
    for env in environments {
        let tenant = TenantId::new(env.id.as_str());
        match update_in::<Account, _>(repo, editor, &tenant, email, &[AccountCommand::Delete]).await {
            Ok(deleted) => events.extend(deleted.events),
            Err(ServiceError::NotFound) => continue,
            Err(err) => return Err(err),
        }
    }
    if events.is_empty() {
        return Err(ServiceError::NotFound);
    }

    let command = AccountCommand::Create(CreateAccount {
        email: email.to_string(),
        role: Role::Owner,
    });
    let created = create_in(repo, editor, &TenantId::global(), AdminAccount::empty(email), &command)
        .await
        .map_err(email_conflict)?;
    events.extend(created.events);

    Ok(Applied {
        value: created.value,
        events,
    })
}

fn email_conflict(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::AlreadyExists(_) => ServiceError::AlreadyExists(Conflict::Email),
        other => other,
    }
}
