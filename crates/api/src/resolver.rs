//! Caller identity: authorization checks on the write path and the merged
//! admin / per-tenant identity projection on the read path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};

use flagplane_account::{Account, AdminAccount, Environment, Project};
use flagplane_auth::{AuthError, Editor, Role, authorize, validate_token};
use flagplane_core::TenantId;
use flagplane_infra::ProjectDirectory;
use flagplane_infra::storage::{Database, Repository, StorageError};

use crate::context::RequestContext;
use crate::error::{ServiceError, storage_failure};

/// Role held in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRole {
    pub environment: Environment,
    pub role: Role,
    pub trial: bool,
    /// Creation time of the owning project, for trial projects only.
    pub trial_started_at: Option<DateTime<Utc>>,
}

impl TenantRole {
    fn new(environment: &Environment, project: &Project, role: Role) -> Self {
        Self {
            environment: environment.clone(),
            role,
            trial: project.trial,
            trial_started_at: project.trial.then_some(project.created_at),
        }
    }
}

/// What a caller may do, merged across every tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProjection {
    pub email: String,
    pub is_admin: bool,
    /// The admin's global role; `Unassigned` for non-admins.
    pub admin_role: Role,
    /// The admin account, or the last matched per-tenant account.
    pub account: Account,
    pub tenant_roles: Vec<TenantRole>,
}

#[derive(Debug, Clone)]
pub struct RoleResolver<D, Dir> {
    db: D,
    directory: Dir,
}

impl<D, Dir> RoleResolver<D, Dir>
where
    D: Database,
    Dir: ProjectDirectory,
{
    pub fn new(db: D, directory: Dir) -> Self {
        Self { db, directory }
    }

    pub fn directory(&self) -> &Dir {
        &self.directory
    }

    /// The caller's email, if the request carries a currently valid token.
    pub fn authenticate<'a>(&self, ctx: &'a RequestContext) -> Result<&'a str, ServiceError> {
        let token = ctx.id_token().ok_or(ServiceError::Unauthenticated)?;
        validate_token(token, Utc::now()).map_err(|err| {
            debug!(error = %err, "rejected id token");
            ServiceError::Unauthenticated
        })?;
        Ok(&token.email)
    }

    /// Require `required` in `tenant`. A live admin passes everywhere.
    #[instrument(skip_all, fields(tenant = %tenant, required = %required))]
    pub async fn require_role(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        required: Role,
    ) -> Result<Editor, ServiceError> {
        let email = self.authenticate(ctx)?;
        Ok(self.check_role(email, tenant, required).await?)
    }

    /// Require a live admin account.
    pub async fn require_admin(&self, ctx: &RequestContext) -> Result<Editor, ServiceError> {
        let email = self.authenticate(ctx)?;
        let mut conn = self.db.connection().await?;
        match find_admin(&mut conn, email).await? {
            Some(admin) => Ok(Editor::new(email, admin.role(), true)),
            None => Err(ServiceError::PermissionDenied),
        }
    }

    async fn check_role(&self, email: &str, tenant: &TenantId, required: Role) -> Result<Editor, AuthError> {
        let mut conn = self.db.connection().await.map_err(lookup_failed)?;

        if let Some(admin) = find_admin(&mut conn, email).await.map_err(lookup_failed)? {
            authorize(admin.role(), required)?;
            return Ok(Editor::new(email, admin.role(), true));
        }
        if tenant.is_global() {
            return Err(AuthError::PermissionDenied);
        }

        let account: Account = match conn.get(tenant, email).await {
            Ok(account) => account,
            Err(StorageError::NotFound) => return Err(AuthError::PermissionDenied),
            Err(err) => return Err(lookup_failed(err)),
        };
        if !account.is_live() {
            return Err(AuthError::PermissionDenied);
        }
        authorize(account.role(), required)?;
        Ok(Editor::new(email, account.role(), false))
    }

    /// Resolve the identity projection for `email`.
    ///
    /// Projects and environments are fetched on every call. Environments of
    /// disabled projects are ignored.
    #[instrument(skip(self))]
    pub async fn resolve(&self, email: &str) -> Result<IdentityProjection, ServiceError> {
        let projects = self.directory.list_projects().await?;
        let environments = self.directory.list_environments().await?;

        let live: HashMap<&str, &Project> = projects
            .iter()
            .filter(|p| !p.disabled)
            .map(|p| (p.id.as_str(), p))
            .collect();
        if live.is_empty() || environments.is_empty() {
            error!(
                projects = live.len(),
                environments = environments.len(),
                "no enabled projects or environments configured"
            );
            return Err(ServiceError::Internal);
        }
        let tenants: Vec<(&Environment, &Project)> = environments
            .iter()
            .filter_map(|env| live.get(env.project_id.as_str()).map(|p| (env, *p)))
            .collect();

        let mut conn = self.db.connection().await?;

        if let Some(admin) = find_admin(&mut conn, email).await? {
            let role = admin.role();
            let tenant_roles: Vec<TenantRole> = tenants
                .iter()
                .map(|(env, project)| TenantRole::new(env, project, role))
                .collect();
            if tenant_roles.is_empty() {
                error!("admin resolved to zero environments");
                return Err(ServiceError::Internal);
            }
            return Ok(IdentityProjection {
                email: email.to_string(),
                is_admin: true,
                admin_role: role,
                account: admin.into_account(),
                tenant_roles,
            });
        }

        let mut representative = None;
        let mut tenant_roles = Vec::new();
        for (env, project) in tenants {
            let tenant = TenantId::new(env.id.as_str());
            let account: Account = match conn.get(&tenant, email).await {
                Ok(account) => account,
                Err(StorageError::NotFound) => continue,
                Err(err) => return Err(storage_failure(err, &tenant, email)),
            };
            if !account.is_live() {
                continue;
            }
            tenant_roles.push(TenantRole::new(env, project, account.role()));
            representative = Some(account);
        }

        let account = representative.ok_or(ServiceError::NotFound)?;
        Ok(IdentityProjection {
            email: email.to_string(),
            is_admin: false,
            admin_role: Role::Unassigned,
            account,
            tenant_roles,
        })
    }
}

/// The live admin account for `email`, if any.
async fn find_admin<R: Repository>(repo: &mut R, email: &str) -> Result<Option<AdminAccount>, StorageError> {
    match repo.get::<AdminAccount>(&TenantId::global(), email).await {
        Ok(admin) if admin.is_live() => Ok(Some(admin)),
        Ok(_) | Err(StorageError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

fn lookup_failed(err: StorageError) -> AuthError {
    AuthError::Internal(err.to_string())
}
