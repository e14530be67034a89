//! Push channel service.

use tracing::instrument;

use flagplane_auth::Role;
use flagplane_core::{AggregateId, TenantId, Violation};
use flagplane_events::EventPublisher;
use flagplane_infra::storage::{Database, Filter, ListQuery, Repository};
use flagplane_infra::{LiveRows, ProjectDirectory};
use flagplane_push::{CreatePush, Push, PushCommand};

use crate::context::RequestContext;
use crate::cursor::{ListOptions, ListResponse, parse_cursor, parse_order};
use crate::error::{Conflict, ServiceError, storage_failure, uniqueness_failure};
use crate::pipeline::Pipeline;
use crate::resolver::RoleResolver;
use crate::services::require_environment;

const ORDER_COLUMNS: &[&str] = &["name", "created_at", "updated_at"];
const SEARCH_COLUMNS: &[&str] = &["name"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePushRequest {
    pub command: Option<CreatePush>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePushRequest {
    pub id: String,
    pub commands: Vec<PushCommand>,
}

pub struct PushService<D, Dir, P> {
    pipeline: Pipeline<D, P>,
    resolver: RoleResolver<D, Dir>,
}

impl<D, Dir, P> PushService<D, Dir, P>
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

    #[instrument(skip_all, fields(tenant = %tenant))]
    pub async fn create_push(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        request: CreatePushRequest,
    ) -> Result<Push, ServiceError> {
        let editor = self.resolver.require_role(ctx, tenant, Role::Editor).await?;
        require_environment(tenant)?;
        let create = request.command.ok_or(Violation::NoCommand)?;
        let delivery_key = create.delivery_key.clone();
        let command = PushCommand::Create(create);
        command.validate()?;

        self.ensure_unique(tenant, Some(&delivery_key), command.introduced_tags()).await?;

        let push = Push::empty(AggregateId::generate());
        self.pipeline.create(&editor, tenant, push, &command).await
    }

    /// Apply rename / tag commands in order, all or nothing.
    #[instrument(skip_all, fields(tenant = %tenant, id = %request.id))]
    pub async fn update_push(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        request: UpdatePushRequest,
    ) -> Result<Push, ServiceError> {
        let editor = self.resolver.require_role(ctx, tenant, Role::Editor).await?;
        require_environment(tenant)?;
        if request.id.is_empty() {
            return Err(Violation::IdRequired.into());
        }
        if request.commands.is_empty() {
            return Err(Violation::NoCommand.into());
        }
        for command in &request.commands {
            if !command.is_update() {
                return Err(Violation::UnsupportedCommand.into());
            }
            command.validate()?;
        }

        let added: Vec<String> = request
            .commands
            .iter()
            .flat_map(|c| c.introduced_tags().iter().cloned())
            .collect();
        self.ensure_unique(tenant, None, &added).await?;

        self.pipeline
            .update::<Push>(&editor, tenant, &request.id, &request.commands)
            .await
    }

    #[instrument(skip(self, ctx), fields(tenant = %tenant))]
    pub async fn delete_push(&self, ctx: &RequestContext, tenant: &TenantId, id: &str) -> Result<(), ServiceError> {
        let editor = self.resolver.require_role(ctx, tenant, Role::Editor).await?;
        require_environment(tenant)?;
        if id.is_empty() {
            return Err(Violation::IdRequired.into());
        }
        self.pipeline
            .update::<Push>(&editor, tenant, id, &[PushCommand::Delete])
            .await?;
        Ok(())
    }

    pub async fn get_push(&self, ctx: &RequestContext, tenant: &TenantId, id: &str) -> Result<Push, ServiceError> {
        self.resolver.require_role(ctx, tenant, Role::Viewer).await?;
        if id.is_empty() {
            return Err(Violation::IdRequired.into());
        }
        let mut conn = self.pipeline.database().connection().await?;
        conn.get(tenant, id).await.map_err(|err| storage_failure(err, tenant, id))
    }

    pub async fn list_pushes(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        options: &ListOptions,
    ) -> Result<ListResponse<Push>, ServiceError> {
        self.resolver.require_role(ctx, tenant, Role::Viewer).await?;
        let offset = parse_cursor(&options.cursor)?;
        let order = parse_order(&options.order_by, options.direction, ORDER_COLUMNS)?;

        let mut query = ListQuery::new(tenant.clone())
            .order_by(order)
            .page(options.page_size, offset);
        if !options.search_keyword.is_empty() {
            query = query.filter(Filter::Search {
                columns: SEARCH_COLUMNS.to_vec(),
                keyword: options.search_keyword.clone(),
            });
        }

        let mut conn = self.pipeline.database().connection().await?;
        let page = conn
            .list::<Push>(&query)
            .await
            .map_err(|err| storage_failure(err, tenant, ""))?;
        Ok(page.into())
    }

    /// Check a delivery key and tags against every live push in the tenant,
    /// reading the tenant once.
    async fn ensure_unique(
        &self,
        tenant: &TenantId,
        delivery_key: Option<&str>,
        tags: &[String],
    ) -> Result<(), ServiceError> {
        if delivery_key.is_none() && tags.is_empty() {
            return Ok(());
        }
        let mut conn = self.pipeline.database().connection().await?;
        let pushes = LiveRows::<Push>::scan(&mut conn, tenant)
            .await
            .map_err(|err| storage_failure(err, tenant, ""))?;

        if let Some(key) = delivery_key {
            pushes
                .ensure_unique(&[key.to_string()], |push: &Push| [push.delivery_key().to_string()])
                .map_err(|err| uniqueness_failure(err, Conflict::DeliveryKey, tenant))?;
        }
        pushes
            .ensure_unique(tags, |push: &Push| push.tags().to_vec())
            .map_err(|err| uniqueness_failure(err, Conflict::Tag, tenant))
    }
}
