//! Experiment service.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;

use flagplane_auth::Role;
use flagplane_core::{AggregateId, TenantId, Violation};
use flagplane_events::EventPublisher;
use flagplane_experiment::{CreateExperiment, Experiment, ExperimentCommand, ExperimentStatus};
use flagplane_infra::ProjectDirectory;
use flagplane_infra::storage::{Database, Filter, ListQuery, Repository};

use crate::context::RequestContext;
use crate::cursor::{ListOptions, ListResponse, parse_cursor, parse_order};
use crate::error::{ServiceError, storage_failure};
use crate::pipeline::Pipeline;
use crate::resolver::RoleResolver;
use crate::services::require_environment;

const ORDER_COLUMNS: &[&str] = &["name", "created_at", "updated_at"];
const SEARCH_COLUMNS: &[&str] = &["name", "description"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateExperimentRequest {
    pub command: Option<CreateExperiment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateExperimentRequest {
    pub id: String,
    pub commands: Vec<ExperimentCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListExperimentsRequest {
    pub options: ListOptions,
    pub archived: Option<bool>,
    pub feature_id: Option<String>,
    pub maintainer: Option<String>,
    /// Any of these statuses; empty means no status filter.
    pub statuses: Vec<ExperimentStatus>,
    /// Experiments still running at or after this time (`stop_at >= from`).
    pub from: Option<DateTime<Utc>>,
    /// Experiments started at or before this time (`start_at <= to`).
    pub to: Option<DateTime<Utc>>,
}

impl ListExperimentsRequest {
    fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(archived) = self.archived {
            filters.push(Filter::Eq("archived", Value::Bool(archived)));
        }
        if let Some(feature_id) = &self.feature_id {
            filters.push(Filter::Eq("feature_id", Value::from(feature_id.as_str())));
        }
        if let Some(maintainer) = &self.maintainer {
            filters.push(Filter::Eq("maintainer", Value::from(maintainer.as_str())));
        }
        if !self.statuses.is_empty() {
            let statuses = self.statuses.iter().map(|s| Value::from(s.as_str())).collect();
            filters.push(Filter::In("status", statuses));
        }
        // start_at / stop_at are stored as unix seconds.
        if let Some(from) = self.from {
            filters.push(Filter::Gte("stop_at", Value::from(from.timestamp())));
        }
        if let Some(to) = self.to {
            filters.push(Filter::Lte("start_at", Value::from(to.timestamp())));
        }
        if !self.options.search_keyword.is_empty() {
            filters.push(Filter::Search {
                columns: SEARCH_COLUMNS.to_vec(),
                keyword: self.options.search_keyword.clone(),
            });
        }
        filters
    }
}

pub struct ExperimentService<D, Dir, P> {
    pipeline: Pipeline<D, P>,
    resolver: RoleResolver<D, Dir>,
}

impl<D, Dir, P> ExperimentService<D, Dir, P>
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
    pub async fn create_experiment(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        request: CreateExperimentRequest,
    ) -> Result<Experiment, ServiceError> {
        let editor = self.resolver.require_role(ctx, tenant, Role::Editor).await?;
        require_environment(tenant)?;
        let command = ExperimentCommand::Create(request.command.ok_or(Violation::NoCommand)?);
        command.validate()?;

        let experiment = Experiment::empty(AggregateId::generate());
        self.pipeline.create(&editor, tenant, experiment, &command).await
    }

    /// Apply rename / description / period commands in order, all or nothing.
    #[instrument(skip_all, fields(tenant = %tenant, id = %request.id))]
    pub async fn update_experiment(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        request: UpdateExperimentRequest,
    ) -> Result<Experiment, ServiceError> {
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
        self.pipeline
            .update::<Experiment>(&editor, tenant, &request.id, &request.commands)
            .await
    }

    pub async fn start_experiment(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Experiment, ServiceError> {
        self.apply(ctx, tenant, id, ExperimentCommand::Start).await
    }

    pub async fn finish_experiment(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Experiment, ServiceError> {
        self.apply(ctx, tenant, id, ExperimentCommand::Finish).await
    }

    pub async fn stop_experiment(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Experiment, ServiceError> {
        self.apply(ctx, tenant, id, ExperimentCommand::Stop).await
    }

    pub async fn archive_experiment(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Experiment, ServiceError> {
        self.apply(ctx, tenant, id, ExperimentCommand::Archive).await
    }

    pub async fn delete_experiment(&self, ctx: &RequestContext, tenant: &TenantId, id: &str) -> Result<(), ServiceError> {
        self.apply(ctx, tenant, id, ExperimentCommand::Delete).await?;
        Ok(())
    }

    pub async fn get_experiment(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Experiment, ServiceError> {
        self.resolver.require_role(ctx, tenant, Role::Viewer).await?;
        if id.is_empty() {
            return Err(Violation::IdRequired.into());
        }
        let mut conn = self.pipeline.database().connection().await?;
        conn.get(tenant, id).await.map_err(|err| storage_failure(err, tenant, id))
    }

    pub async fn list_experiments(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        request: &ListExperimentsRequest,
    ) -> Result<ListResponse<Experiment>, ServiceError> {
        self.resolver.require_role(ctx, tenant, Role::Viewer).await?;
        let options = &request.options;
        let offset = parse_cursor(&options.cursor)?;
        let order = parse_order(&options.order_by, options.direction, ORDER_COLUMNS)?;

        let query = ListQuery::new(tenant.clone())
            .filters(request.filters())
            .order_by(order)
            .page(options.page_size, offset);

        let mut conn = self.pipeline.database().connection().await?;
        let page = conn
            .list::<Experiment>(&query)
            .await
            .map_err(|err| storage_failure(err, tenant, ""))?;
        Ok(page.into())
    }

    #[instrument(skip(self, ctx), fields(tenant = %tenant))]
    async fn apply(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        id: &str,
        command: ExperimentCommand,
    ) -> Result<Experiment, ServiceError> {
        let editor = self.resolver.require_role(ctx, tenant, Role::Editor).await?;
        require_environment(tenant)?;
        if id.is_empty() {
            return Err(Violation::IdRequired.into());
        }
        self.pipeline
            .update::<Experiment>(&editor, tenant, id, &[command])
            .await
    }
}
