//! Transactional command pipeline.
//!
//! ```text
//! begin transaction
//!   ↓
//! 1. Load aggregate (inside the transaction; absent for create)
//!   ↓
//! 2. Apply commands in order (one event each, first failure aborts)
//!   ↓
//! 3. Persist: insert, or conditional write at the loaded version
//!   ↓
//! commit (rollback on any error, or when the future is dropped)
//!   ↓
//! 4. Publish recorded events
//! ```
//!
//! Authorization, request validation and tenant-wide uniqueness checks run
//! in the services before a transaction is opened.
//!
//! Publication happens strictly after a successful commit. A publish failure
//! is logged and never undoes the committed write.

use tracing::{debug, error, instrument};

use flagplane_auth::Editor;
use flagplane_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use flagplane_events::{DomainEvent, Event, EventPublisher, execute, execute_all};
use flagplane_infra::TransactionScope;
use flagplane_infra::storage::{Database, Record, Repository};

use crate::error::{ServiceError, storage_failure};

/// Outcome of a unit of work: its value plus the events to publish once the
/// transaction has committed.
#[derive(Debug, Clone)]
pub struct Applied<V> {
    pub value: V,
    pub events: Vec<DomainEvent>,
}

/// Reusable write path over a store and a publisher.
#[derive(Debug, Clone)]
pub struct Pipeline<D, P> {
    db: D,
    publisher: P,
}

impl<D, P> Pipeline<D, P>
where
    D: Database,
    P: EventPublisher,
{
    pub fn new(db: D, publisher: P) -> Self {
        Self { db, publisher }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// Open a transaction for a unit of work spanning several aggregates.
    pub async fn begin(&self) -> Result<TransactionScope<D::Transaction>, ServiceError> {
        Ok(TransactionScope::begin(&self.db).await?)
    }

    /// Commit or roll back according to `outcome`, then publish its events.
    pub async fn complete<V>(
        &self,
        scope: TransactionScope<D::Transaction>,
        outcome: Result<Applied<V>, ServiceError>,
    ) -> Result<V, ServiceError> {
        let applied = scope.finish(outcome).await?;
        self.publish(&applied.events);
        Ok(applied.value)
    }

    /// Create `aggregate` from a single create command.
    pub async fn create<A>(
        &self,
        editor: &Editor,
        tenant: &TenantId,
        aggregate: A,
        command: &A::Command,
    ) -> Result<A, ServiceError>
    where
        A: Aggregate<Error = DomainError> + AggregateRoot<Id = AggregateId> + Record,
        A::Event: Event,
    {
        let mut scope = self.begin().await?;
        let outcome = create_in(scope.repository(), editor, tenant, aggregate, command).await;
        self.complete(scope, outcome).await
    }

    /// Load `id`, apply `commands` in order and persist the result.
    pub async fn update<A>(
        &self,
        editor: &Editor,
        tenant: &TenantId,
        id: &str,
        commands: &[A::Command],
    ) -> Result<A, ServiceError>
    where
        A: Aggregate<Error = DomainError> + AggregateRoot<Id = AggregateId> + Record,
        A::Event: Event,
    {
        let mut scope = self.begin().await?;
        let outcome = update_in::<A, _>(scope.repository(), editor, tenant, id, commands).await;
        self.complete(scope, outcome).await
    }

    fn publish(&self, events: &[DomainEvent]) {
        for event in events {
            match self.publisher.publish(event) {
                Ok(()) => debug!(
                    event_id = %event.event_id(),
                    event_type = event.event_type(),
                    "event published"
                ),
                Err(err) => error!(
                    error = %err,
                    event_id = %event.event_id(),
                    event_type = event.event_type(),
                    tenant = %event.tenant(),
                    id = %event.aggregate_id(),
                    "failed to publish event"
                ),
            }
        }
    }
}

/// Apply a create command to a fresh aggregate and insert it.
#[instrument(
    skip_all,
    fields(aggregate_type = A::AGGREGATE_TYPE, tenant = %tenant, id = %aggregate.id())
)]
pub async fn create_in<A, R>(
    repo: &mut R,
    editor: &Editor,
    tenant: &TenantId,
    mut aggregate: A,
    command: &A::Command,
) -> Result<Applied<A>, ServiceError>
where
    A: Aggregate<Error = DomainError> + AggregateRoot<Id = AggregateId> + Record,
    A::Event: Event,
    R: Repository,
{
    let event = execute(&mut aggregate, command)?;
    let events = vec![record(editor, tenant, &aggregate, &event)?];

    repo.create(tenant, &aggregate)
        .await
        .map_err(|err| storage_failure(err, tenant, aggregate.id().as_str()))?;

    Ok(Applied {
        value: aggregate,
        events,
    })
}

/// Load a live aggregate, apply `commands` all-or-nothing and write it back
/// conditioned on the loaded version.
#[instrument(
    skip_all,
    fields(aggregate_type = A::AGGREGATE_TYPE, tenant = %tenant, id = %id, commands = commands.len())
)]
pub async fn update_in<A, R>(
    repo: &mut R,
    editor: &Editor,
    tenant: &TenantId,
    id: &str,
    commands: &[A::Command],
) -> Result<Applied<A>, ServiceError>
where
    A: Aggregate<Error = DomainError> + AggregateRoot<Id = AggregateId> + Record,
    A::Event: Event,
    R: Repository,
{
    let mut aggregate: A = repo
        .get(tenant, id)
        .await
        .map_err(|err| storage_failure(err, tenant, id))?;
    let expected_version = aggregate.version();

    let applied = execute_all(&mut aggregate, commands)?;
    let events = applied
        .iter()
        .map(|event| record(editor, tenant, &aggregate, event))
        .collect::<Result<Vec<_>, _>>()?;

    let written = if aggregate.is_deleted() {
        repo.delete(tenant, &aggregate, expected_version).await
    } else {
        repo.update(tenant, &aggregate, expected_version).await
    };
    written.map_err(|err| storage_failure(err, tenant, id))?;

    Ok(Applied {
        value: aggregate,
        events,
    })
}

fn record<A>(
    editor: &Editor,
    tenant: &TenantId,
    aggregate: &A,
    event: &A::Event,
) -> Result<DomainEvent, ServiceError>
where
    A: Aggregate + AggregateRoot<Id = AggregateId>,
    A::Event: Event,
{
    DomainEvent::record(A::AGGREGATE_TYPE, aggregate.id(), tenant, editor, event).map_err(|err| {
        error!(error = %err, tenant = %tenant, id = %aggregate.id(), "failed to encode event");
        ServiceError::Internal
    })
}
