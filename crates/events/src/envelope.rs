use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flagplane_auth::Editor;
use flagplane_core::{AggregateId, TenantId};

use crate::Event;

/// Envelope for one applied command, as handed to the publisher.
///
/// The payload is the serialized typed event, so subscribers never need the
/// aggregate crates to route on `aggregate_type` / `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    event_id: Uuid,
    aggregate_type: String,
    aggregate_id: AggregateId,
    tenant: TenantId,
    editor: Editor,
    event_type: String,
    payload: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Wrap a typed event, stamping it with a fresh id and the current time.
    pub fn record<E: Event>(
        aggregate_type: &str,
        aggregate_id: &AggregateId,
        tenant: &TenantId,
        editor: &Editor,
        event: &E,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: Uuid::now_v7(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.clone(),
            tenant: tenant.clone(),
            editor: editor.clone(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_value(event)?,
            occurred_at: Utc::now(),
        })
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
