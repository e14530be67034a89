use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use flagplane_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Violation};
use flagplane_events::Event;

/// Aggregate root: Push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Push {
    id: AggregateId,
    name: String,
    delivery_key: String,
    tags: Vec<String>,
    deleted: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Push {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            name: String::new(),
            delivery_key: String::new(),
            tags: Vec::new(),
            deleted: false,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delivery_key(&self) -> &str {
        &self.delivery_key
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn is_created(&self) -> bool {
        self.version > 0
    }
}

impl AggregateRoot for Push {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command: CreatePush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePush {
    pub name: String,
    pub delivery_key: String,
    pub tags: Vec<String>,
}

/// Command: RenamePush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePush {
    pub name: String,
}

/// Command: AddPushTags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPushTags {
    pub tags: Vec<String>,
}

/// Command: DeletePushTags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePushTags {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushCommand {
    Create(CreatePush),
    Rename(RenamePush),
    AddTags(AddPushTags),
    DeleteTags(DeletePushTags),
    Delete,
}

impl PushCommand {
    /// Field-level validation, independent of any aggregate state.
    pub fn validate(&self) -> Result<(), Violation> {
        match self {
            PushCommand::Create(cmd) => {
                if cmd.name.trim().is_empty() {
                    return Err(Violation::NameRequired);
                }
                if cmd.delivery_key.trim().is_empty() {
                    return Err(Violation::DeliveryKeyRequired);
                }
                validate_tags(&cmd.tags)
            }
            PushCommand::Rename(cmd) => {
                if cmd.name.trim().is_empty() {
                    return Err(Violation::NameRequired);
                }
                Ok(())
            }
            PushCommand::AddTags(AddPushTags { tags }) | PushCommand::DeleteTags(DeletePushTags { tags }) => {
                validate_tags(tags)
            }
            PushCommand::Delete => Ok(()),
        }
    }

    /// Whether the command may appear in an update request.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            PushCommand::Rename(_) | PushCommand::AddTags(_) | PushCommand::DeleteTags(_)
        )
    }

    /// Tags this command would introduce to the tenant.
    pub fn introduced_tags(&self) -> &[String] {
        match self {
            PushCommand::Create(cmd) => &cmd.tags,
            PushCommand::AddTags(cmd) => &cmd.tags,
            _ => &[],
        }
    }
}

fn validate_tags(tags: &[String]) -> Result<(), Violation> {
    if tags.is_empty() || tags.iter().any(|t| t.trim().is_empty()) {
        return Err(Violation::TagsRequired);
    }
    let mut seen = HashSet::with_capacity(tags.len());
    if tags.iter().any(|t| !seen.insert(t.as_str())) {
        return Err(Violation::TagDuplicated);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event: PushCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCreated {
    pub name: String,
    pub delivery_key: String,
    pub tags: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PushRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRenamed {
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PushTagsAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushTagsAdded {
    pub tags: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PushTagsDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushTagsDeleted {
    pub tags: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PushDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushDeleted {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushEvent {
    Created(PushCreated),
    Renamed(PushRenamed),
    TagsAdded(PushTagsAdded),
    TagsDeleted(PushTagsDeleted),
    Deleted(PushDeleted),
}

impl PushEvent {
    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PushEvent::Created(e) => e.occurred_at,
            PushEvent::Renamed(e) => e.occurred_at,
            PushEvent::TagsAdded(e) => e.occurred_at,
            PushEvent::TagsDeleted(e) => e.occurred_at,
            PushEvent::Deleted(e) => e.occurred_at,
        }
    }
}

impl Event for PushEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PushEvent::Created(_) => "push.created",
            PushEvent::Renamed(_) => "push.renamed",
            PushEvent::TagsAdded(_) => "push.tags_added",
            PushEvent::TagsDeleted(_) => "push.tags_deleted",
            PushEvent::Deleted(_) => "push.deleted",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decide / evolve
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Push {
    const AGGREGATE_TYPE: &'static str = "push";

    type Command = PushCommand;
    type Event = PushEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PushEvent::Created(e) => {
                self.name = e.name.clone();
                self.delivery_key = e.delivery_key.clone();
                self.tags = e.tags.clone();
                self.created_at = e.occurred_at;
            }
            PushEvent::Renamed(e) => {
                self.name = e.name.clone();
            }
            PushEvent::TagsAdded(e) => {
                self.tags.extend(e.tags.iter().cloned());
            }
            PushEvent::TagsDeleted(e) => {
                self.tags.retain(|t| !e.tags.contains(t));
            }
            PushEvent::Deleted(_) => {
                self.deleted = true;
            }
        }

        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Self::Event, Self::Error> {
        command.validate()?;
        let occurred_at = Utc::now().trunc_subsecs(3);

        if !matches!(command, PushCommand::Create(_)) {
            self.ensure_live()?;
        }
        match command {
            PushCommand::Create(cmd) => self.handle_create(cmd, occurred_at),
            PushCommand::Rename(cmd) => Ok(PushEvent::Renamed(PushRenamed {
                name: cmd.name.clone(),
                occurred_at,
            })),
            PushCommand::AddTags(cmd) => self.handle_add_tags(cmd, occurred_at),
            PushCommand::DeleteTags(cmd) => self.handle_delete_tags(cmd, occurred_at),
            PushCommand::Delete => Ok(PushEvent::Deleted(PushDeleted { occurred_at })),
        }
    }
}

impl Push {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.is_created() {
            return Err(DomainError::invariant("push not created"));
        }
        if self.deleted {
            return Err(DomainError::invariant("push is deleted"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePush, occurred_at: DateTime<Utc>) -> Result<PushEvent, DomainError> {
        if self.is_created() {
            return Err(DomainError::invariant("push already created"));
        }
        Ok(PushEvent::Created(PushCreated {
            name: cmd.name.clone(),
            delivery_key: cmd.delivery_key.clone(),
            tags: cmd.tags.clone(),
            occurred_at,
        }))
    }

    fn handle_add_tags(&self, cmd: &AddPushTags, occurred_at: DateTime<Utc>) -> Result<PushEvent, DomainError> {
        if cmd.tags.iter().any(|t| self.tags.contains(t)) {
            return Err(DomainError::invariant("tag already exists on push"));
        }
        Ok(PushEvent::TagsAdded(PushTagsAdded {
            tags: cmd.tags.clone(),
            occurred_at,
        }))
    }

    fn handle_delete_tags(
        &self,
        cmd: &DeletePushTags,
        occurred_at: DateTime<Utc>,
    ) -> Result<PushEvent, DomainError> {
        if cmd.tags.iter().any(|t| !self.tags.contains(t)) {
            return Err(DomainError::invariant("tag not found on push"));
        }
        if self.tags.iter().all(|t| cmd.tags.contains(t)) {
            return Err(DomainError::invariant("push must keep at least one tag"));
        }
        Ok(PushEvent::TagsDeleted(PushTagsDeleted {
            tags: cmd.tags.clone(),
            occurred_at,
        }))
    }
}
