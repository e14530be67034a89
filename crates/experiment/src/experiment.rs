use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use flagplane_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Violation};
use flagplane_events::Event;

use crate::period::validate_period;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Waiting,
    Running,
    Stopped,
    ForceStopped,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Waiting => "waiting",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Stopped => "stopped",
            ExperimentStatus::ForceStopped => "force_stopped",
        }
    }

    fn is_finished(self) -> bool {
        matches!(self, ExperimentStatus::Stopped | ExperimentStatus::ForceStopped)
    }
}

/// Aggregate root: Experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    id: AggregateId,
    feature_id: String,
    feature_version: i32,
    goal_ids: Vec<String>,
    name: String,
    description: String,
    maintainer: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    start_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    stop_at: DateTime<Utc>,
    status: ExperimentStatus,
    archived: bool,
    deleted: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Experiment {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            feature_id: String::new(),
            feature_version: 0,
            goal_ids: Vec::new(),
            name: String::new(),
            description: String::new(),
            maintainer: String::new(),
            start_at: DateTime::default(),
            stop_at: DateTime::default(),
            status: ExperimentStatus::Waiting,
            archived: false,
            deleted: false,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
            version: 0,
        }
    }

    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    pub fn feature_version(&self) -> i32 {
        self.feature_version
    }

    pub fn goal_ids(&self) -> &[String] {
        &self.goal_ids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn maintainer(&self) -> &str {
        &self.maintainer
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn stop_at(&self) -> DateTime<Utc> {
        self.stop_at
    }

    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    pub fn is_archived(&self) -> bool {
        self.archived
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

impl AggregateRoot for Experiment {
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

/// Command: CreateExperiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateExperiment {
    pub feature_id: String,
    pub feature_version: i32,
    pub goal_ids: Vec<String>,
    pub name: String,
    pub description: String,
    /// Email of the account responsible for the experiment.
    pub maintainer: String,
    pub start_at: DateTime<Utc>,
    pub stop_at: DateTime<Utc>,
}

/// Command: RenameExperiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameExperiment {
    pub name: String,
}

/// Command: ChangeExperimentDescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeExperimentDescription {
    pub description: String,
}

/// Command: ChangeExperimentPeriod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeExperimentPeriod {
    pub start_at: DateTime<Utc>,
    pub stop_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentCommand {
    Create(CreateExperiment),
    Rename(RenameExperiment),
    ChangeDescription(ChangeExperimentDescription),
    ChangePeriod(ChangeExperimentPeriod),
    Start,
    Finish,
    Stop,
    Archive,
    Delete,
}

impl ExperimentCommand {
    /// Field-level validation, independent of any aggregate state.
    pub fn validate(&self) -> Result<(), Violation> {
        match self {
            ExperimentCommand::Create(cmd) => {
                if cmd.feature_id.trim().is_empty() {
                    return Err(Violation::FeatureIdRequired);
                }
                if cmd.goal_ids.is_empty() {
                    return Err(Violation::GoalIdsRequired);
                }
                if cmd.goal_ids.iter().any(|g| g.trim().is_empty()) {
                    return Err(Violation::GoalIdEmpty);
                }
                if cmd.name.trim().is_empty() {
                    return Err(Violation::NameRequired);
                }
                validate_period(cmd.start_at, cmd.stop_at)
            }
            ExperimentCommand::Rename(cmd) => {
                if cmd.name.trim().is_empty() {
                    return Err(Violation::NameRequired);
                }
                Ok(())
            }
            ExperimentCommand::ChangePeriod(cmd) => validate_period(cmd.start_at, cmd.stop_at),
            ExperimentCommand::ChangeDescription(_)
            | ExperimentCommand::Start
            | ExperimentCommand::Finish
            | ExperimentCommand::Stop
            | ExperimentCommand::Archive
            | ExperimentCommand::Delete => Ok(()),
        }
    }

    /// Whether the command may appear in a field-update request.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            ExperimentCommand::Rename(_)
                | ExperimentCommand::ChangeDescription(_)
                | ExperimentCommand::ChangePeriod(_)
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentEvent {
    Created {
        feature_id: String,
        feature_version: i32,
        goal_ids: Vec<String>,
        name: String,
        description: String,
        maintainer: String,
        start_at: DateTime<Utc>,
        stop_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    Renamed {
        name: String,
        occurred_at: DateTime<Utc>,
    },
    DescriptionChanged {
        description: String,
        occurred_at: DateTime<Utc>,
    },
    PeriodChanged {
        start_at: DateTime<Utc>,
        stop_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    Started {
        occurred_at: DateTime<Utc>,
    },
    Finished {
        occurred_at: DateTime<Utc>,
    },
    Stopped {
        occurred_at: DateTime<Utc>,
    },
    Archived {
        occurred_at: DateTime<Utc>,
    },
    Deleted {
        occurred_at: DateTime<Utc>,
    },
}

impl ExperimentEvent {
    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExperimentEvent::Created { occurred_at, .. }
            | ExperimentEvent::Renamed { occurred_at, .. }
            | ExperimentEvent::DescriptionChanged { occurred_at, .. }
            | ExperimentEvent::PeriodChanged { occurred_at, .. }
            | ExperimentEvent::Started { occurred_at }
            | ExperimentEvent::Finished { occurred_at }
            | ExperimentEvent::Stopped { occurred_at }
            | ExperimentEvent::Archived { occurred_at }
            | ExperimentEvent::Deleted { occurred_at } => *occurred_at,
        }
    }
}

impl Event for ExperimentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExperimentEvent::Created { .. } => "experiment.created",
            ExperimentEvent::Renamed { .. } => "experiment.renamed",
            ExperimentEvent::DescriptionChanged { .. } => "experiment.description_changed",
            ExperimentEvent::PeriodChanged { .. } => "experiment.period_changed",
            ExperimentEvent::Started { .. } => "experiment.started",
            ExperimentEvent::Finished { .. } => "experiment.finished",
            ExperimentEvent::Stopped { .. } => "experiment.stopped",
            ExperimentEvent::Archived { .. } => "experiment.archived",
            ExperimentEvent::Deleted { .. } => "experiment.deleted",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decide / evolve
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Experiment {
    const AGGREGATE_TYPE: &'static str = "experiment";

    type Command = ExperimentCommand;
    type Event = ExperimentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExperimentEvent::Created {
                feature_id,
                feature_version,
                goal_ids,
                name,
                description,
                maintainer,
                start_at,
                stop_at,
                occurred_at,
            } => {
                self.feature_id = feature_id.clone();
                self.feature_version = *feature_version;
                self.goal_ids = goal_ids.clone();
                self.name = name.clone();
                self.description = description.clone();
                self.maintainer = maintainer.clone();
                self.start_at = *start_at;
                self.stop_at = *stop_at;
                self.status = ExperimentStatus::Waiting;
                self.created_at = *occurred_at;
            }
            ExperimentEvent::Renamed { name, .. } => self.name = name.clone(),
            ExperimentEvent::DescriptionChanged { description, .. } => {
                self.description = description.clone();
            }
            ExperimentEvent::PeriodChanged { start_at, stop_at, .. } => {
                self.start_at = *start_at;
                self.stop_at = *stop_at;
            }
            ExperimentEvent::Started { .. } => self.status = ExperimentStatus::Running,
            ExperimentEvent::Finished { .. } => self.status = ExperimentStatus::Stopped,
            ExperimentEvent::Stopped { .. } => self.status = ExperimentStatus::ForceStopped,
            ExperimentEvent::Archived { .. } => self.archived = true,
            ExperimentEvent::Deleted { .. } => self.deleted = true,
        }

        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Self::Event, Self::Error> {
        command.validate()?;
        let occurred_at = Utc::now().trunc_subsecs(3);

        if let ExperimentCommand::Create(cmd) = command {
            if self.is_created() {
                return Err(DomainError::invariant("experiment already created"));
            }
            return Ok(ExperimentEvent::Created {
                feature_id: cmd.feature_id.clone(),
                feature_version: cmd.feature_version,
                goal_ids: cmd.goal_ids.clone(),
                name: cmd.name.clone(),
                description: cmd.description.clone(),
                maintainer: cmd.maintainer.clone(),
                start_at: cmd.start_at.trunc_subsecs(0),
                stop_at: cmd.stop_at.trunc_subsecs(0),
                occurred_at,
            });
        }

        if !self.is_created() {
            return Err(DomainError::invariant("experiment not created"));
        }
        if self.deleted {
            return Err(DomainError::invariant("experiment is deleted"));
        }

        let event = match command {
            ExperimentCommand::Rename(cmd) => ExperimentEvent::Renamed {
                name: cmd.name.clone(),
                occurred_at,
            },
            ExperimentCommand::ChangeDescription(cmd) => ExperimentEvent::DescriptionChanged {
                description: cmd.description.clone(),
                occurred_at,
            },
            ExperimentCommand::ChangePeriod(cmd) => {
                if self.status.is_finished() {
                    return Err(DomainError::invariant("experiment has already stopped"));
                }
                ExperimentEvent::PeriodChanged {
                    start_at: cmd.start_at.trunc_subsecs(0),
                    stop_at: cmd.stop_at.trunc_subsecs(0),
                    occurred_at,
                }
            }
            ExperimentCommand::Start => {
                self.ensure_status(ExperimentStatus::Waiting, "only a waiting experiment can start")?;
                ExperimentEvent::Started { occurred_at }
            }
            ExperimentCommand::Finish => {
                self.ensure_status(ExperimentStatus::Running, "only a running experiment can finish")?;
                ExperimentEvent::Finished { occurred_at }
            }
            ExperimentCommand::Stop => {
                if self.status.is_finished() {
                    return Err(DomainError::invariant("experiment has already stopped"));
                }
                ExperimentEvent::Stopped { occurred_at }
            }
            ExperimentCommand::Archive => {
                if self.archived {
                    return Err(DomainError::invariant("experiment already archived"));
                }
                if self.status == ExperimentStatus::Running {
                    return Err(DomainError::invariant("a running experiment cannot be archived"));
                }
                ExperimentEvent::Archived { occurred_at }
            }
            ExperimentCommand::Delete => ExperimentEvent::Deleted { occurred_at },
            ExperimentCommand::Create(_) => {
                return Err(DomainError::invariant("experiment already created"));
            }
        };
        Ok(event)
    }
}

impl Experiment {
    fn ensure_status(&self, expected: ExperimentStatus, msg: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(msg));
        }
        Ok(())
    }
}
