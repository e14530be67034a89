//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A command or request field failed validation, independent of any state.
    #[error("validation failed: {0}")]
    Validation(Violation),

    /// The command is not applicable to the aggregate's current state.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

impl From<Violation> for DomainError {
    fn from(value: Violation) -> Self {
        Self::Validation(value)
    }
}

/// Closed set of field-level validation failures.
///
/// Each variant is a stable reason code; callers map it to a localized message
/// without carrying request data into the text.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Violation {
    #[error("id is required")]
    IdRequired,
    #[error("id is malformed")]
    InvalidId,
    #[error("at least one command is required")]
    NoCommand,
    #[error("command is not supported by this operation")]
    UnsupportedCommand,
    #[error("name is required")]
    NameRequired,
    #[error("delivery key is required")]
    DeliveryKeyRequired,
    #[error("tags are required")]
    TagsRequired,
    #[error("tags contain a duplicate")]
    TagDuplicated,
    #[error("feature id is required")]
    FeatureIdRequired,
    #[error("goal ids are required")]
    GoalIdsRequired,
    #[error("goal id must not be empty")]
    GoalIdEmpty,
    #[error("stop time must be after start time")]
    InvalidPeriod,
    #[error("period is too long")]
    PeriodTooLong,
    #[error("email is required")]
    EmailRequired,
    #[error("email is malformed")]
    InvalidEmail,
    #[error("role is required")]
    RoleRequired,
    #[error("environment is required")]
    EnvironmentRequired,
}
