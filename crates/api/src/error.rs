//! Caller-facing error taxonomy.
//!
//! Every lower-layer failure is classified into [`ServiceError`] before it
//! leaves a service. Infrastructure failures collapse into `Internal` and are
//! logged here, at the point where the originating error is still available.

use thiserror::Error;
use tracing::error;

use flagplane_auth::AuthError;
use flagplane_core::{DomainError, TenantId, Violation};
use flagplane_infra::UniquenessError;
use flagplane_infra::storage::StorageError;

/// Which value collided with an existing one.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Conflict {
    #[error("id")]
    Id,
    #[error("tag")]
    Tag,
    #[error("delivery key")]
    DeliveryKey,
    #[error("email")]
    Email,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed or missing request field; storage was never touched.
    #[error("validation failed: {0}")]
    Validation(Violation),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("permission denied")]
    PermissionDenied,

    /// Target aggregate or account absent, or changed since it was loaded.
    #[error("not found")]
    NotFound,

    #[error("{0} already exists")]
    AlreadyExists(Conflict),

    /// The command does not apply to the aggregate's current state.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("invalid cursor")]
    InvalidCursor,

    #[error("invalid order by")]
    InvalidOrderBy,

    #[error("internal error")]
    Internal,
}

impl From<Violation> for ServiceError {
    fn from(value: Violation) -> Self {
        ServiceError::Validation(value)
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(violation) => ServiceError::Validation(violation),
            DomainError::InvariantViolation(msg) => ServiceError::FailedPrecondition(msg),
            DomainError::InvalidId(_) => ServiceError::Validation(Violation::InvalidId),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Unauthenticated => ServiceError::Unauthenticated,
            AuthError::PermissionDenied => ServiceError::PermissionDenied,
            AuthError::Internal(msg) => {
                error!(error = %msg, "failed to resolve caller identity");
                ServiceError::Internal
            }
        }
    }
}

/// Context-free storage mapping, used where no tenant/id is at hand
/// (commit, connection acquisition).
impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        match classify(value) {
            Ok(mapped) => mapped,
            Err(other) => {
                error!(error = %other, "storage failure");
                ServiceError::Internal
            }
        }
    }
}

/// Map a storage failure on `id` in `tenant`.
///
/// `UnexpectedAffectedRows` means the row the caller loaded is gone or has
/// moved on, which the caller sees as `NotFound`.
pub(crate) fn storage_failure(err: StorageError, tenant: &TenantId, id: &str) -> ServiceError {
    match classify(err) {
        Ok(mapped) => mapped,
        Err(other) => {
            error!(error = %other, tenant = %tenant, id, "storage failure");
            ServiceError::Internal
        }
    }
}

/// Map a failed tenant-wide uniqueness check on `conflict` values.
pub(crate) fn uniqueness_failure(
    err: UniquenessError,
    conflict: Conflict,
    tenant: &TenantId,
) -> ServiceError {
    match err {
        UniquenessError::AlreadyExists(_) => ServiceError::AlreadyExists(conflict),
        UniquenessError::Duplicate(value) => {
            error!(tenant = %tenant, %conflict, value = %value, "existing rows already share a unique value");
            ServiceError::Internal
        }
        UniquenessError::Storage(err) => storage_failure(err, tenant, ""),
    }
}

fn classify(err: StorageError) -> Result<ServiceError, StorageError> {
    match err {
        StorageError::NotFound | StorageError::UnexpectedAffectedRows => Ok(ServiceError::NotFound),
        StorageError::AlreadyExists => Ok(ServiceError::AlreadyExists(Conflict::Id)),
        other => Err(other),
    }
}
