use thiserror::Error;

use flagplane_core::Violation;

use crate::Role;

/// Why a caller may not proceed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No resolvable identity at all.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Identity resolved, but its role is insufficient (or it has no account here).
    #[error("permission denied")]
    PermissionDenied,

    /// Resolving the identity failed for infrastructure reasons.
    #[error("internal: {0}")]
    Internal(String),
}

/// Check a resolved role against a requirement.
///
/// - No IO
/// - No panics
pub fn authorize(held: Role, required: Role) -> Result<(), AuthError> {
    if held.satisfies(required) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied)
    }
}

/// Basic structural email check: one `@`, a non-empty local part, and a dotted
/// domain without empty labels.
pub fn validate_email(email: &str) -> Result<(), Violation> {
    if email.is_empty() {
        return Err(Violation::EmailRequired);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(Violation::InvalidEmail);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(Violation::InvalidEmail);
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(Violation::InvalidEmail);
    }
    if domain.split('.').any(str::is_empty) {
        return Err(Violation::InvalidEmail);
    }
    Ok(())
}
