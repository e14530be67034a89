use serde::{Deserialize, Serialize};

use crate::Role;

/// The authenticated actor behind a mutation.
///
/// Attached to every emitted event for audit; never persisted as part of the
/// aggregate it edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Editor {
    pub email: String,
    pub role: Role,
    pub is_admin: bool,
}

impl Editor {
    pub fn new(email: impl Into<String>, role: Role, is_admin: bool) -> Self {
        Self {
            email: email.into(),
            role,
            is_admin,
        }
    }
}
