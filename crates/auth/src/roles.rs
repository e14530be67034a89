use serde::{Deserialize, Serialize};

/// Role held by an account inside a tenant (or globally, for admins).
///
/// Roles are totally ordered by capability: `Viewer < Editor < Owner`.
/// `Unassigned` grants nothing and never satisfies a requirement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Unassigned,
    Viewer,
    Editor,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unassigned => "unassigned",
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Owner => "owner",
        }
    }

    /// Whether this role grants at least the capabilities of `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self != Role::Unassigned && self >= required
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_capability() {
        assert!(Role::Owner.satisfies(Role::Editor));
        assert!(Role::Editor.satisfies(Role::Editor));
        assert!(Role::Editor.satisfies(Role::Viewer));
        assert!(!Role::Viewer.satisfies(Role::Editor));
    }

    #[test]
    fn unassigned_satisfies_nothing() {
        assert!(!Role::Unassigned.satisfies(Role::Unassigned));
        assert!(!Role::Unassigned.satisfies(Role::Viewer));
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
    }
}
