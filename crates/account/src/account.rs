use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use flagplane_auth::{Role, validate_email};
use flagplane_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Violation};
use flagplane_events::Event;

/// Aggregate root: Account. Keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AggregateId,
    email: String,
    role: Role,
    disabled: bool,
    deleted: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Account {
    /// Create an empty, not-yet-created account for `email`.
    pub fn empty(email: &str) -> Self {
        Self {
            id: AggregateId::new(email),
            email: email.to_string(),
            role: Role::Unassigned,
            disabled: false,
            deleted: false,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
            version: 0,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Neither disabled nor deleted.
    pub fn is_live(&self) -> bool {
        !self.disabled && !self.deleted
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

impl AggregateRoot for Account {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    pub email: String,
    pub role: Role,
}

/// Command: ChangeAccountRole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAccountRole {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    Create(CreateAccount),
    ChangeRole(ChangeAccountRole),
    Enable,
    Disable,
    Delete,
}

impl AccountCommand {
    /// Field-level validation, independent of any aggregate state.
    pub fn validate(&self) -> Result<(), Violation> {
        match self {
            AccountCommand::Create(cmd) => {
                validate_email(&cmd.email)?;
                if cmd.role == Role::Unassigned {
                    return Err(Violation::RoleRequired);
                }
                Ok(())
            }
            AccountCommand::ChangeRole(cmd) => {
                if cmd.role == Role::Unassigned {
                    return Err(Violation::RoleRequired);
                }
                Ok(())
            }
            AccountCommand::Enable | AccountCommand::Disable | AccountCommand::Delete => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountEvent {
    Created {
        email: String,
        role: Role,
        occurred_at: DateTime<Utc>,
    },
    RoleChanged {
        role: Role,
        occurred_at: DateTime<Utc>,
    },
    Enabled {
        occurred_at: DateTime<Utc>,
    },
    Disabled {
        occurred_at: DateTime<Utc>,
    },
    Deleted {
        occurred_at: DateTime<Utc>,
    },
}

impl AccountEvent {
    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::Created { occurred_at, .. }
            | AccountEvent::RoleChanged { occurred_at, .. }
            | AccountEvent::Enabled { occurred_at }
            | AccountEvent::Disabled { occurred_at }
            | AccountEvent::Deleted { occurred_at } => *occurred_at,
        }
    }
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::Created { .. } => "account.created",
            AccountEvent::RoleChanged { .. } => "account.role_changed",
            AccountEvent::Enabled { .. } => "account.enabled",
            AccountEvent::Disabled { .. } => "account.disabled",
            AccountEvent::Deleted { .. } => "account.deleted",
        }
    }
}

impl Aggregate for Account {
    const AGGREGATE_TYPE: &'static str = "account";

    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::Created { email, role, occurred_at } => {
                self.email = email.clone();
                self.role = *role;
                self.created_at = *occurred_at;
            }
            AccountEvent::RoleChanged { role, .. } => self.role = *role,
            AccountEvent::Enabled { .. } => self.disabled = false,
            AccountEvent::Disabled { .. } => self.disabled = true,
            AccountEvent::Deleted { .. } => self.deleted = true,
        }

        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Self::Event, Self::Error> {
        command.validate()?;
        let occurred_at = Utc::now().trunc_subsecs(3);

        if let AccountCommand::Create(cmd) = command {
            if self.is_created() {
                return Err(DomainError::invariant("account already created"));
            }
            if cmd.email != self.email {
                return Err(DomainError::invariant("email does not match account id"));
            }
            return Ok(AccountEvent::Created {
                email: cmd.email.clone(),
                role: cmd.role,
                occurred_at,
            });
        }

        if !self.is_created() {
            return Err(DomainError::invariant("account not created"));
        }
        if self.deleted {
            return Err(DomainError::invariant("account is deleted"));
        }

        match command {
            AccountCommand::ChangeRole(cmd) => Ok(AccountEvent::RoleChanged {
                role: cmd.role,
                occurred_at,
            }),
            AccountCommand::Enable => {
                if !self.disabled {
                    return Err(DomainError::invariant("account already enabled"));
                }
                Ok(AccountEvent::Enabled { occurred_at })
            }
            AccountCommand::Disable => {
                if self.disabled {
                    return Err(DomainError::invariant("account already disabled"));
                }
                Ok(AccountEvent::Disabled { occurred_at })
            }
            AccountCommand::Delete => Ok(AccountEvent::Deleted { occurred_at }),
            AccountCommand::Create(_) => Err(DomainError::invariant("account already created")),
        }
    }
}

#[cfg(test)]
mod tests {
    use flagplane_events::execute;

    use super::*;

    fn created(role: Role) -> Account {
        let mut account = Account::empty("dev@example.com");
        execute(
            &mut account,
            &AccountCommand::Create(CreateAccount {
                email: "dev@example.com".into(),
                role,
            }),
        )
        .unwrap();
        account
    }

    #[test]
    fn create_keys_account_by_email() {
        let account = created(Role::Editor);
        assert_eq!(account.id().as_str(), "dev@example.com");
        assert_eq!(account.role(), Role::Editor);
        assert!(account.is_live());
    }

    #[test]
    fn create_validates_email_and_role() {
        let cmd = |email: &str, role| AccountCommand::Create(CreateAccount { email: email.into(), role });
        assert_eq!(cmd("nope", Role::Viewer).validate(), Err(Violation::InvalidEmail));
        assert_eq!(cmd("a@b.io", Role::Unassigned).validate(), Err(Violation::RoleRequired));
    }

    #[test]
    fn create_rejects_mismatched_email() {
        let account = Account::empty("dev@example.com");
        let err = account
            .handle(&AccountCommand::Create(CreateAccount {
                email: "other@example.com".into(),
                role: Role::Viewer,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn disable_then_enable() {
        let mut account = created(Role::Viewer);
        execute(&mut account, &AccountCommand::Disable).unwrap();
        assert!(!account.is_live());
        assert!(execute(&mut account, &AccountCommand::Disable).is_err());

        execute(&mut account, &AccountCommand::Enable).unwrap();
        assert!(account.is_live());
        assert!(execute(&mut account, &AccountCommand::Enable).is_err());
    }

    #[test]
    fn change_role() {
        let mut account = created(Role::Viewer);
        execute(&mut account, &AccountCommand::ChangeRole(ChangeAccountRole { role: Role::Owner })).unwrap();
        assert_eq!(account.role(), Role::Owner);
        assert_eq!(account.version(), 2);
    }

    #[test]
    fn deleted_account_is_terminal() {
        let mut account = created(Role::Viewer);
        execute(&mut account, &AccountCommand::Delete).unwrap();
        assert!(!account.is_live());
        assert!(execute(&mut account, &AccountCommand::Enable).is_err());
    }
}
