//! Account domain module.
//!
//! Two account kinds share one state machine: per-tenant accounts grant a role
//! inside a single environment, admin accounts grant a global role everywhere.
//! Projects and environments are reference data read from the directory.

pub mod account;
pub mod admin;
pub mod project;

pub use account::{Account, AccountCommand, AccountEvent, ChangeAccountRole, CreateAccount};
pub use admin::AdminAccount;
pub use project::{Environment, Project};
