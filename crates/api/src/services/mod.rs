//! Per-aggregate services. Each operation authorizes the caller, validates
//! the request, runs tenant-wide checks and then hands off to the pipeline.

pub mod account;
pub mod experiment;
pub mod push;

pub use account::{AccountService, CreateAccountRequest, ListAdminAccountsRequest};
pub use experiment::{
    CreateExperimentRequest, ExperimentService, ListExperimentsRequest, UpdateExperimentRequest,
};
pub use push::{CreatePushRequest, PushService, UpdatePushRequest};

use flagplane_core::{TenantId, Violation};

use crate::error::ServiceError;

/// Per-tenant aggregates never live in the global scope.
fn require_environment(tenant: &TenantId) -> Result<(), ServiceError> {
    if tenant.is_global() {
        return Err(Violation::EnvironmentRequired.into());
    }
    Ok(())
}
