use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project groups environments (tenants).
///
/// Disabled projects contribute no tenants to identity resolution; trial
/// projects surface their trial flag and start time to members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub disabled: bool,
    pub trial: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// An environment is a tenant: the isolation scope of all aggregate data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Tenant namespace used to scope every per-tenant record.
    pub id: String,
    pub name: String,
    pub project_id: String,
}
