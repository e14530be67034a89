//! Strongly-typed identifiers used across the domain.
//!
//! Both identifiers are opaque strings: tenants come from the environment
//! directory, and aggregate ids are either generated (UUIDv7) or natural keys
//! such as an account's email.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a tenant (environment namespace, the multi-tenant boundary).
///
/// The empty tenant is reserved for globally scoped records (admin accounts,
/// the project and environment catalogs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of an aggregate root, unique within its tenant among live rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.chars().any(char::is_whitespace) {
                    return Err(DomainError::invalid_id(format!(
                        "{}: must not contain whitespace",
                        $name
                    )));
                }
                Ok(Self(s.to_owned()))
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(AggregateId, "AggregateId");

impl TenantId {
    /// Scope of records that do not belong to any single environment.
    pub fn global() -> Self {
        Self(String::new())
    }

    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }
}

impl AggregateId {
    /// Generate a fresh identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct_uuids() {
        let a = AggregateId::generate();
        let b = AggregateId::generate();
        assert_ne!(a, b);
        assert!(Uuid::from_str(a.as_str()).is_ok());
    }

    #[test]
    fn parse_rejects_whitespace() {
        assert!("ns 1".parse::<TenantId>().is_err());
        assert_eq!("ns1".parse::<TenantId>().unwrap(), TenantId::new("ns1"));
    }

    #[test]
    fn global_tenant_is_empty() {
        assert!(TenantId::global().is_global());
        assert!(!TenantId::new("ns1").is_global());
    }
}
