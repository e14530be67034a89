//! `flagplane-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the aggregate traits every writable entity implements, and the
//! closed set of validation reasons a command can fail with.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, Violation};
pub use id::{AggregateId, TenantId};
