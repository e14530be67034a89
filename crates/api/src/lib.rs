//! Service layer: the transactional write pipeline, caller identity
//! resolution and the push / experiment / account services built on them.
//!
//! Transport is out of scope; callers hand in a [`RequestContext`] carrying
//! already-verified token claims and get a [`ServiceError`] they can turn into
//! a localized [`Status`].

pub mod context;
pub mod cursor;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod services;
pub mod status;

pub use context::RequestContext;
pub use cursor::{ListOptions, ListResponse};
pub use error::{Conflict, ServiceError};
pub use pipeline::{Applied, Pipeline};
pub use resolver::{IdentityProjection, RoleResolver, TenantRole};
pub use status::{Code, Locale, Status};
