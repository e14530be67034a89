//! `flagplane-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from transport and storage: resolving a
//! caller's account is done by the service layer, which then asks this crate
//! whether the resolved role is sufficient.

pub mod authorize;
pub mod claims;
pub mod editor;
pub mod roles;

pub use authorize::{AuthError, authorize, validate_email};
pub use claims::{IdToken, TokenValidationError, validate_token};
pub use editor::Editor;
pub use roles::Role;
