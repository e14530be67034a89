//! Push notification channel domain module.
//!
//! A push channel is identified per tenant and owns a delivery key plus a set of
//! tags. Cross-channel uniqueness of keys and tags is enforced by the service
//! layer; this crate only guards what a single channel can see.

pub mod push;

pub use push::{
    AddPushTags, CreatePush, DeletePushTags, Push, PushCommand, PushCreated, PushDeleted,
    PushEvent, PushRenamed, PushTagsAdded, PushTagsDeleted, RenamePush,
};
