use serde::Serialize;

/// A domain-agnostic event.
///
/// Events are **immutable** facts. Each aggregate command produces exactly one
/// event, so the event type doubles as the kind of command that was applied.
pub trait Event: Clone + core::fmt::Debug + Serialize + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "push.tags_added").
    fn event_type(&self) -> &'static str;
}
