//! Event publishing abstraction.
//!
//! The publisher is fire-and-forget from the write path's point of view: events
//! are handed over only after the owning transaction has committed, and a
//! publish failure never undoes the committed mutation. Delivery guarantees
//! belong to the implementation.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use thiserror::Error;

use crate::DomainEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Publish failed due to internal lock poisoning.
    #[error("publisher state poisoned")]
    Poisoned,

    /// The transport refused the event.
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// A subscription to the in-process event stream.
///
/// Each subscription gets a copy of every published event (broadcast).
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Collect everything currently queued.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Accepts finished domain events for asynchronous delivery.
///
/// Implementations must be cheap to call from async code: hand the event to a
/// queue or channel rather than blocking on network round trips.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        (**self).publish(event)
    }
}
