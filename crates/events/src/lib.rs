//! Domain events: the typed event contract each aggregate implements, the
//! envelope that is handed to the publisher, and the publisher seam itself.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventPublisher, PublishError, Subscription};
pub use envelope::DomainEvent;
pub use event::Event;
pub use handler::{execute, execute_all};
pub use in_memory_bus::InMemoryEventBus;
