//! Domain event plumbing: event trait, envelopes, and the pub/sub bus.

pub mod bus;
pub mod envelope;
pub mod event;

pub use bus::{EventBus, InMemoryBusError, InMemoryEventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
