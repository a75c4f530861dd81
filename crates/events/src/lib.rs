//! Event mechanics: the `Event` trait, stream envelopes, in-process pub/sub
//! and projection replay. Nothing here knows about tokens.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;
pub mod runner;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
pub use runner::{ProjectionCursor, ProjectionError, ProjectionRunner};
