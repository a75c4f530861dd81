use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are disposable: they can be dropped and rebuilt by replaying
/// the stream. `apply` must be deterministic; duplicate and out-of-order
/// deliveries are filtered by [`crate::ProjectionRunner`] before they reach it.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
