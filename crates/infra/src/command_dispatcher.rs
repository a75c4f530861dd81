//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the ledger stream (or start from a cached aggregate)
//!   ↓
//! 2. Rehydrate the aggregate from history
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append events (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish committed events to the bus
//! ```
//!
//! Publication happens only after a successful append; a rejected command
//! writes nothing and publishes nothing. The append is the commit point: a
//! publish failure afterwards is reported on the [`Committed`] result, never
//! as an error, since the events are already durable. This module performs
//! no IO itself.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use tokenledger_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, LedgerId};
use tokenledger_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The aggregate rejected the command (deterministic, state unchanged).
    #[error(transparent)]
    Rejected(DomainError),
    /// Optimistic concurrency failure (stale aggregate version).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),
    /// Loaded history does not belong to the requested ledger or is out of order.
    #[error("corrupt ledger stream: {0}")]
    CorruptStream(String),
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    /// Persisting to the event store failed.
    #[error(transparent)]
    Store(EventStoreError),
    /// A host-side lock was poisoned by a panicking thread.
    #[error("ledger lock poisoned")]
    Poisoned,
}

impl DispatchError {
    /// The domain rejection, if this error is one.
    pub fn rejection(&self) -> Option<&DomainError> {
        match self {
            DispatchError::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        DispatchError::Rejected(value)
    }
}

/// Result of a committed command: the typed events plus their stored form.
#[derive(Debug, Clone)]
pub struct Committed<E> {
    pub events: Vec<E>,
    pub stored: Vec<StoredEvent>,
    /// Set when the bus refused an event after the append succeeded.
    /// Events from the failing one onward were not published.
    pub publish_error: Option<String>,
}

impl<E> Committed<E> {
    fn nothing() -> Self {
        Self {
            events: vec![],
            stored: vec![],
            publish_error: None,
        }
    }

    /// Stream version after the commit.
    pub fn version(&self) -> Option<u64> {
        self.stored.last().map(StoredEvent::stream_version)
    }

    pub fn is_published(&self) -> bool {
        self.publish_error.is_none()
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run against the in-memory
/// implementations and other backends can be swapped in.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate from its full stream.
    pub fn load<A>(
        &self,
        ledger_id: LedgerId,
        make_aggregate: impl FnOnce(LedgerId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(ledger_id)?;
        validate_loaded_stream(ledger_id, &history)?;

        let mut aggregate = make_aggregate(ledger_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Dispatch a command through the full pipeline, rehydrating from the store.
    pub fn dispatch<A>(
        &self,
        ledger_id: LedgerId,
        command: A::Command,
        make_aggregate: impl FnOnce(LedgerId) -> A,
    ) -> Result<Committed<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: tokenledger_events::Event + Serialize + DeserializeOwned,
    {
        let mut aggregate = self.load(ledger_id, make_aggregate)?;
        self.dispatch_on(ledger_id, &mut aggregate, &command)
    }

    /// Dispatch against an already-rehydrated aggregate.
    ///
    /// The aggregate's version is the expected stream version, so a cached
    /// aggregate that fell behind the store fails with `Concurrency` and is
    /// left untouched. On success the committed events are applied to it.
    pub fn dispatch_on<A>(
        &self,
        ledger_id: LedgerId,
        aggregate: &mut A,
        command: &A::Command,
    ) -> Result<Committed<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: tokenledger_events::Event + Serialize,
    {
        let expected = ExpectedVersion::Exact(AggregateRoot::version(&*aggregate));

        // Decide (no mutation)
        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(Committed::nothing());
        }

        // Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(ledger_id, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self.store.append(uncommitted, expected)?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        // Publish (after append); stop at the first refusal to keep order.
        let publish_error = stored
            .iter()
            .find_map(|e| self.bus.publish(e.to_envelope()).err())
            .map(|err| format!("{err:?}"));

        Ok(Committed {
            events: decided,
            stored,
            publish_error,
        })
    }
}

fn validate_loaded_stream(ledger_id: LedgerId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    // Guard against a backend returning foreign or out-of-order events.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.ledger_id != ledger_id {
            return Err(DispatchError::CorruptStream(format!(
                "loaded stream contains wrong ledger_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::CorruptStream(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
