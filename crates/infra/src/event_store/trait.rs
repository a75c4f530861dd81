use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use tokenledger_core::{ExpectedVersion, LedgerId};
use tokenledger_events::EventEnvelope;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Build one with [`UncommittedEvent::from_typed`], which serializes the
/// domain event and captures its type/version metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,

    pub event_type: String,
    pub event_version: u32,

    pub payload: JsonValue,
}

/// A stored event in an append-only ledger stream.
///
/// Sequence numbers start at 1, increase by exactly 1 per event and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,

    /// Position in the ledger stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    /// When the store committed the event.
    pub recorded_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into an envelope for publication.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.ledger_id,
            self.event_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error (infrastructure, not domain).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("ledger stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only store of ledger event streams (one stream per ledger).
///
/// Implementations must:
/// - reject batches that mix ledgers
/// - enforce optimistic concurrency against the current stream version
/// - assign `sequence_number`s starting at `current_version + 1`
/// - persist a batch atomically (all or nothing)
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream in sequence order; empty if the ledger does not exist yet.
    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Sequence number of the last event in the stream (0 if empty).
    fn stream_version(&self, ledger_id: LedgerId) -> Result<u64, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(ledger_id)
    }

    fn stream_version(&self, ledger_id: LedgerId) -> Result<u64, EventStoreError> {
        (**self).stream_version(ledger_id)
    }
}

impl UncommittedEvent {
    pub fn from_typed<E>(ledger_id: LedgerId, event_id: Uuid, event: &E) -> Result<Self, EventStoreError>
    where
        E: tokenledger_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            ledger_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            payload,
        })
    }
}
