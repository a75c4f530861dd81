use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tokenledger_core::LedgerId;

/// Envelope for an event, carrying stream metadata.
///
/// `sequence_number` is monotonically increasing per ledger stream, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    ledger_id: LedgerId,
    event_type: String,

    /// Position in the ledger stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        ledger_id: LedgerId,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            ledger_id,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Re-wrap the same metadata around a converted payload.
    pub fn map<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            ledger_id: self.ledger_id,
            event_type: self.event_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload),
        }
    }

    /// Fallible variant of [`EventEnvelope::map`].
    pub fn try_map<F, T, Err>(self, f: F) -> Result<EventEnvelope<T>, Err>
    where
        F: FnOnce(E) -> Result<T, Err>,
    {
        let payload = f(self.payload)?;
        Ok(EventEnvelope {
            event_id: self.event_id,
            ledger_id: self.ledger_id,
            event_type: self.event_type,
            sequence_number: self.sequence_number,
            payload,
        })
    }
}
