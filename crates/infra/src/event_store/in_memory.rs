use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use tokenledger_core::{ExpectedVersion, LedgerId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// In-memory append-only event store.
///
/// Intended for tests and single-process hosts. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<LedgerId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events must target the same ledger stream.
        let ledger_id = events[0].ledger_id;
        if let Some(idx) = events.iter().position(|e| e.ledger_id != ledger_id) {
            return Err(EventStoreError::StreamMismatch(format!(
                "batch contains multiple ledger_ids (index {idx})"
            )));
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(ledger_id).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        let recorded_at = Utc::now();
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                ledger_id: e.ledger_id,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                recorded_at,
                payload: e.payload,
            };
            next += 1;
            committed.push(stored);
        }
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&ledger_id).cloned().unwrap_or_default())
    }

    fn stream_version(&self, ledger_id: LedgerId) -> Result<u64, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams
            .get(&ledger_id)
            .map(|stream| Self::current_version(stream))
            .unwrap_or(0))
    }
}
