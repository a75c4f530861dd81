//! Projection runner utilities (read model builders).
//!
//! Deterministic replay with cursor tracking, without storage assumptions.

use thiserror::Error;

use tokenledger_core::LedgerId;

use crate::{EventEnvelope, Projection};

/// Tracks projection progress for a single ledger stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    ledger_id: LedgerId,
    last_sequence_number: u64,
}

impl ProjectionCursor {
    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("ledger mismatch (expected {expected}, found {found})")]
    LedgerMismatch { expected: LedgerId, found: LedgerId },

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Feeds one ledger's envelopes into a projection, at most once each.
///
/// The runner is pinned to its ledger from construction; envelopes from any
/// other stream are refused, as are positions at or below the cursor.
#[derive(Debug)]
pub struct ProjectionRunner<P> {
    projection: P,
    cursor: ProjectionCursor,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new_for_ledger(ledger_id: LedgerId, projection: P) -> Self {
        Self {
            projection,
            cursor: ProjectionCursor {
                ledger_id,
                last_sequence_number: 0,
            },
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn cursor(&self) -> ProjectionCursor {
        self.cursor
    }

    /// Apply `envelope` and advance the cursor to its position.
    ///
    /// Gaps are allowed (a subscriber may start mid-stream); going backwards is not.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let ProjectionCursor {
            ledger_id,
            last_sequence_number: last,
        } = self.cursor;

        if envelope.ledger_id() != ledger_id {
            return Err(ProjectionError::LedgerMismatch {
                expected: ledger_id,
                found: envelope.ledger_id(),
            });
        }
        if envelope.sequence_number() <= last {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: envelope.sequence_number(),
            });
        }

        self.projection.apply(envelope);
        self.cursor.last_sequence_number = envelope.sequence_number();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Event;
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    struct Tick(u64);

    impl Event for Tick {
        fn event_type(&self) -> &'static str {
            "test.tick"
        }

        fn version(&self) -> u32 {
            1
        }
    }

    #[derive(Debug, Default)]
    struct Sum(u64);

    impl Projection for Sum {
        type Ev = Tick;

        fn apply(&mut self, envelope: &EventEnvelope<Tick>) {
            self.0 += envelope.payload().0;
        }
    }

    fn envelope(ledger_id: LedgerId, seq: u64, value: u64) -> EventEnvelope<Tick> {
        EventEnvelope::new(Uuid::now_v7(), ledger_id, "test.tick", seq, Tick(value))
    }

    #[test]
    fn duplicates_are_rejected_without_double_counting() {
        let ledger_id = LedgerId::new();
        let mut runner = ProjectionRunner::new_for_ledger(ledger_id, Sum::default());

        runner.apply(&envelope(ledger_id, 1, 10)).unwrap();
        let err = runner.apply(&envelope(ledger_id, 1, 10)).unwrap_err();

        assert_eq!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 1 });
        assert_eq!(runner.projection().0, 10);
    }

    #[test]
    fn foreign_ledger_is_rejected() {
        let ledger_id = LedgerId::new();
        let other = LedgerId::new();
        let mut runner = ProjectionRunner::new_for_ledger(ledger_id, Sum::default());

        let err = runner.apply(&envelope(other, 1, 5)).unwrap_err();
        assert!(matches!(err, ProjectionError::LedgerMismatch { .. }));
        assert_eq!(runner.projection().0, 0);
    }

    #[test]
    fn cursor_advances_through_gaps() {
        let ledger_id = LedgerId::new();
        let mut runner = ProjectionRunner::new_for_ledger(ledger_id, Sum::default());

        for (seq, value) in [(1, 1), (2, 2), (5, 3)] {
            runner.apply(&envelope(ledger_id, seq, value)).unwrap();
        }

        assert_eq!(runner.projection().0, 6);
        assert_eq!(runner.cursor().last_sequence_number(), 5);
        assert_eq!(
            runner.apply(&envelope(ledger_id, 4, 100)),
            Err(ProjectionError::NonMonotonicSequence { last: 5, found: 4 })
        );
    }
}
