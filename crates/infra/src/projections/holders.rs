//! Holders projection.
//!
//! Read model of token holders and outstanding allowances, rebuilt purely
//! from published ledger events.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::thread::JoinHandle;

use serde_json::Value as JsonValue;
use thiserror::Error;

use tokenledger_core::{Address, Amount, LedgerId};
use tokenledger_events::{
    EventEnvelope, Projection, ProjectionError, ProjectionRunner, Subscription,
};
use tokenledger_token::LedgerEvent;

/// Current holder balances and allowances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolderBook {
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
}

impl HolderBook {
    pub fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(Amount::ZERO)
    }

    /// Non-zero holders in address order.
    pub fn holders(&self) -> Vec<(Address, Amount)> {
        self.balances.iter().map(|(a, b)| (*a, *b)).collect()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Non-zero allowances as `(owner, spender, amount)`.
    pub fn allowances(&self) -> Vec<(Address, Address, Amount)> {
        self.allowances.iter().map(|((o, s), a)| (*o, *s, *a)).collect()
    }

    /// Sum of all tracked balances.
    pub fn total_held(&self) -> Amount {
        self.balances
            .values()
            .fold(Amount::ZERO, |acc, b| acc.saturating_add(*b))
    }

    fn adjust(&mut self, account: Address, balance: Amount) {
        if balance.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }
}

impl Projection for HolderBook {
    type Ev = LedgerEvent;

    fn apply(&mut self, envelope: &EventEnvelope<LedgerEvent>) {
        match envelope.payload() {
            LedgerEvent::Created(e) => {
                let credited = self.balance_of(e.creator).saturating_add(e.total_supply);
                self.adjust(e.creator, credited);
            }
            LedgerEvent::Transferred(e) => {
                if let Some(spender) = e.spender {
                    let remaining = self.allowance(e.from, spender).saturating_sub(e.amount);
                    self.set_allowance(e.from, spender, remaining);
                }
                let debited = self.balance_of(e.from).saturating_sub(e.amount);
                self.adjust(e.from, debited);
                let credited = self.balance_of(e.to).saturating_add(e.amount);
                self.adjust(e.to, credited);
            }
            LedgerEvent::Approved(e) => self.set_allowance(e.owner, e.spender, e.amount),
        }
    }
}

#[derive(Debug, Error)]
pub enum HoldersProjectionError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("projection lock poisoned")]
    Poisoned,
}

/// Thread-safe holders projection pinned to one ledger.
///
/// Redelivered envelopes (sequence at or below the cursor) are skipped, so
/// at-least-once delivery is safe.
#[derive(Debug)]
pub struct HoldersProjection {
    runner: RwLock<ProjectionRunner<HolderBook>>,
}

impl HoldersProjection {
    pub fn new(ledger_id: LedgerId) -> Self {
        Self {
            runner: RwLock::new(ProjectionRunner::new_for_ledger(ledger_id, HolderBook::default())),
        }
    }

    /// Apply one published envelope. Returns `false` if it was a duplicate.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, HoldersProjectionError> {
        let typed = envelope.clone().try_map(|payload| {
            serde_json::from_value::<LedgerEvent>(payload)
                .map_err(|e| HoldersProjectionError::Deserialize(e.to_string()))
        })?;

        let mut runner = self.runner.write().map_err(|_| HoldersProjectionError::Poisoned)?;
        match runner.apply(&typed) {
            Ok(()) => Ok(true),
            Err(ProjectionError::NonMonotonicSequence { last, found }) => {
                tracing::debug!(last, found, "skipping already-projected envelope");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply everything currently buffered on `subscription`.
    pub fn catch_up(
        &self,
        subscription: &Subscription<EventEnvelope<JsonValue>>,
    ) -> Result<usize, HoldersProjectionError> {
        let mut applied = 0;
        for envelope in subscription.drain() {
            if self.apply_envelope(&envelope)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Follow `subscription` on a background thread until the bus goes away.
    pub fn follow(
        self: std::sync::Arc<Self>,
        subscription: Subscription<EventEnvelope<JsonValue>>,
    ) -> JoinHandle<()> {
        std::thread::spawn(move || {
            while let Ok(envelope) = subscription.recv() {
                if let Err(e) = self.apply_envelope(&envelope) {
                    tracing::error!(error = %e, sequence = envelope.sequence_number(), "holders projection failed");
                }
            }
        })
    }

    /// Read the current holder book.
    pub fn read<T>(&self, f: impl FnOnce(&HolderBook) -> T) -> Result<T, HoldersProjectionError> {
        let runner = self.runner.read().map_err(|_| HoldersProjectionError::Poisoned)?;
        Ok(f(runner.projection()))
    }

    pub fn last_sequence_number(&self) -> Result<u64, HoldersProjectionError> {
        let runner = self.runner.read().map_err(|_| HoldersProjectionError::Poisoned)?;
        Ok(runner.cursor().last_sequence_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenledger_token::{Approved, LedgerCreated, TokenMetadata, Transferred};
    use uuid::Uuid;

    fn envelope(ledger_id: LedgerId, seq: u64, event: LedgerEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            ledger_id,
            "test",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn tracks_balances_from_transfers() {
        let ledger_id = LedgerId::new();
        let owner = Address::from_low_u64(1);
        let user = Address::from_low_u64(2);
        let projection = HoldersProjection::new(ledger_id);

        projection
            .apply_envelope(&envelope(
                ledger_id,
                1,
                LedgerEvent::Created(LedgerCreated {
                    ledger_id,
                    creator: owner,
                    metadata: TokenMetadata::new("H", "H", 0),
                    total_supply: Amount::new(100),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                ledger_id,
                2,
                LedgerEvent::Transferred(Transferred {
                    from: owner,
                    to: user,
                    amount: Amount::new(100),
                    spender: Some(user),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                ledger_id,
                3,
                LedgerEvent::Approved(Approved {
                    owner: user,
                    spender: owner,
                    amount: Amount::new(1),
                }),
            ))
            .unwrap();

        let (holders, total) = projection
            .read(|book| (book.holders(), book.total_held()))
            .unwrap();
        assert_eq!(holders, vec![(user, Amount::new(100))]);
        assert_eq!(
            projection.read(|book| book.allowances()).unwrap(),
            vec![(user, owner, Amount::new(1))]
        );
        assert_eq!(total, Amount::new(100));
        assert_eq!(projection.last_sequence_number().unwrap(), 3);
    }

    #[test]
    fn duplicates_are_skipped() {
        let ledger_id = LedgerId::new();
        let owner = Address::from_low_u64(1);
        let projection = HoldersProjection::new(ledger_id);
        let created = envelope(
            ledger_id,
            1,
            LedgerEvent::Created(LedgerCreated {
                ledger_id,
                creator: owner,
                metadata: TokenMetadata::new("H", "H", 0),
                total_supply: Amount::new(5),
            }),
        );

        assert!(projection.apply_envelope(&created).unwrap());
        assert!(!projection.apply_envelope(&created).unwrap());
        assert_eq!(
            projection.read(|book| book.balance_of(owner)).unwrap(),
            Amount::new(5)
        );
    }

    #[test]
    fn garbage_payload_is_an_error() {
        let ledger_id = LedgerId::new();
        let projection = HoldersProjection::new(ledger_id);
        let bad = EventEnvelope::new(Uuid::now_v7(), ledger_id, "x", 1, JsonValue::Bool(true));
        assert!(matches!(
            projection.apply_envelope(&bad),
            Err(HoldersProjectionError::Deserialize(_))
        ));
    }
}
