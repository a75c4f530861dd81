//! Serialized host for a single ledger.
//!
//! The `Ledger` aggregate defines no locking of its own. `LedgerService`
//! provides the one global ordering it relies on: every command runs under
//! a single lock against a cached aggregate, and the append is additionally
//! guarded by the stream's optimistic version check, so a writer holding a
//! stale view can never commit.

use std::sync::{Mutex, MutexGuard};

use serde_json::Value as JsonValue;

use tokenledger_core::{Address, AggregateRoot, Amount, LedgerId};
use tokenledger_events::{EventBus, EventEnvelope};
use tokenledger_token::{
    Approve, CreateLedger, Ledger, LedgerCommand, LedgerEvent, Notification, TokenMetadata,
    Transfer, TransferFrom,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct LedgerService<S, B> {
    ledger_id: LedgerId,
    dispatcher: CommandDispatcher<S, B>,
    state: Mutex<Ledger>,
}

impl<S, B> LedgerService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Open the ledger stream `ledger_id`, rehydrating whatever history the store holds.
    pub fn open(ledger_id: LedgerId, store: S, bus: B) -> Result<Self, DispatchError> {
        let dispatcher = CommandDispatcher::new(store, bus);
        let ledger: Ledger = dispatcher.load(ledger_id, Ledger::empty)?;

        tracing::debug!(%ledger_id, created = ledger.is_created(), "ledger opened");

        Ok(Self {
            ledger_id,
            dispatcher,
            state: Mutex::new(ledger),
        })
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    /// Issue the fixed supply to `creator`. Allowed once per ledger.
    pub fn create(
        &self,
        creator: Address,
        metadata: TokenMetadata,
        initial_units: u128,
    ) -> Result<Notification, DispatchError> {
        self.submit(LedgerCommand::Create(CreateLedger {
            ledger_id: self.ledger_id,
            creator,
            metadata,
            initial_units,
        }))
    }

    pub fn transfer(&self, caller: Address, to: Address, amount: Amount) -> Result<Notification, DispatchError> {
        self.submit(LedgerCommand::Transfer(Transfer { caller, to, amount }))
    }

    pub fn approve(
        &self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<Notification, DispatchError> {
        self.submit(LedgerCommand::Approve(Approve {
            caller,
            spender,
            amount,
        }))
    }

    pub fn transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Notification, DispatchError> {
        self.submit(LedgerCommand::TransferFrom(TransferFrom {
            caller,
            from,
            to,
            amount,
        }))
    }

    pub fn total_supply(&self) -> Result<Amount, DispatchError> {
        Ok(self.lock()?.total_supply())
    }

    pub fn balance_of(&self, account: Address) -> Result<Amount, DispatchError> {
        Ok(self.lock()?.balance_of(account))
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Result<Amount, DispatchError> {
        Ok(self.lock()?.allowance(owner, spender))
    }

    pub fn metadata(&self) -> Result<Option<TokenMetadata>, DispatchError> {
        Ok(self.lock()?.metadata().cloned())
    }

    /// Consistent copy of the current ledger state.
    pub fn snapshot(&self) -> Result<Ledger, DispatchError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, DispatchError> {
        self.state.lock().map_err(|_| DispatchError::Poisoned)
    }

    /// Replace the cached ledger with a fresh rehydration of the stream.
    fn reload(&self, ledger: &mut Ledger) -> Result<(), DispatchError> {
        *ledger = self.dispatcher.load(self.ledger_id, Ledger::empty)?;
        Ok(())
    }

    /// Whether the store holds events the cached ledger has not seen.
    fn is_behind(&self, ledger: &Ledger) -> bool {
        match self.dispatcher.store().stream_version(self.ledger_id) {
            Ok(version) => version != AggregateRoot::version(ledger),
            Err(e) => {
                tracing::warn!(ledger_id = %self.ledger_id, error = %e, "stream version unavailable");
                false
            }
        }
    }

    fn submit(&self, command: LedgerCommand) -> Result<Notification, DispatchError> {
        let mut ledger = self.lock()?;

        let result = match self.dispatcher.dispatch_on(self.ledger_id, &mut *ledger, &command) {
            Err(DispatchError::Concurrency(reason)) => {
                // Another writer appended to the stream; catch up once and retry.
                tracing::debug!(ledger_id = %self.ledger_id, %reason, "cached ledger stale, reloading");
                self.reload(&mut ledger)?;
                self.dispatcher.dispatch_on(self.ledger_id, &mut *ledger, &command)
            }
            // A rejection decided on a stale cache is not final.
            Err(DispatchError::Rejected(err)) if self.is_behind(&ledger) => {
                match self.reload(&mut ledger) {
                    Ok(()) => self.dispatcher.dispatch_on(self.ledger_id, &mut *ledger, &command),
                    Err(reload_err) => {
                        tracing::warn!(ledger_id = %self.ledger_id, error = %reload_err, "reload after rejection failed");
                        Err(DispatchError::Rejected(err))
                    }
                }
            }
            other => other,
        };

        match result {
            Ok(committed) => {
                let notification = committed
                    .events
                    .last()
                    .map(LedgerEvent::notification)
                    .ok_or_else(|| DispatchError::CorruptStream("command committed no event".to_string()))?;

                let version = committed.version().unwrap_or_default();
                if let Some(reason) = &committed.publish_error {
                    // Already durable; observers catch up from the store.
                    tracing::warn!(
                        ledger_id = %self.ledger_id,
                        version,
                        %reason,
                        "ledger command committed but not published"
                    );
                }
                tracing::info!(
                    ledger_id = %self.ledger_id,
                    version,
                    event = notification.name(),
                    amount = %notification.amount(),
                    "ledger command committed"
                );
                Ok(notification)
            }
            Err(err) => {
                tracing::warn!(ledger_id = %self.ledger_id, error = %err, "ledger command rejected");
                Err(err)
            }
        }
    }
}
