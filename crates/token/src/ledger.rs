use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tokenledger_core::{
    Address, Aggregate, AggregateRoot, Amount, DomainError, DomainResult, LedgerId,
};
use tokenledger_events::{Event, execute};

use crate::notification::Notification;

/// Immutable display metadata, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    /// Display scaling only; affects arithmetic solely through the initial supply.
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// Aggregate root: Ledger.
///
/// Owns the balance and allowance mappings plus the total supply. Absent keys
/// read as zero, and entries that fall to zero are removed, so iteration only
/// ever yields non-zero positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    id: LedgerId,
    metadata: Option<TokenMetadata>,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    version: u64,
}

impl Ledger {
    /// Empty, not-yet-created aggregate for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            metadata: None,
            total_supply: Amount::ZERO,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            version: 0,
        }
    }

    /// Create a ledger, crediting `initial_units * 10^decimals` to `creator`.
    ///
    /// Returns the ledger and the issuance `Transfer` (from the null account).
    pub fn create(
        id: LedgerId,
        creator: Address,
        metadata: TokenMetadata,
        initial_units: u128,
    ) -> DomainResult<(Self, Notification)> {
        let mut ledger = Self::empty(id);
        let notification = ledger.execute_one(LedgerCommand::Create(CreateLedger {
            ledger_id: id,
            creator,
            metadata,
            initial_units,
        }))?;
        Ok((ledger, notification))
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn metadata(&self) -> Option<&TokenMetadata> {
        self.metadata.as_ref()
    }

    pub fn name(&self) -> &str {
        self.metadata.as_ref().map(|m| m.name.as_str()).unwrap_or("")
    }

    pub fn symbol(&self) -> &str {
        self.metadata.as_ref().map(|m| m.symbol.as_str()).unwrap_or("")
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.as_ref().map(|m| m.decimals).unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Non-zero balances in address order.
    pub fn balances(&self) -> impl Iterator<Item = (Address, Amount)> + '_ {
        self.balances.iter().map(|(a, b)| (*a, *b))
    }

    /// Non-zero allowances as `(owner, spender, amount)` in key order.
    pub fn allowances(&self) -> impl Iterator<Item = (Address, Address, Amount)> + '_ {
        self.allowances.iter().map(|((o, s), a)| (*o, *s, *a))
    }

    /// Move `amount` from `caller` to `to`.
    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> DomainResult<Notification> {
        self.execute_one(LedgerCommand::Transfer(Transfer { caller, to, amount }))
    }

    /// Set (overwrite) the allowance `caller` grants to `spender`.
    pub fn approve(&mut self, caller: Address, spender: Address, amount: Amount) -> DomainResult<Notification> {
        self.execute_one(LedgerCommand::Approve(Approve {
            caller,
            spender,
            amount,
        }))
    }

    /// Move `amount` from `from` to `to`, spending `caller`'s allowance from `from`.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> DomainResult<Notification> {
        self.execute_one(LedgerCommand::TransferFrom(TransferFrom {
            caller,
            from,
            to,
            amount,
        }))
    }

    /// Execute a command that yields exactly one event and return its notification.
    fn execute_one(&mut self, command: LedgerCommand) -> DomainResult<Notification> {
        let events = execute(self, &command)?;
        events
            .last()
            .map(LedgerEvent::notification)
            .ok_or_else(|| DomainError::invariant("command produced no event"))
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateLedger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLedger {
    pub ledger_id: LedgerId,
    pub creator: Address,
    pub metadata: TokenMetadata,
    /// Whole tokens to issue; scaled by `10^decimals`.
    pub initial_units: u128,
}

/// Command: Transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub caller: Address,
    pub to: Address,
    pub amount: Amount,
}

/// Command: Approve.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub caller: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// Command: TransferFrom.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFrom {
    pub caller: Address,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    Create(CreateLedger),
    Transfer(Transfer),
    Approve(Approve),
    TransferFrom(TransferFrom),
}

/// Event: LedgerCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCreated {
    pub ledger_id: LedgerId,
    pub creator: Address,
    pub metadata: TokenMetadata,
    pub total_supply: Amount,
}

/// Event: Transferred.
///
/// `spender` is set for delegated transfers; applying the event then also
/// spends that much of the spender's allowance from `from`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transferred {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spender: Option<Address>,
}

/// Event: Approved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approved {
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Created(LedgerCreated),
    Transferred(Transferred),
    Approved(Approved),
}

impl LedgerEvent {
    /// The notification observers see for this event.
    ///
    /// A delegated transfer surfaces only as `Transfer`; the allowance it
    /// consumes never produces an `Approval`.
    pub fn notification(&self) -> Notification {
        match self {
            LedgerEvent::Created(e) => Notification::Transfer {
                from: Address::ZERO,
                to: e.creator,
                amount: e.total_supply,
            },
            LedgerEvent::Transferred(e) => Notification::Transfer {
                from: e.from,
                to: e.to,
                amount: e.amount,
            },
            LedgerEvent::Approved(e) => Notification::Approval {
                owner: e.owner,
                spender: e.spender,
                amount: e.amount,
            },
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Created(_) => "token.ledger.created",
            LedgerEvent::Transferred(_) => "token.ledger.transferred",
            LedgerEvent::Approved(_) => "token.ledger.approved",
        }
    }

    fn version(&self) -> u32 {
        1
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::Created(e) => {
                self.id = e.ledger_id;
                self.metadata = Some(e.metadata.clone());
                self.total_supply = e.total_supply;
                self.set_balance(e.creator, e.total_supply);
            }
            LedgerEvent::Transferred(e) => {
                if let Some(spender) = e.spender {
                    let remaining = self.allowance(e.from, spender).saturating_sub(e.amount);
                    self.set_allowance(e.from, spender, remaining);
                }
                // Debit before credit so a self-transfer nets to zero.
                let debited = self.balance_of(e.from).saturating_sub(e.amount);
                self.set_balance(e.from, debited);
                let credited = self.balance_of(e.to).saturating_add(e.amount);
                self.set_balance(e.to, credited);
            }
            LedgerEvent::Approved(e) => {
                self.set_allowance(e.owner, e.spender, e.amount);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::Create(cmd) => self.handle_create(cmd),
            LedgerCommand::Transfer(cmd) => self.handle_transfer(cmd),
            LedgerCommand::Approve(cmd) => self.handle_approve(cmd),
            LedgerCommand::TransferFrom(cmd) => self.handle_transfer_from(cmd),
        }
    }
}

impl Ledger {
    fn set_balance(&mut self, account: Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if self.metadata.is_none() {
            return Err(DomainError::NotCreated);
        }
        Ok(())
    }

    fn ensure_balance(&self, account: Address, requested: Amount) -> Result<(), DomainError> {
        let available = self.balance_of(account);
        if requested > available {
            return Err(DomainError::InsufficientBalance {
                available,
                requested,
            });
        }
        Ok(())
    }

    /// Crediting can only overflow if supply conservation is already broken.
    fn ensure_credit(&self, from: Address, to: Address, amount: Amount) -> Result<(), DomainError> {
        if from != to && self.balance_of(to).checked_add(amount).is_none() {
            return Err(DomainError::invariant("recipient balance would overflow"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateLedger) -> Result<Vec<LedgerEvent>, DomainError> {
        if self.metadata.is_some() {
            return Err(DomainError::conflict("ledger already created"));
        }
        if cmd.ledger_id != self.id {
            return Err(DomainError::invariant("ledger_id mismatch"));
        }
        if cmd.creator.is_zero() {
            return Err(DomainError::validation("creator cannot be the zero address"));
        }
        if cmd.metadata.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.metadata.symbol.trim().is_empty() {
            return Err(DomainError::validation("symbol cannot be empty"));
        }

        let total_supply = Amount::from_units(cmd.initial_units, cmd.metadata.decimals)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "initial supply {} x 10^{} overflows the amount range",
                    cmd.initial_units, cmd.metadata.decimals
                ))
            })?;

        Ok(vec![LedgerEvent::Created(LedgerCreated {
            ledger_id: cmd.ledger_id,
            creator: cmd.creator,
            metadata: cmd.metadata.clone(),
            total_supply,
        })])
    }

    fn handle_transfer(&self, cmd: &Transfer) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.to.is_zero() {
            return Err(DomainError::InvalidRecipient);
        }
        self.ensure_balance(cmd.caller, cmd.amount)?;
        self.ensure_credit(cmd.caller, cmd.to, cmd.amount)?;

        Ok(vec![LedgerEvent::Transferred(Transferred {
            from: cmd.caller,
            to: cmd.to,
            amount: cmd.amount,
            spender: None,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.spender.is_zero() {
            return Err(DomainError::InvalidSpender);
        }

        Ok(vec![LedgerEvent::Approved(Approved {
            owner: cmd.caller,
            spender: cmd.spender,
            amount: cmd.amount,
        })])
    }

    fn handle_transfer_from(&self, cmd: &TransferFrom) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_created()?;

        // `from` is deliberately not checked against the null account.
        if cmd.to.is_zero() {
            return Err(DomainError::InvalidRecipient);
        }

        let allowed = self.allowance(cmd.from, cmd.caller);
        if cmd.amount > allowed {
            return Err(DomainError::InsufficientAllowance {
                available: allowed,
                requested: cmd.amount,
            });
        }
        self.ensure_balance(cmd.from, cmd.amount)?;
        self.ensure_credit(cmd.from, cmd.to, cmd.amount)?;

        Ok(vec![LedgerEvent::Transferred(Transferred {
            from: cmd.from,
            to: cmd.to,
            amount: cmd.amount,
            spender: Some(cmd.caller),
        })])
    }
}
