//! Fungible token ledger (event-sourced).
//!
//! Balance and allowance accounting for a fixed-supply token, implemented
//! purely as deterministic domain logic (no IO, no storage).

pub mod ledger;
pub mod notification;

pub use ledger::{
    Approve, Approved, CreateLedger, Ledger, LedgerCommand, LedgerCreated, LedgerEvent,
    TokenMetadata, Transfer, TransferFrom, Transferred,
};
pub use notification::Notification;
