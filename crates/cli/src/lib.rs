//! JSON-lines host for a single in-memory token ledger.

pub mod dto;
pub mod errors;
pub mod session;

pub use session::Session;
