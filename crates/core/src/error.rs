//! Domain error model.

use thiserror::Error;

use crate::amount::Amount;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a deterministic rejection: the ledger is left exactly as
/// it was and the caller may retry with corrected inputs. The `Display`
/// output is the human-readable reason surfaced to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// `transfer` / `transfer_from` targeted the null account.
    #[error("ERC20: transfer to the zero address")]
    InvalidRecipient,

    /// `approve` targeted the null account as spender.
    #[error("ERC20: approve to the zero address")]
    InvalidSpender,

    /// The source account holds less than the requested amount.
    #[error("ERC20: transfer amount exceeds balance")]
    InsufficientBalance { available: Amount, requested: Amount },

    /// The caller's delegated allowance is smaller than the requested amount.
    #[error("ERC20: insufficient allowance")]
    InsufficientAllowance { available: Amount, requested: Amount },

    /// A value failed validation (e.g. creation parameters).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Address text could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Amount text could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The ledger has not been created yet.
    #[error("ledger not created")]
    NotCreated,

    /// A conflict occurred (double creation, stale version).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Human-readable rejection reason.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
