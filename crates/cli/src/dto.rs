use serde::Deserialize;

use tokenledger_core::{Address, Amount};

// -------------------------
// Request DTOs
// -------------------------

/// One line of input, selected by its `op` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Metadata,
    TotalSupply,
    BalanceOf {
        account: Address,
    },
    Allowance {
        owner: Address,
        spender: Address,
    },
    Transfer {
        caller: Address,
        to: Address,
        amount: Amount,
    },
    Approve {
        caller: Address,
        spender: Address,
        amount: Amount,
    },
    TransferFrom {
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// Non-zero holders as seen by the holders projection.
    Holders,
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Metadata => "metadata",
            Request::TotalSupply => "total_supply",
            Request::BalanceOf { .. } => "balance_of",
            Request::Allowance { .. } => "allowance",
            Request::Transfer { .. } => "transfer",
            Request::Approve { .. } => "approve",
            Request::TransferFrom { .. } => "transfer_from",
            Request::Holders => "holders",
        }
    }
}
