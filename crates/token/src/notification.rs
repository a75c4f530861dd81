use serde::{Deserialize, Serialize};

use tokenledger_core::{Address, Amount};

/// Observable record of a successful ledger operation.
///
/// `Transfer` accompanies every balance movement, including the initial
/// issuance (from the null account). `Approval` accompanies every `approve`
/// call and nothing else.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Notification {
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Transfer { .. } => "Transfer",
            Notification::Approval { .. } => "Approval",
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            Notification::Transfer { amount, .. } | Notification::Approval { amount, .. } => *amount,
        }
    }
}
