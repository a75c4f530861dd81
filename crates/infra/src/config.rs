//! Configuration loading and representation.
//!
//! Deployment parameters for a ledger, read from `LEDGER_*` environment
//! variables or a JSON document. Unset values fall back to the defaults the
//! deployment tooling uses ("PRAGMA" / "PMA", 18 decimals, 100 whole tokens).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tokenledger_core::{Address, ADDRESS_LEN};
use tokenledger_token::TokenMetadata;

pub const ENV_NAME: &str = "LEDGER_TOKEN_NAME";
pub const ENV_SYMBOL: &str = "LEDGER_TOKEN_SYMBOL";
pub const ENV_DECIMALS: &str = "LEDGER_TOKEN_DECIMALS";
pub const ENV_INITIAL_UNITS: &str = "LEDGER_INITIAL_UNITS";
pub const ENV_CREATOR: &str = "LEDGER_CREATOR";

/// Insecure development creator (`0x…01`).
pub const DEV_CREATOR: Address = {
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes[ADDRESS_LEN - 1] = 1;
    Address::from_bytes(bytes)
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("malformed config document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub initial_units: u128,
    pub creator: Address,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: "PRAGMA".to_string(),
            symbol: "PMA".to_string(),
            decimals: 18,
            initial_units: 100,
            creator: DEV_CREATOR,
        }
    }
}

impl LedgerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup (the environment, a map in tests, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_NAME) {
            config.name = name;
        }
        if let Some(symbol) = lookup(ENV_SYMBOL) {
            config.symbol = symbol;
        }
        if let Some(decimals) = lookup(ENV_DECIMALS) {
            config.decimals = decimals.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_DECIMALS,
                reason: format!("'{decimals}': {e}"),
            })?;
        }
        if let Some(units) = lookup(ENV_INITIAL_UNITS) {
            config.initial_units = units.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_INITIAL_UNITS,
                reason: format!("'{units}': {e}"),
            })?;
        }
        match lookup(ENV_CREATOR) {
            Some(creator) => {
                config.creator = creator.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: ENV_CREATOR,
                    reason: format!("{e}"),
                })?;
            }
            None => {
                tracing::warn!("{ENV_CREATOR} not set; using insecure dev default {DEV_CREATOR}");
            }
        }

        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata::new(self.name.clone(), self.symbol.clone(), self.decimals)
    }
}
