//! Token amounts in smallest units.

use core::fmt;
use core::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Unsigned token amount, expressed in the smallest unit (`10^-decimals` of a whole token).
///
/// Serialized as a decimal string so values above `u64::MAX` survive JSON payloads.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Largest representable amount; conventionally used as an "unlimited" allowance.
    pub const MAX: Amount = Amount(u128::MAX);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// `units * 10^decimals`, or `None` on overflow.
    pub fn from_units(units: u128, decimals: u8) -> Option<Amount> {
        10u128
            .checked_pow(u32::from(decimals))
            .and_then(|scale| units.checked_mul(scale))
            .map(Amount)
    }

    /// Parse a human-readable decimal string (e.g. `"20"`, `"0.5"`) into smallest units.
    pub fn parse_units(text: &str, decimals: u8) -> DomainResult<Amount> {
        let text = text.trim();
        let (whole, fraction) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(DomainError::invalid_amount("empty amount"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::invalid_amount(format!("'{text}' is not a decimal number")));
        }
        if fraction.len() > usize::from(decimals) {
            return Err(DomainError::invalid_amount(format!(
                "'{text}' has more than {decimals} fractional digits"
            )));
        }

        let overflow = || DomainError::invalid_amount(format!("'{text}' overflows the amount range"));

        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let whole_scaled = Amount::from_units(whole_units, decimals).ok_or_else(overflow)?;

        let fraction_scaled = if fraction.is_empty() {
            Amount::ZERO
        } else {
            let digits: u128 = fraction.parse().map_err(|_| overflow())?;
            let pad = decimals - fraction.len() as u8;
            Amount::from_units(digits, pad).ok_or_else(overflow)?
        };

        whole_scaled.checked_add(fraction_scaled).ok_or_else(overflow)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<Amount> for u128 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|e| DomainError::invalid_amount(format!("'{s}': {e}")))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(u128::from(v)))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
