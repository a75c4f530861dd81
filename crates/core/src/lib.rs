//! `tokenledger-core` - domain foundation building blocks.
//!
//! Account identifiers, amounts, the error taxonomy and the aggregate traits.
//! No infrastructure concerns live here.

pub mod address;
pub mod aggregate;
pub mod amount;
pub mod error;
pub mod id;

pub use address::{Address, ADDRESS_LEN};
pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use amount::Amount;
pub use error::{DomainError, DomainResult};
pub use id::LedgerId;
