//! Projection implementations (read model builders).
//!
//! Projections consume published ledger events and are rebuildable from the
//! event stream at any time.

pub mod holders;

pub use holders::{HolderBook, HoldersProjection, HoldersProjectionError};
