//! Infrastructure layer: event store, command pipeline, ledger hosting,
//! projections and configuration.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod service;


pub use command_dispatcher::{CommandDispatcher, Committed, DispatchError};
pub use config::{ConfigError, LedgerConfig};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent};
pub use projections::{HolderBook, HoldersProjection, HoldersProjectionError};
pub use service::LedgerService;
