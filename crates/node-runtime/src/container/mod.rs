//! # Node Container
//!
//! Configuration and the shared node context that owns the Ledger and the
//! Mempool. The consensus coordinator reaches the context only through the
//! `LedgerGateway` port.

pub mod config;
pub mod context;

pub use config::{NodeConfig, StorageBackend, DATA_DIR_ENV};
pub use context::{AddressActivity, NodeContext, NodeDependencies};
