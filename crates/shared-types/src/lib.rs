//! # Shared Types Crate
//!
//! Domain entities shared by the Difficulty Engine, Validator, Mempool, Ledger and
//! Consensus Coordinator crates, plus the key-value storage capability they persist
//! through.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every cross-subsystem type is defined here.
//! - **Closed transaction shapes**: a transaction's behaviour is selected by the
//!   `TransactionKind` tag and matched exhaustively by consumers.
//! - **Canonical digests**: hashing helpers live next to the entities they cover, so
//!   every node recomputes identical hashes.

pub mod digest;
pub mod entities;
pub mod errors;
pub mod storage;

pub use digest::*;
pub use entities::*;
pub use errors::*;
pub use storage::{BatchOperation, InMemoryKeyValueStore, KeyValueStore};
