//! # Ledger (TL-04)
//!
//! Owns the canonical header chain, the spent-hash sets, the block pool and the
//! fork/rollback logic.
//!
//! ## Block Handling
//!
//! ```text
//! received ──validate──→ validated ──route──→ extended     (linked to head, committed)
//!                                        ├──→ reorganized  (pooled branch won fork choice)
//!                                        ├──→ resync       (major fork, rolled back)
//!                                        ├──→ kept         (pooled branch lost fork choice)
//!                                        └──→ pooled       (awaiting a linking block)
//! ```
//!
//! ## Fork Choice
//!
//! A branch replaces the canonical chain only if its total difficulty is
//! strictly greater, or its tip is at least `longer_branch_margin` blocks ahead.
//! Equal work and equal length keeps the current head.
//!
//! ## Fail-Closed Rollback
//!
//! Rollback touches external state (balances, accounts, contracts, block store).
//! If any of those steps fails the ledger enters
//! `NodeState::HaltedAwaitingIntervention` and refuses further blocks.
//!
//! ## Concurrency
//!
//! All mutating methods take `&mut self`. The node wraps the ledger and mempool
//! in one coordinating lock so assembly, proposal and commit never interleave
//! with a rollback.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::balance_table::BalanceTable;
pub use adapters::block_store::KvBlockStore;
pub use adapters::time::SystemTimeSource;
pub use config::{ConsensusMode, LedgerConfig};
pub use domain::chain::HeaderChain;
pub use domain::fork_choice::{prefer_branch, ChainTip};
pub use domain::pool::BlockPool;
pub use domain::snapshot::Snapshot;
pub use domain::spent::{SpentEntry, SpentIndex};
pub use error::{LedgerError, LedgerResult};
pub use ports::outbound::{BlockStore, StateRollback, TimeSource};
pub use service::{AddressHistory, ChainVerdict, Ledger, LedgerDependencies, RouteOutcome};
