//! # Genesis Module
//!
//! Block 0 has special properties:
//!
//! - Number 0, previous hash of 32 zero bytes
//! - Carries the initial allocations as reward transactions
//! - Exempt from transaction validation; the ledger only checks its shape
//!   and hash
//!
//! Every node of a network must build byte-identical genesis blocks, so the
//! timestamp comes from configuration rather than the clock.

pub mod builder;

pub use builder::{GenesisAllocation, GenesisBuilder, GenesisConfig, GenesisError};
