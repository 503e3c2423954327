//! # Validator (TL-02)
//!
//! Decides whether a single transaction or action may enter the mempool or a
//! block. The validator keeps no state of its own: balances, accounts, contract
//! APIs and spent hashes are read through the outbound ports.
//!
//! ## Architecture
//!
//! - **Ports** (`ports/`): read capabilities the validator consumes
//! - **Adapters** (`adapters/`): in-memory account and contract registries
//! - **Service** (`service.rs`): the rule sequences
//!
//! ## Rule Ordering
//!
//! Every rule sequence short-circuits: the first failing check is the reason
//! reported, so two nodes always reject the same entry for the same reason.
//!
//! | Kind | Order |
//! |------|-------|
//! | simple / stake / allocation | checksum, keys, signature, sender ≠ receiver, funds, amount > 0, fee, size |
//! | call | known sender, known receiver, receiver is contract, checksum, signature, fee, size, sender ≠ receiver, funds |
//! | payable | call rules on the payable, then reference: same account, signature, contract, method emits `Payable`, unused, contract match |
//! | coinbase | checksum, amount ≤ reward, size |
//! | action | account existence, checksum, key, signature, fee > 0, size, funds |
//!
//! An already-spent hash is rejected before any of the above.

pub mod adapters;
pub mod config;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::memory::{InMemoryAccountRegistry, InMemoryContractRegistry};
pub use config::ValidatorConfig;
pub use error::{ValidationError, ValidationResult};
pub use ports::outbound::{
    AccountRegistry, BalanceProvider, ContractInfo, ContractMethod, ContractRegistry,
    SpentHashView,
};
pub use service::{Validator, ValidatorDependencies};
