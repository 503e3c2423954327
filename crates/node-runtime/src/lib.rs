//! # Node Runtime Library
//!
//! Wires one Tandem Ledger node: the Ledger and the Mempool behind a single
//! coordinating lock (`NodeContext`), the Consensus Coordinator task driving
//! block production, and the host adapters (storage, data-directory lock,
//! peer transport). The `main.rs` binary is a thin shell over this library.
//!
//! ## Layout
//!
//! - `container/` - configuration and the shared node context
//! - `genesis/` - deterministic block 0
//! - `adapters/` - storage backends, lock file, outbound transport
//! - `runtime` - coordinator task and peer payload delivery

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod error;
pub mod genesis;
pub mod runtime;

pub use adapters::{ChannelTransport, DataDirLock, NodeStores, PeerPayload};
pub use container::{AddressActivity, NodeConfig, NodeContext, NodeDependencies, StorageBackend};
pub use error::{NodeError, NodeResult};
pub use genesis::{GenesisAllocation, GenesisBuilder, GenesisConfig};
pub use runtime::NodeRuntime;
