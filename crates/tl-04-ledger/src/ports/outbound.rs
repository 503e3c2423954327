//! # Outbound Ports (Driven Ports)
//!
//! Capabilities the ledger requires from the host. Balances, accounts and
//! contracts are read through the validator's ports; the traits here cover
//! persistence, external state rollback and time.

use shared_types::{Block, BlockNumber, StorageError, Timestamp};

/// Full block persistence keyed by block number.
///
/// Production: `KvBlockStore` over the node's key-value store.
pub trait BlockStore: Send + Sync {
    /// Persist `block` and advance the last-block marker if it is the new tip.
    fn put_block(&self, block: &Block) -> Result<(), StorageError>;

    fn get_block(&self, number: BlockNumber) -> Result<Option<Block>, StorageError>;

    fn last_block_number(&self) -> Result<Option<BlockNumber>, StorageError>;

    /// Delete every block above `number` and move the last-block marker to it.
    fn truncate_above(&self, number: BlockNumber) -> Result<(), StorageError>;
}

/// External state (balances, contract state) derived from committed blocks.
///
/// `apply_block` must be all-or-nothing per block; `rollback_to` restores the
/// state as of the end of block `number`.
pub trait StateRollback: Send + Sync {
    fn apply_block(&self, block: &Block) -> Result<(), StorageError>;

    fn rollback_to(&self, number: BlockNumber) -> Result<(), StorageError>;
}

/// Wall clock, abstracted for tests.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}
