//! # Error Types
//!
//! Error types and node states used across subsystems.

use thiserror::Error;

/// Persistence layer failures.
///
/// Always propagated to the caller of the operation that triggered them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Key not found in storage.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored bytes could not be decoded.
    #[error("Data corruption for key {key}: {reason}")]
    DataCorruption { key: String, reason: String },

    /// Value could not be encoded for storage.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A lock guarding the store was poisoned.
    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Malformed transaction, action or block shape.
///
/// Raised before any stateful check and never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Header hash list does not match the block body.
    #[error("Header {list} hashes do not match block body")]
    HashListMismatch { list: &'static str },

    /// The same entry appears twice in one block.
    #[error("Duplicate entry {0} in block")]
    DuplicateEntry(String),

    /// Block carries no transactions at all.
    #[error("Block {0} has no transactions")]
    EmptyBlock(u64),

    /// Action payload does not decode to the expected record.
    #[error("Malformed action payload: {0}")]
    MalformedPayload(String),

    /// Entry could not be decoded.
    #[error("Malformed encoding: {0}")]
    Malformed(String),
}

/// Node operational states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Normal operation.
    #[default]
    Running,
    /// Synchronizing with the network.
    Syncing,
    /// Halted after a partial rollback (awaiting intervention).
    HaltedAwaitingIntervention,
}

impl NodeState {
    /// Whether the node may accept new blocks in this state.
    pub fn accepts_blocks(&self) -> bool {
        !matches!(self, NodeState::HaltedAwaitingIntervention)
    }
}
