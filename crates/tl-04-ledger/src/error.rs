//! # Ledger Errors
//!
//! | Variant family | Handling |
//! |----------------|----------|
//! | `Format` | rejected before stateful checks, never retried |
//! | block rule variants | block rejected, chain untouched |
//! | `Storage` | propagated to the caller |
//! | `RollbackFailed` | fatal, node halts |

use shared_types::{BlockNumber, FormatError, StorageError};
use thiserror::Error;
use tl_02_validator::ValidationError;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Malformed block: {0}")]
    Format(#[from] FormatError),

    #[error("Entry {hash} in block {number} is invalid: {source}")]
    InvalidEntry {
        number: BlockNumber,
        hash: String,
        source: ValidationError,
    },

    #[error("Block {0} hash does not match its contents")]
    InvalidHash(BlockNumber),

    #[error("Block {number} has {found} coinbase transactions")]
    CoinbaseCount { number: BlockNumber, found: usize },

    #[error("Coinbase of block {0} is not the one the block records")]
    CoinbaseNotAttached(BlockNumber),

    #[error("Block {number} fails consensus check: {reason}")]
    ConsensusCheck { number: BlockNumber, reason: String },

    #[error("Block {number} {list} merkle root mismatch")]
    MerkleMismatch {
        number: BlockNumber,
        list: &'static str,
    },

    #[error("Block {number} spends {hash} twice")]
    DoubleSpend { number: BlockNumber, hash: String },

    #[error("Block {number} timestamp rejected: {reason}")]
    InvalidTimestamp {
        number: BlockNumber,
        reason: &'static str,
    },

    #[error("Block {number} header field {field} inconsistent with parent")]
    HeaderMismatch {
        number: BlockNumber,
        field: &'static str,
    },

    #[error("Block {0} already known")]
    DuplicateBlock(String),

    #[error("Block {0} not found")]
    UnknownBlock(String),

    #[error("Ledger has no genesis block")]
    NotInitialized,

    #[error("Genesis block is invalid: {0}")]
    InvalidGenesis(String),

    #[error("Rollback to block {target} failed: {reason}")]
    RollbackFailed { target: BlockNumber, reason: String },

    #[error("Ledger halted awaiting intervention")]
    Halted,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LedgerError {
    /// Whether the node can keep operating after this error.
    pub fn is_recoverable(&self) -> bool {
        !self.is_critical()
    }

    /// Errors that leave the node unable to accept blocks.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            LedgerError::RollbackFailed { .. } | LedgerError::Halted | LedgerError::Storage(_)
        )
    }

    /// Double-spend or payable reference reuse.
    pub fn is_double_use(&self) -> bool {
        match self {
            LedgerError::DoubleSpend { .. } => true,
            LedgerError::InvalidEntry { source, .. } => source.is_double_use(),
            _ => false,
        }
    }
}
