//! Node-level errors: everything the exposed operations can report.

use shared_crypto::CryptoError;
use shared_types::StorageError;
use thiserror::Error;
use tl_02_validator::ValidationError;
use tl_03_mempool::MempoolError;
use tl_04_ledger::LedgerError;

use crate::genesis::GenesisError;

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data directory {path} is locked by another process")]
    DirectoryLocked { path: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Genesis(#[from] GenesisError),

    /// Submitted entry failed validation against the committed chain.
    #[error("Rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Identity key: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Consensus coordinator stopped")]
    CoordinatorStopped,
}

impl NodeError {
    /// Whether the node can keep operating after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            NodeError::Validation(_) => true,
            NodeError::Ledger(err) => err.is_recoverable(),
            NodeError::Mempool(err) => err.is_recoverable(),
            _ => false,
        }
    }

    /// Double-spend or payable reference reuse, from any layer.
    pub fn is_double_use(&self) -> bool {
        match self {
            NodeError::Validation(err) => err.is_double_use(),
            NodeError::Ledger(err) => err.is_double_use(),
            _ => false,
        }
    }
}
