//! Mempool error types.

use shared_types::StorageError;
use thiserror::Error;

pub type MempoolResult<T> = Result<T, MempoolError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MempoolError {
    /// Entry already pending.
    #[error("Entry {0} is already pending")]
    DuplicateEntry(String),

    #[error("Entry {0} not found")]
    NotFound(String),

    #[error("Mempool is full (capacity {capacity})")]
    PoolFull { capacity: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl MempoolError {
    /// Storage failures are not the submitter's fault.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MempoolError::Storage(_))
    }
}
