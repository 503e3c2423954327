//! # Storage Adapters
//!
//! `NodeStores` hands the ledger and the mempool their own key-value store.
//! In-memory stores are always available; the RocksDB backend needs the
//! `rocksdb` feature:
//!
//! ```toml
//! node-runtime = { path = "...", features = ["rocksdb"] }
//! ```

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{
    open_database, RocksDbConfig, RocksDbStore, CF_BLOCKS, CF_MEMPOOL, COLUMN_FAMILIES,
};

use std::path::Path;
use std::sync::Arc;

use shared_types::{InMemoryKeyValueStore, KeyValueStore};

use crate::container::config::StorageBackend;
use crate::error::NodeResult;

/// Directory under the data directory holding the RocksDB files.
pub const DATABASE_DIR: &str = "db";

#[derive(Clone)]
pub struct NodeStores {
    pub blocks: Arc<dyn KeyValueStore>,
    pub mempool: Arc<dyn KeyValueStore>,
}

impl NodeStores {
    pub fn in_memory() -> Self {
        Self {
            blocks: Arc::new(InMemoryKeyValueStore::new()),
            mempool: Arc::new(InMemoryKeyValueStore::new()),
        }
    }

    pub fn open(backend: StorageBackend, data_dir: &Path) -> NodeResult<Self> {
        match backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::Rocksdb => Self::rocksdb(data_dir),
        }
    }

    #[cfg(feature = "rocksdb")]
    fn rocksdb(data_dir: &Path) -> NodeResult<Self> {
        let config = RocksDbConfig::default();
        let db = open_database(&data_dir.join(DATABASE_DIR), &config)?;
        Ok(Self {
            blocks: Arc::new(RocksDbStore::new(db.clone(), CF_BLOCKS, &config)),
            mempool: Arc::new(RocksDbStore::new(db, CF_MEMPOOL, &config)),
        })
    }

    #[cfg(not(feature = "rocksdb"))]
    fn rocksdb(_data_dir: &Path) -> NodeResult<Self> {
        Err(crate::error::NodeError::Config(
            "storage backend rocksdb requires the `rocksdb` feature".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;

    #[test]
    fn test_memory_stores_are_separate() {
        let stores = NodeStores::open(StorageBackend::Memory, Path::new("unused")).unwrap();
        stores.blocks.put(b"receipts", b"x").unwrap();
        assert_eq!(stores.mempool.get(b"receipts").unwrap(), None);
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_backend_needs_feature() {
        let result = NodeStores::open(StorageBackend::Rocksdb, Path::new("unused"));
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
