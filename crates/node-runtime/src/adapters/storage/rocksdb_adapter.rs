//! # RocksDB Storage Adapter
//!
//! One database per node with a column family per concern. Each column family
//! is exposed as its own `KeyValueStore`, so the ledger and mempool never see
//! each other's keys.
//!
//! ## Column Families
//!
//! - `blocks` - committed blocks and the `lastBlock` marker
//! - `mempool` - pending bodies and the `receipts` aggregate

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, Direction, IteratorMode,
    Options, WriteBatch, WriteOptions, DB,
};
use shared_types::{BatchOperation, KeyValueStore, StorageError};

pub const CF_BLOCKS: &str = "blocks";
pub const CF_MEMPOOL: &str = "mempool";

pub const COLUMN_FAMILIES: &[&str] = &[CF_BLOCKS, CF_MEMPOOL];

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Block cache size in bytes (default: 256MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            block_cache_size: 256 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Smaller buffers, no sync.
    pub fn for_testing() -> Self {
        Self {
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// Open (or create) the node database under `path`.
pub fn open_database(path: &Path, config: &RocksDbConfig) -> Result<Arc<DB>, StorageError> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.set_write_buffer_size(config.write_buffer_size);
    opts.set_max_write_buffer_number(config.max_write_buffer_number);
    opts.set_compression_type(DBCompressionType::Snappy);

    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
    opts.set_block_based_table_factory(&block_opts);

    let descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
        .iter()
        .map(|name| {
            let mut cf_opts = Options::default();
            cf_opts.set_compression_type(DBCompressionType::Snappy);
            ColumnFamilyDescriptor::new(*name, cf_opts)
        })
        .collect();

    DB::open_cf_descriptors(&opts, path, descriptors)
        .map(Arc::new)
        .map_err(|e| db_error("open", e))
}

/// One column family of a shared database.
pub struct RocksDbStore {
    db: Arc<DB>,
    cf: &'static str,
    sync_writes: bool,
}

impl RocksDbStore {
    pub fn new(db: Arc<DB>, cf: &'static str, config: &RocksDbConfig) -> Self {
        Self {
            db,
            cf,
            sync_writes: config.sync_writes,
        }
    }

    fn handle(&self) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(self.cf)
            .ok_or_else(|| StorageError::DatabaseError(format!("missing column family {}", self.cf)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get_cf(self.handle()?, key)
            .map_err(|e| db_error("get", e))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put_cf_opt(self.handle()?, key, value, &self.write_options())
            .map_err(|e| db_error("put", e))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.db
            .delete_cf_opt(self.handle()?, key, &self.write_options())
            .map_err(|e| db_error("delete", e))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError> {
        let cf = self.handle()?;
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put_cf(cf, key, value),
                BatchOperation::Delete { key } => batch.delete_cf(cf, key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| db_error("batch write", e))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let iter = self
            .db
            .iterator_cf(self.handle()?, IteratorMode::From(prefix, Direction::Forward));

        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| db_error("scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

fn db_error(operation: &str, err: rocksdb::Error) -> StorageError {
    StorageError::DatabaseError(format!("RocksDB {operation} failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stores(dir: &TempDir) -> (RocksDbStore, RocksDbStore) {
        let config = RocksDbConfig::for_testing();
        let db = open_database(dir.path(), &config).unwrap();
        (
            RocksDbStore::new(db.clone(), CF_BLOCKS, &config),
            RocksDbStore::new(db, CF_MEMPOOL, &config),
        )
    }

    #[test]
    fn test_rocksdb_basic_operations() {
        let dir = TempDir::new().unwrap();
        let (blocks, _) = stores(&dir);

        blocks.put(b"0", b"genesis").unwrap();
        assert_eq!(blocks.get(b"0").unwrap(), Some(b"genesis".to_vec()));
        assert!(blocks.exists(b"0").unwrap());

        blocks.delete(b"0").unwrap();
        assert!(!blocks.exists(b"0").unwrap());
    }

    #[test]
    fn test_column_families_isolated() {
        let dir = TempDir::new().unwrap();
        let (blocks, mempool) = stores(&dir);

        blocks.put(b"lastBlock", b"3").unwrap();
        assert_eq!(mempool.get(b"lastBlock").unwrap(), None);
    }

    #[test]
    fn test_rocksdb_batch_write_and_prefix_scan() {
        let dir = TempDir::new().unwrap();
        let (_, mempool) = stores(&dir);

        mempool
            .atomic_batch_write(vec![
                BatchOperation::put(b"ab01".to_vec(), b"tx1".to_vec()),
                BatchOperation::put(b"ab02".to_vec(), b"tx2".to_vec()),
                BatchOperation::put(b"receipts".to_vec(), b"[]".to_vec()),
                BatchOperation::delete(b"ab02".to_vec()),
            ])
            .unwrap();

        let results = mempool.prefix_scan(b"ab").unwrap();
        assert_eq!(results, vec![(b"ab01".to_vec(), b"tx1".to_vec())]);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let (blocks, _) = stores(&dir);
            blocks.put(b"lastBlock", b"7").unwrap();
        }
        let (blocks, _) = stores(&dir);
        assert_eq!(blocks.get(b"lastBlock").unwrap(), Some(b"7".to_vec()));
    }
}
