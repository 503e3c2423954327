//! # Key-Value Store Capability
//!
//! The persistence engine is external; the ledger and mempool see only
//! get/put/delete over byte keys. Each concern (blocks, mempool) gets its own
//! store instance, which a disk-backed adapter maps to a column family.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::errors::StorageError;

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Abstract interface for key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StorageError>;

    /// Either all operations are applied or none are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError>;

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}

/// In-memory store for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(data.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|_| StorageError::LockPoisoned)?;
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|_| StorageError::LockPoisoned)?;
        data.remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|_| StorageError::LockPoisoned)?;
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let data = self.data.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = InMemoryKeyValueStore::new();
        store.put(b"lastBlock", b"7").unwrap();

        assert_eq!(store.get(b"lastBlock").unwrap(), Some(b"7".to_vec()));
        assert!(store.exists(b"lastBlock").unwrap());

        store.delete(b"lastBlock").unwrap();
        store.delete(b"lastBlock").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_batch_write_and_prefix_scan() {
        let store = InMemoryKeyValueStore::new();
        store
            .atomic_batch_write(vec![
                BatchOperation::put("block:1", "a"),
                BatchOperation::put("block:2", "b"),
                BatchOperation::put("other", "c"),
            ])
            .unwrap();
        store
            .atomic_batch_write(vec![BatchOperation::delete("block:2")])
            .unwrap();

        let scanned = store.prefix_scan(b"block:").unwrap();
        assert_eq!(scanned, vec![(b"block:1".to_vec(), b"a".to_vec())]);
        assert_eq!(store.len(), 2);
    }
}
