//! # Key-Value Block Store
//!
//! Blocks are stored as JSON under their decimal block number; the
//! `lastBlock` key holds the number of the current tip.

use std::sync::Arc;

use shared_types::{BatchOperation, Block, BlockNumber, KeyValueStore, StorageError};
use tracing::debug;

use crate::ports::outbound::BlockStore;

pub const LAST_BLOCK_KEY: &str = "lastBlock";

pub struct KvBlockStore {
    store: Arc<dyn KeyValueStore>,
}

impl KvBlockStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn block_key(number: BlockNumber) -> Vec<u8> {
        number.to_string().into_bytes()
    }
}

impl BlockStore for KvBlockStore {
    fn put_block(&self, block: &Block) -> Result<(), StorageError> {
        let encoded =
            serde_json::to_vec(block).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut operations = vec![BatchOperation::put(Self::block_key(block.number()), encoded)];

        let is_tip = self
            .last_block_number()?
            .map_or(true, |last| block.number() >= last);
        if is_tip {
            operations.push(BatchOperation::put(
                LAST_BLOCK_KEY,
                block.number().to_string(),
            ));
        }
        self.store.atomic_batch_write(operations)
    }

    fn get_block(&self, number: BlockNumber) -> Result<Option<Block>, StorageError> {
        let key = Self::block_key(number);
        match self.store.get(&key)? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                StorageError::DataCorruption {
                    key: number.to_string(),
                    reason: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    fn last_block_number(&self) -> Result<Option<BlockNumber>, StorageError> {
        let Some(bytes) = self.store.get(LAST_BLOCK_KEY.as_bytes())? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Some)
            .ok_or_else(|| StorageError::DataCorruption {
                key: LAST_BLOCK_KEY.to_string(),
                reason: "not a block number".to_string(),
            })
    }

    fn truncate_above(&self, number: BlockNumber) -> Result<(), StorageError> {
        let Some(last) = self.last_block_number()? else {
            return Ok(());
        };
        if last <= number {
            return Ok(());
        }
        let mut operations: Vec<BatchOperation> = (number + 1..=last)
            .map(|n| BatchOperation::delete(Self::block_key(n)))
            .collect();
        operations.push(BatchOperation::put(LAST_BLOCK_KEY, number.to_string()));
        debug!("[tl-04] Deleting stored blocks {}..={}", number + 1, last);
        self.store.atomic_batch_write(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockTemplate, InMemoryKeyValueStore, Transaction, U256};

    fn block(number: u64) -> Block {
        let coinbase = Transaction::coinbase("miner", 1, number, number);
        Block::from_template(BlockTemplate {
            block_number: number,
            previous_hash: [number as u8; 32],
            timestamp: number,
            coinbase_transaction_hash: coinbase.hash,
            transactions: vec![coinbase],
            actions: vec![],
            difficulty: U256::one(),
            total_difficulty: U256::from(number + 1),
            challenge: U256::MAX,
            mined_by: "miner".into(),
        })
    }

    fn store() -> (Arc<InMemoryKeyValueStore>, KvBlockStore) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        (kv.clone(), KvBlockStore::new(kv))
    }

    #[test]
    fn test_put_updates_last_block() {
        let (kv, blocks) = store();
        assert_eq!(blocks.last_block_number().unwrap(), None);

        for n in 0..3 {
            blocks.put_block(&block(n)).unwrap();
        }
        assert_eq!(blocks.last_block_number().unwrap(), Some(2));
        assert_eq!(blocks.get_block(1).unwrap(), Some(block(1)));
        assert!(kv.get(b"2").unwrap().is_some());
    }

    #[test]
    fn test_truncate_deletes_and_moves_marker() {
        let (_, blocks) = store();
        for n in 0..6 {
            blocks.put_block(&block(n)).unwrap();
        }
        blocks.truncate_above(3).unwrap();

        assert_eq!(blocks.last_block_number().unwrap(), Some(3));
        assert!(blocks.get_block(4).unwrap().is_none());
        assert!(blocks.get_block(5).unwrap().is_none());
        assert!(blocks.get_block(3).unwrap().is_some());
    }

    #[test]
    fn test_corrupt_block_reported() {
        let (kv, blocks) = store();
        kv.put(b"7", b"garbage").unwrap();
        assert!(matches!(
            blocks.get_block(7),
            Err(StorageError::DataCorruption { .. })
        ));
    }
}
