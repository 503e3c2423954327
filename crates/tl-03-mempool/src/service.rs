//! # Mempool Service
//!
//! Couples the in-memory receipt pool with the persisted bodies. Every
//! mutation holds the pool lock from decision to persistence.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{
    hash_to_hex, short_hex, Action, Block, BatchOperation, Hash, KeyValueStore, StorageError,
    Transaction,
};
use tracing::{debug, info, instrument, warn};

use crate::config::MempoolConfig;
use crate::domain::entities::{Batch, EntryKind, PendingEntry, Receipt};
use crate::domain::pool::ReceiptPool;
use crate::error::{MempoolError, MempoolResult};

/// Key of the persisted receipt aggregate.
pub const RECEIPTS_KEY: &str = "receipts";

/// Pending transactions touching one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingHistory {
    pub sent: Vec<Transaction>,
    pub received: Vec<Transaction>,
}

pub struct Mempool {
    config: MempoolConfig,
    store: Arc<dyn KeyValueStore>,
    pool: Mutex<ReceiptPool>,
}

impl Mempool {
    pub fn new(config: MempoolConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            store,
            pool: Mutex::new(ReceiptPool::new()),
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    /// Reload the persisted receipt set. Reservations do not survive a restart.
    pub fn load(&self) -> MempoolResult<usize> {
        let Some(bytes) = self.store.get(RECEIPTS_KEY.as_bytes())? else {
            return Ok(0);
        };
        let receipts: Vec<Receipt> =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::DataCorruption {
                key: RECEIPTS_KEY.to_string(),
                reason: e.to_string(),
            })?;

        let mut pool = self.pool.lock();
        let loaded = receipts
            .into_iter()
            .filter(|receipt| pool.insert(receipt.clone()))
            .count();
        info!("[tl-03] Loaded {} pending entries", loaded);
        Ok(loaded)
    }

    pub fn submit_transaction(&self, tx: Transaction) -> MempoolResult<Receipt> {
        self.submit(PendingEntry::Transaction(tx))
    }

    pub fn submit_action(&self, action: Action) -> MempoolResult<Receipt> {
        self.submit(PendingEntry::Action(action))
    }

    fn submit(&self, entry: PendingEntry) -> MempoolResult<Receipt> {
        let receipt = entry.receipt();
        let mut pool = self.pool.lock();

        if pool.contains(&receipt.hash) {
            return Err(MempoolError::DuplicateEntry(short_hex(&receipt.hash)));
        }
        if pool.len() >= self.config.capacity {
            return Err(MempoolError::PoolFull {
                capacity: self.config.capacity,
            });
        }

        let body = encode(&entry)?;
        pool.insert(receipt.clone());
        let ops = vec![
            BatchOperation::put(body_key(&receipt.hash), body),
            BatchOperation::put(RECEIPTS_KEY, encode_receipts(&pool)?),
        ];
        if let Err(err) = self.store.atomic_batch_write(ops) {
            pool.remove(&receipt.hash);
            return Err(err.into());
        }

        debug!(
            "[tl-03] Accepted {:?} {} ({} bytes)",
            receipt.kind,
            short_hex(&receipt.hash),
            receipt.size
        );
        Ok(receipt)
    }

    /// Reserve available entries for one candidate block, staying within
    /// `byte_budget`. Entries that do not fit are skipped, smaller ones later in
    /// the order may still be taken.
    #[instrument(skip(self))]
    pub fn gather_for_block(&self, byte_budget: usize) -> MempoolResult<Batch> {
        let mut pool = self.pool.lock();

        let mut batch = Batch::default();
        let mut selected = Vec::new();
        let mut missing = Vec::new();
        for receipt in pool.ordered_available(self.config.selection_order) {
            if batch.bytes + receipt.size > byte_budget {
                continue;
            }
            match self.read_entry(&receipt.hash)? {
                Some(entry) => {
                    batch.push(entry, receipt.size);
                    selected.push(receipt.hash);
                }
                None => missing.push(receipt.hash),
            }
        }

        for hash in &missing {
            warn!("[tl-03] Dropping receipt {} without a stored body", short_hex(hash));
            pool.remove(hash);
        }
        for hash in &selected {
            pool.reserve(hash);
        }
        if !selected.is_empty() || !missing.is_empty() {
            // an unreturned batch can never be put back
            if let Err(err) = self.persist_receipts(&pool) {
                for hash in &selected {
                    pool.release(hash);
                }
                return Err(err);
            }
        }

        debug!(
            "[tl-03] Gathered {} entries ({} bytes), {} still available",
            batch.len(),
            batch.bytes,
            pool.available_count()
        );
        Ok(batch)
    }

    /// Permanently delete the entries a committed block contains.
    pub fn commit(&self, block: &Block) -> MempoolResult<usize> {
        self.commit_hashes(block_hashes(block))
    }

    pub fn commit_hashes(&self, hashes: impl IntoIterator<Item = Hash>) -> MempoolResult<usize> {
        let mut pool = self.pool.lock();
        let mut ops = Vec::new();
        for hash in hashes {
            if pool.remove(&hash).is_some() {
                ops.push(BatchOperation::delete(body_key(&hash)));
            }
        }
        let removed = ops.len();
        if removed > 0 {
            ops.push(BatchOperation::put(RECEIPTS_KEY, encode_receipts(&pool)?));
            self.store.atomic_batch_write(ops)?;
            debug!("[tl-03] Purged {} committed entries", removed);
        }
        Ok(removed)
    }

    /// Return a discarded candidate's entries to the available side.
    pub fn putback(&self, block: &Block) -> MempoolResult<usize> {
        self.putback_hashes(block_hashes(block))
    }

    pub fn putback_hashes(&self, hashes: impl IntoIterator<Item = Hash>) -> MempoolResult<usize> {
        let mut pool = self.pool.lock();
        let restored = hashes.into_iter().filter(|hash| pool.release(hash)).count();
        if restored > 0 {
            self.persist_receipts(&pool)?;
            debug!("[tl-03] Restored {} entries", restored);
        }
        Ok(restored)
    }

    /// Delete one entry, reserved or not. Returns whether it was pending.
    pub fn reject(&self, hash: &Hash) -> MempoolResult<bool> {
        let mut pool = self.pool.lock();
        if pool.remove(hash).is_none() {
            return Ok(false);
        }
        self.store.atomic_batch_write(vec![
            BatchOperation::delete(body_key(hash)),
            BatchOperation::put(RECEIPTS_KEY, encode_receipts(&pool)?),
        ])?;
        debug!("[tl-03] Rejected {}", short_hex(hash));
        Ok(true)
    }

    pub fn size(&self) -> usize {
        self.pool.lock().len()
    }

    pub fn available_count(&self) -> usize {
        self.pool.lock().available_count()
    }

    pub fn reserved_count(&self) -> usize {
        self.pool.lock().reserved_count()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.pool.lock().contains(hash)
    }

    pub fn get_entry(&self, hash: &Hash) -> MempoolResult<Option<PendingEntry>> {
        if !self.contains(hash) {
            return Ok(None);
        }
        self.read_entry(hash)
    }

    pub fn get_transaction(&self, hash: &Hash) -> MempoolResult<Option<Transaction>> {
        Ok(match self.get_entry(hash)? {
            Some(PendingEntry::Transaction(tx)) => Some(tx),
            _ => None,
        })
    }

    /// Pending transactions sent from or to `address`.
    pub fn pending_history(&self, address: &str) -> MempoolResult<PendingHistory> {
        let receipts: Vec<Receipt> = {
            let pool = self.pool.lock();
            pool.all()
                .filter(|r| r.kind == EntryKind::Transaction && r.involves(address))
                .cloned()
                .collect()
        };

        let mut history = PendingHistory::default();
        for receipt in receipts {
            if let Some(PendingEntry::Transaction(tx)) = self.read_entry(&receipt.hash)? {
                if tx.from_address == address {
                    history.sent.push(tx.clone());
                }
                if tx.to_address == address {
                    history.received.push(tx);
                }
            }
        }
        history.sent.sort_by_key(|tx| (tx.timestamp, tx.hash));
        history.received.sort_by_key(|tx| (tx.timestamp, tx.hash));
        Ok(history)
    }

    /// Available receipts, oldest first.
    pub fn by_timestamp(&self) -> Vec<Receipt> {
        self.ordered(crate::config::SelectionOrder::Timestamp)
    }

    /// Available receipts, highest fee first.
    pub fn by_fee(&self) -> Vec<Receipt> {
        self.ordered(crate::config::SelectionOrder::Fee)
    }

    fn ordered(&self, order: crate::config::SelectionOrder) -> Vec<Receipt> {
        self.pool
            .lock()
            .ordered_available(order)
            .into_iter()
            .cloned()
            .collect()
    }

    fn read_entry(&self, hash: &Hash) -> MempoolResult<Option<PendingEntry>> {
        let key = body_key(hash);
        match self.store.get(key.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| {
                    StorageError::DataCorruption {
                        key,
                        reason: e.to_string(),
                    }
                    .into()
                }),
            None => Ok(None),
        }
    }

    fn persist_receipts(&self, pool: &ReceiptPool) -> MempoolResult<()> {
        self.store
            .put(RECEIPTS_KEY.as_bytes(), &encode_receipts(pool)?)?;
        Ok(())
    }
}

fn body_key(hash: &Hash) -> String {
    hash_to_hex(hash)
}

fn block_hashes(block: &Block) -> Vec<Hash> {
    block
        .header
        .tx_hashes
        .iter()
        .chain(block.header.action_hashes.iter())
        .copied()
        .collect()
}

fn encode(entry: &PendingEntry) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(entry).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn encode_receipts(pool: &ReceiptPool) -> Result<Vec<u8>, StorageError> {
    let mut receipts: Vec<&Receipt> = pool.all().collect();
    receipts.sort_by_key(|r| r.hash);
    serde_json::to_vec(&receipts).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{ActionType, BlockTemplate, InMemoryKeyValueStore, TransactionKind, U256};
    use std::collections::HashSet;

    fn tx(n: u64, from: &str, to: &str, fee: u64) -> Transaction {
        Transaction::new(
            TransactionKind::Simple,
            from,
            to,
            10,
            json!(""),
            1_000 + n,
            n,
            fee,
        )
    }

    fn mempool() -> (Mempool, Arc<InMemoryKeyValueStore>) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        (Mempool::new(MempoolConfig::for_testing(), store.clone()), store)
    }

    fn block_with(transactions: Vec<Transaction>) -> Block {
        Block::from_template(BlockTemplate {
            block_number: 1,
            previous_hash: [0; 32],
            timestamp: 1,
            coinbase_transaction_hash: transactions[0].hash,
            transactions,
            actions: vec![],
            difficulty: U256::one(),
            total_difficulty: U256::one(),
            challenge: U256::MAX,
            mined_by: "a".into(),
        })
    }

    // ===== SUBMISSION TESTS =====

    #[test]
    fn test_submit_persists_body_and_receipts() {
        let (mempool, store) = mempool();
        let t = tx(1, "a", "b", 3);
        let receipt = mempool.submit_transaction(t.clone()).unwrap();

        assert_eq!(receipt.fee, 3);
        assert_eq!(mempool.size(), 1);
        assert!(store.get(hash_to_hex(&t.hash).as_bytes()).unwrap().is_some());
        assert!(store.get(RECEIPTS_KEY.as_bytes()).unwrap().is_some());
        assert_eq!(mempool.get_transaction(&t.hash).unwrap(), Some(t));
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let (mempool, _) = mempool();
        let t = tx(1, "a", "b", 3);
        mempool.submit_transaction(t.clone()).unwrap();
        assert!(matches!(
            mempool.submit_transaction(t),
            Err(MempoolError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_capacity_enforced() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let config = MempoolConfig {
            capacity: 1,
            ..MempoolConfig::for_testing()
        };
        let mempool = Mempool::new(config, store);
        mempool.submit_transaction(tx(1, "a", "b", 1)).unwrap();
        assert_eq!(
            mempool.submit_transaction(tx(2, "a", "b", 1)),
            Err(MempoolError::PoolFull { capacity: 1 })
        );
    }

    // ===== RESERVATION TESTS =====

    #[test]
    fn test_gather_reserves_within_budget() {
        let (mempool, _) = mempool();
        let first = tx(1, "a", "b", 1);
        let second = tx(2, "a", "b", 1);
        let budget = first.serialized_size() + second.serialized_size();
        mempool.submit_transaction(first.clone()).unwrap();
        mempool.submit_transaction(second).unwrap();
        mempool.submit_transaction(tx(3, "a", "b", 1)).unwrap();

        // exactly the two oldest fit
        let batch = mempool.gather_for_block(budget).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.transactions[0], first);
        assert_eq!(batch.bytes, budget);
        assert_eq!((mempool.available_count(), mempool.reserved_count()), (1, 2));

        let rest = mempool.gather_for_block(usize::MAX).unwrap();
        assert_eq!(rest.len(), 1);
        assert!(mempool.gather_for_block(usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_commit_deletes_and_putback_restores() {
        let (mempool, store) = mempool();
        let a = tx(1, "a", "b", 1);
        let b = tx(2, "a", "b", 1);
        mempool.submit_transaction(a.clone()).unwrap();
        mempool.submit_transaction(b.clone()).unwrap();
        mempool.gather_for_block(usize::MAX).unwrap();

        assert_eq!(mempool.putback(&block_with(vec![b.clone()])).unwrap(), 1);
        assert_eq!(mempool.commit(&block_with(vec![a.clone()])).unwrap(), 1);

        assert_eq!(mempool.size(), 1);
        assert_eq!(mempool.available_count(), 1);
        assert!(store.get(hash_to_hex(&a.hash).as_bytes()).unwrap().is_none());
        assert!(mempool.contains(&b.hash));
    }

    #[test]
    fn test_concurrent_gathers_never_overlap() {
        let (mempool, _) = mempool();
        for n in 0..200 {
            mempool.submit_transaction(tx(n, "a", "b", 1)).unwrap();
        }

        let batches: Vec<Batch> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| mempool.gather_for_block(5_000).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut seen = HashSet::new();
        for batch in &batches {
            for hash in batch.hashes() {
                assert!(seen.insert(hash), "entry gathered twice");
            }
        }
        assert_eq!(mempool.reserved_count(), seen.len());
    }

    /// Store whose single-key writes fail once `broken` is set.
    #[derive(Default)]
    struct BrokenStore {
        inner: InMemoryKeyValueStore,
        broken: std::sync::atomic::AtomicBool,
    }

    impl BrokenStore {
        fn check(&self) -> Result<(), StorageError> {
            if self.broken.load(std::sync::atomic::Ordering::SeqCst) {
                Err(StorageError::DatabaseError("disk full".into()))
            } else {
                Ok(())
            }
        }
    }

    impl KeyValueStore for BrokenStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
            self.check()?;
            self.inner.put(key, value)
        }

        fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
            self.inner.delete(key)
        }

        fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError> {
            self.inner.atomic_batch_write(operations)
        }

        fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
            self.inner.prefix_scan(prefix)
        }
    }

    #[test]
    fn test_failed_gather_leaves_entries_available() {
        let store = Arc::new(BrokenStore::default());
        let mempool = Mempool::new(MempoolConfig::for_testing(), store.clone());
        mempool.submit_transaction(tx(1, "a", "b", 1)).unwrap();
        mempool.submit_transaction(tx(2, "a", "b", 1)).unwrap();

        store.broken.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(
            mempool.gather_for_block(usize::MAX),
            Err(MempoolError::Storage(_))
        ));
        assert_eq!((mempool.available_count(), mempool.reserved_count()), (2, 0));

        store.broken.store(false, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(mempool.gather_for_block(usize::MAX).unwrap().len(), 2);
    }

    #[test]
    fn test_reject_removes_reserved_entry() {
        let (mempool, _) = mempool();
        let t = tx(1, "a", "b", 1);
        mempool.submit_transaction(t.clone()).unwrap();
        mempool.gather_for_block(usize::MAX).unwrap();

        assert!(mempool.reject(&t.hash).unwrap());
        assert!(!mempool.reject(&t.hash).unwrap());
        assert_eq!(mempool.size(), 0);
    }

    // ===== PERSISTENCE TESTS =====

    #[test]
    fn test_reload_returns_reserved_to_available() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let mempool = Mempool::new(MempoolConfig::for_testing(), store.clone());
        mempool.submit_transaction(tx(1, "a", "b", 1)).unwrap();
        mempool.submit_transaction(tx(2, "a", "b", 1)).unwrap();
        mempool.gather_for_block(usize::MAX).unwrap();

        let restarted = Mempool::new(MempoolConfig::for_testing(), store);
        assert_eq!(restarted.load().unwrap(), 2);
        assert_eq!(restarted.available_count(), 2);
        assert_eq!(restarted.reserved_count(), 0);
    }

    #[test]
    fn test_corrupt_receipts_surface_storage_error() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.put(RECEIPTS_KEY.as_bytes(), b"not json").unwrap();
        let mempool = Mempool::new(MempoolConfig::for_testing(), store);

        let err = mempool.load().unwrap_err();
        assert!(!err.is_recoverable());
    }

    // ===== QUERY TESTS =====

    #[test]
    fn test_pending_history_and_actions() {
        let (mempool, _) = mempool();
        mempool.submit_transaction(tx(1, "a", "b", 1)).unwrap();
        mempool.submit_transaction(tx(2, "b", "a", 1)).unwrap();
        mempool.submit_transaction(tx(3, "c", "d", 1)).unwrap();
        mempool
            .submit_action(Action::new("a", ActionType::Account, "create", json!({}), 1, 5))
            .unwrap();

        let history = mempool.pending_history("a").unwrap();
        assert_eq!(history.sent.len(), 1);
        assert_eq!(history.received.len(), 1);

        let batch = mempool.gather_for_block(usize::MAX).unwrap();
        assert_eq!(batch.actions.len(), 1);
        assert_eq!(batch.total_fees(), 4);
    }

    #[test]
    fn test_fee_ordering_helper() {
        let (mempool, _) = mempool();
        mempool.submit_transaction(tx(1, "a", "b", 1)).unwrap();
        mempool.submit_transaction(tx(2, "a", "b", 7)).unwrap();

        let fees: Vec<u64> = mempool.by_fee().iter().map(|r| r.fee).collect();
        assert_eq!(fees, vec![7, 1]);
        let times: Vec<u64> = mempool.by_timestamp().iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![1_001, 1_002]);
    }
}
