//! # Block Pool
//!
//! Bounded holding area for blocks that do not link to the canonical head.
//! Oldest entries are evicted first.

use std::collections::{HashMap, VecDeque};

use shared_types::{Block, BlockHeader, Hash};

#[derive(Debug)]
pub struct BlockPool {
    capacity: usize,
    order: VecDeque<Hash>,
    blocks: HashMap<Hash, Block>,
}

impl BlockPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            blocks: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.get(hash)
    }

    /// Adds a block, evicting the oldest entry when full. Returns the evicted
    /// block, or `Err(block)` if the hash is already pooled.
    pub fn insert(&mut self, block: Block) -> Result<Option<Block>, Block> {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return Err(block);
        }

        let evicted = if self.blocks.len() >= self.capacity {
            self.order
                .pop_front()
                .and_then(|oldest| self.blocks.remove(&oldest))
        } else {
            None
        };

        self.order.push_back(hash);
        self.blocks.insert(hash, block);
        Ok(evicted)
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<Block> {
        let block = self.blocks.remove(hash)?;
        self.order.retain(|h| h != hash);
        Some(block)
    }

    /// Oldest pooled block that directly extends `parent`.
    pub fn child_of(&self, parent: &BlockHeader) -> Option<Hash> {
        self.order.iter().copied().find(|hash| {
            self.blocks
                .get(hash)
                .map_or(false, |block| block.header.extends(parent))
        })
    }

    /// Pooled blocks leading to `tip`, oldest first, following previous hashes
    /// for as long as the parent is pooled. Includes `tip` itself.
    pub fn branch_ending_at(&self, tip: &Hash) -> Vec<&Block> {
        let mut branch = Vec::new();
        let mut cursor = self.blocks.get(tip);
        while let Some(block) = cursor {
            if branch.len() > self.blocks.len() {
                break;
            }
            branch.push(block);
            cursor = self.blocks.get(&block.previous_hash());
        }
        branch.reverse();
        branch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;
    use shared_types::{BlockTemplate, Transaction};

    fn block(number: u64, previous: Hash) -> Block {
        let coinbase = Transaction::coinbase("m", 1, number, number);
        Block::from_template(BlockTemplate {
            block_number: number,
            previous_hash: previous,
            timestamp: number,
            coinbase_transaction_hash: coinbase.hash,
            transactions: vec![coinbase],
            actions: vec![],
            difficulty: U256::one(),
            total_difficulty: U256::from(number),
            challenge: U256::MAX,
            mined_by: "m".into(),
        })
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut pool = BlockPool::new(2);
        let a = block(1, [0; 32]);
        let b = block(2, [1; 32]);
        let c = block(3, [2; 32]);

        assert_eq!(pool.insert(a.clone()).unwrap(), None);
        assert_eq!(pool.insert(b.clone()).unwrap(), None);
        assert_eq!(pool.insert(c.clone()).unwrap(), Some(a.clone()));

        assert!(!pool.contains(&a.hash()));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut pool = BlockPool::new(4);
        let a = block(1, [0; 32]);
        pool.insert(a.clone()).unwrap();
        assert!(pool.insert(a).is_err());
    }

    #[test]
    fn test_branch_walks_back_through_pool() {
        let mut pool = BlockPool::new(10);
        let a = block(5, [9; 32]);
        let b = block(6, a.hash());
        let c = block(7, b.hash());
        let stray = block(6, [8; 32]);
        for blk in [c.clone(), stray, a.clone(), b.clone()] {
            pool.insert(blk).unwrap();
        }

        let branch: Vec<u64> = pool
            .branch_ending_at(&c.hash())
            .iter()
            .map(|b| b.number())
            .collect();
        assert_eq!(branch, vec![5, 6, 7]);

        assert_eq!(pool.child_of(&a.header), Some(b.hash()));

        pool.remove(&b.hash());
        assert_eq!(pool.branch_ending_at(&c.hash()).len(), 1);
        assert_eq!(pool.child_of(&a.header), None);
    }
}
