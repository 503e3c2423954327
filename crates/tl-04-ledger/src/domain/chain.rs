//! Canonical header chain.

use std::collections::HashMap;

use primitive_types::U256;
use shared_types::{BlockHeader, BlockNumber, Hash};

/// Ordered headers, position == block number.
#[derive(Debug, Default)]
pub struct HeaderChain {
    headers: Vec<BlockHeader>,
    by_hash: HashMap<Hash, BlockNumber>,
}

impl HeaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn head(&self) -> Option<&BlockHeader> {
        self.headers.last()
    }

    pub fn get(&self, number: BlockNumber) -> Option<&BlockHeader> {
        usize::try_from(number).ok().and_then(|n| self.headers.get(n))
    }

    pub fn number_of(&self, hash: &Hash) -> Option<BlockNumber> {
        self.by_hash.get(hash).copied()
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.number_of(hash).and_then(|n| self.get(n))
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    pub fn total_difficulty(&self) -> U256 {
        self.head()
            .map(|h| h.total_difficulty)
            .unwrap_or_default()
    }

    /// Appends a header. Callers verify linkage first.
    pub fn push(&mut self, header: BlockHeader) {
        self.by_hash.insert(header.hash, header.block_number);
        self.headers.push(header);
    }

    /// Removes every header above `number`, returning them oldest first.
    pub fn truncate_above(&mut self, number: BlockNumber) -> Vec<BlockHeader> {
        let keep = usize::try_from(number)
            .map(|n| n.saturating_add(1))
            .unwrap_or(usize::MAX)
            .min(self.headers.len());
        let removed = self.headers.split_off(keep);
        for header in &removed {
            self.by_hash.remove(&header.hash);
        }
        removed
    }
}
