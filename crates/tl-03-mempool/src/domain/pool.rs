//! # Receipt Pool
//!
//! Two disjoint maps: `available` receipts may be gathered, `reserved` ones sit
//! in an in-flight candidate block. A hash lives in at most one of them.

use std::cmp::Reverse;
use std::collections::HashMap;

use shared_types::Hash;

use crate::config::SelectionOrder;
use crate::domain::entities::Receipt;

#[derive(Debug, Default)]
pub struct ReceiptPool {
    available: HashMap<Hash, Receipt>,
    reserved: HashMap<Hash, Receipt>,
}

impl ReceiptPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.available.len() + self.reserved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.available.contains_key(hash) || self.reserved.contains_key(hash)
    }

    pub fn is_reserved(&self, hash: &Hash) -> bool {
        self.reserved.contains_key(hash)
    }

    /// Adds an available receipt. Returns false if the hash is already known.
    pub fn insert(&mut self, receipt: Receipt) -> bool {
        if self.contains(&receipt.hash) {
            return false;
        }
        self.available.insert(receipt.hash, receipt);
        true
    }

    /// AVAILABLE -> RESERVED
    pub fn reserve(&mut self, hash: &Hash) -> bool {
        match self.available.remove(hash) {
            Some(receipt) => {
                self.reserved.insert(*hash, receipt);
                true
            }
            None => false,
        }
    }

    /// RESERVED -> AVAILABLE
    pub fn release(&mut self, hash: &Hash) -> bool {
        match self.reserved.remove(hash) {
            Some(receipt) => {
                self.available.insert(*hash, receipt);
                true
            }
            None => false,
        }
    }

    /// Drops a receipt from whichever side holds it.
    pub fn remove(&mut self, hash: &Hash) -> Option<Receipt> {
        self.available
            .remove(hash)
            .or_else(|| self.reserved.remove(hash))
    }

    /// Available receipts in selection order. Ties break on hash so the order
    /// is stable across calls and nodes.
    pub fn ordered_available(&self, order: SelectionOrder) -> Vec<&Receipt> {
        let mut receipts: Vec<&Receipt> = self.available.values().collect();
        match order {
            SelectionOrder::Timestamp => receipts.sort_by_key(|r| (r.timestamp, r.hash)),
            SelectionOrder::Fee => receipts.sort_by_key(|r| (Reverse(r.fee), r.timestamp, r.hash)),
        }
        receipts
    }

    /// Every receipt regardless of reservation.
    pub fn all(&self) -> impl Iterator<Item = &Receipt> {
        self.available.values().chain(self.reserved.values())
    }
}
