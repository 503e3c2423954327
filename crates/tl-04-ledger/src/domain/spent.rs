//! # Spent-Hash Sets
//!
//! Transactions and actions map to the block that committed them. A payable's
//! reference is tracked separately as `referenceTo(payable)` so that undoing
//! the payable's block restores the reference without touching its own
//! spent entry.

use std::collections::HashMap;

use shared_types::{Block, BlockNumber, Hash};
use tl_02_validator::SpentHashView;

/// How a hash is recorded as spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpentEntry {
    /// Committed in this block.
    Block(BlockNumber),
    /// Consumed as the reference of this payable.
    ReferenceTo(Hash),
}

#[derive(Debug, Default)]
pub struct SpentIndex {
    transactions: HashMap<Hash, BlockNumber>,
    references: HashMap<Hash, Hash>,
    actions: HashMap<Hash, BlockNumber>,
}

impl SpentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record everything `block` spends.
    pub fn mark_block(&mut self, block: &Block) {
        let number = block.number();
        for tx in &block.transactions {
            self.transactions.insert(tx.hash, number);
            if let Some(reference) = tx.reference() {
                self.references.insert(reference.hash, tx.hash);
            }
        }
        for action in &block.actions {
            self.actions.insert(action.hash, number);
        }
    }

    /// Restore everything `block` spent to unspent.
    pub fn unmark_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.transactions.remove(&tx.hash);
            if let Some(reference) = tx.reference() {
                if self.references.get(&reference.hash) == Some(&tx.hash) {
                    self.references.remove(&reference.hash);
                }
            }
        }
        for action in &block.actions {
            self.actions.remove(&action.hash);
        }
    }

    /// Reference marks take precedence: a reference hash is reported as
    /// consumed by its payable.
    pub fn entry(&self, hash: &Hash) -> Option<SpentEntry> {
        if let Some(payable) = self.references.get(hash) {
            return Some(SpentEntry::ReferenceTo(*payable));
        }
        self.transactions
            .get(hash)
            .or_else(|| self.actions.get(hash))
            .map(|n| SpentEntry::Block(*n))
    }

    pub fn is_spent(&self, hash: &Hash) -> bool {
        self.entry(hash).is_some()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

impl SpentHashView for SpentIndex {
    fn transaction_spent_in(&self, hash: &Hash) -> Option<BlockNumber> {
        self.transactions.get(hash).copied()
    }

    fn reference_used_by(&self, hash: &Hash) -> Option<Hash> {
        self.references.get(hash).copied()
    }

    fn action_spent_in(&self, hash: &Hash) -> Option<BlockNumber> {
        self.actions.get(hash).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;
    use serde_json::json;
    use shared_types::{Action, ActionType, BlockTemplate, Transaction, TransactionKind};

    fn block(number: u64, transactions: Vec<Transaction>, actions: Vec<Action>) -> Block {
        Block::from_template(BlockTemplate {
            block_number: number,
            previous_hash: [0; 32],
            timestamp: number,
            coinbase_transaction_hash: transactions[0].hash,
            transactions,
            actions,
            difficulty: U256::one(),
            total_difficulty: U256::one(),
            challenge: U256::MAX,
            mined_by: "m".into(),
        })
    }

    #[test]
    fn test_mark_then_unmark_restores_unspent() {
        let coinbase = Transaction::coinbase("m", 5, 1, 3);
        let action = Action::new("alice", ActionType::Account, "create", json!({}), 1, 1);
        let b = block(3, vec![coinbase.clone()], vec![action.clone()]);

        let mut spent = SpentIndex::new();
        spent.mark_block(&b);
        assert_eq!(spent.entry(&coinbase.hash), Some(SpentEntry::Block(3)));
        assert_eq!(spent.action_spent_in(&action.hash), Some(3));

        spent.unmark_block(&b);
        assert!(!spent.is_spent(&coinbase.hash));
        assert!(!spent.is_spent(&action.hash));
    }

    #[test]
    fn test_payable_marks_reference() {
        let reference = Transaction::new(
            TransactionKind::Call,
            "alice",
            "vault",
            0,
            json!({"method": "withdraw"}),
            1,
            0,
            1,
        );
        let payable = Transaction::new(
            TransactionKind::Payable {
                from_contract: "vault".into(),
                reference: Box::new(reference.clone()),
            },
            "alice",
            "bob",
            5,
            json!({}),
            2,
            0,
            0,
        );

        let mut spent = SpentIndex::new();
        let first = block(4, vec![reference.clone()], vec![]);
        let second = block(5, vec![payable.clone()], vec![]);
        spent.mark_block(&first);
        spent.mark_block(&second);

        assert_eq!(
            spent.entry(&reference.hash),
            Some(SpentEntry::ReferenceTo(payable.hash))
        );
        assert_eq!(spent.transaction_spent_in(&reference.hash), Some(4));

        spent.unmark_block(&second);
        assert_eq!(spent.entry(&reference.hash), Some(SpentEntry::Block(4)));
        assert_eq!(spent.reference_used_by(&reference.hash), None);
    }
}
