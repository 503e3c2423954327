//! Pending entries, their receipts and gathered batches.

use serde::{Deserialize, Serialize};
use shared_types::{Action, Address, Amount, Hash, Timestamp, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Transaction,
    Action,
}

/// Full body of a pending entry as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", content = "body", rename_all = "lowercase")]
pub enum PendingEntry {
    Transaction(Transaction),
    Action(Action),
}

impl PendingEntry {
    pub fn hash(&self) -> Hash {
        match self {
            PendingEntry::Transaction(tx) => tx.hash,
            PendingEntry::Action(action) => action.hash,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            PendingEntry::Transaction(_) => EntryKind::Transaction,
            PendingEntry::Action(_) => EntryKind::Action,
        }
    }

    /// Lightweight receipt kept in memory for selection.
    pub fn receipt(&self) -> Receipt {
        match self {
            PendingEntry::Transaction(tx) => Receipt {
                hash: tx.hash,
                kind: EntryKind::Transaction,
                sender: tx.from_address.clone(),
                receiver: Some(tx.to_address.clone()),
                fee: tx.mining_fee,
                size: tx.serialized_size(),
                timestamp: tx.timestamp,
            },
            PendingEntry::Action(action) => Receipt {
                hash: action.hash,
                kind: EntryKind::Action,
                sender: action.from_account.clone(),
                receiver: None,
                fee: action.fee,
                size: action.serialized_size(),
                timestamp: action.timestamp,
            },
        }
    }
}

/// Parties, fee and byte size of a pending entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: Hash,
    pub kind: EntryKind,
    pub sender: Address,
    /// Receiving address; actions have none.
    pub receiver: Option<Address>,
    pub fee: Amount,
    pub size: usize,
    pub timestamp: Timestamp,
}

impl Receipt {
    pub fn involves(&self, address: &str) -> bool {
        self.sender == address || self.receiver.as_deref() == Some(address)
    }
}

/// Entries reserved for one candidate block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub transactions: Vec<Transaction>,
    pub actions: Vec<Action>,
    pub bytes: usize,
}

impl Batch {
    pub fn push(&mut self, entry: PendingEntry, size: usize) {
        match entry {
            PendingEntry::Transaction(tx) => self.transactions.push(tx),
            PendingEntry::Action(action) => self.actions.push(action),
        }
        self.bytes += size;
    }

    pub fn len(&self) -> usize {
        self.transactions.len() + self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transaction mining fees plus action fees, saturating at `Amount::MAX`.
    pub fn total_fees(&self) -> Amount {
        let tx_fees = self
            .transactions
            .iter()
            .fold(0, |sum: Amount, tx| sum.saturating_add(tx.mining_fee));
        self.actions
            .iter()
            .fold(tx_fees, |sum, action| sum.saturating_add(action.fee))
    }

    pub fn hashes(&self) -> Vec<Hash> {
        self.transactions
            .iter()
            .map(|tx| tx.hash)
            .chain(self.actions.iter().map(|a| a.hash))
            .collect()
    }
}
