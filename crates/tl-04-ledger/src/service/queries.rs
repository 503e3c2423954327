//! Read-only queries over the committed chain.

use super::*;
use primitive_types::U256;
use shared_types::{Amount, Hash};
use tl_02_validator::SpentHashView;
use tracing::warn;

use crate::domain::spent::{SpentEntry, SpentIndex};

impl Ledger {
    pub fn head(&self) -> Option<&BlockHeader> {
        self.chain.head()
    }

    pub fn height(&self) -> BlockNumber {
        self.chain.head().map_or(0, |h| h.block_number)
    }

    pub fn header(&self, number: BlockNumber) -> Option<&BlockHeader> {
        self.chain.get(number)
    }

    pub fn header_by_hash(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.chain.get_by_hash(hash)
    }

    pub fn headers(&self) -> &[BlockHeader] {
        self.chain.headers()
    }

    /// Committed block by number. Numbers above the head return `None`.
    pub fn block(&self, number: BlockNumber) -> LedgerResult<Option<Block>> {
        if self.chain.get(number).is_none() {
            return Ok(None);
        }
        self.load_block(number).map(Some)
    }

    pub fn block_by_hash(&self, hash: &Hash) -> LedgerResult<Option<Block>> {
        match self.chain.number_of(hash) {
            Some(number) => self.load_block(number).map(Some),
            None => Ok(None),
        }
    }

    /// Fees paid by the entries of a committed block.
    pub fn block_fees(&self, number: BlockNumber) -> LedgerResult<Option<Amount>> {
        Ok(self.block(number)?.map(|block| block.mining_fees()))
    }

    pub fn total_difficulty(&self) -> U256 {
        self.chain.total_difficulty()
    }

    pub fn pooled_blocks(&self) -> usize {
        self.pool.len()
    }

    /// Balance of a key or account name.
    pub fn balance_of(&self, address: &str) -> Amount {
        let key = self.validator.accounts().resolve_key(address);
        self.deps.balances.balance_of(&key)
    }

    pub fn spent_entry(&self, hash: &Hash) -> Option<SpentEntry> {
        self.spent.entry(hash)
    }

    /// Payable that consumed `hash` as its reference.
    pub fn reference_used_by(&self, hash: &Hash) -> Option<Hash> {
        self.spent.reference_used_by(hash)
    }

    /// Committed transaction and the block it is in.
    pub fn find_transaction(&self, hash: &Hash) -> LedgerResult<Option<(BlockNumber, Transaction)>> {
        let Some(number) = self.spent.transaction_spent_in(hash) else {
            return Ok(None);
        };
        let block = self.load_block(number)?;
        Ok(block.transaction(hash).cloned().map(|tx| (number, tx)))
    }

    /// Committed transactions sent from or to `address`, matched by name or
    /// by owner key.
    pub fn history(&self, address: &str) -> LedgerResult<AddressHistory> {
        let accounts = self.validator.accounts();
        let key = accounts.resolve_key(address);
        let matches = |party: &str| party == address || accounts.resolve_key(party) == key;

        let mut history = AddressHistory::default();
        for header in self.chain.headers() {
            let block = self.load_block(header.block_number)?;
            for tx in block.transactions {
                if matches(&tx.from_address) {
                    history.sent.push(tx.clone());
                }
                if matches(&tx.to_address) {
                    history.received.push(tx);
                }
            }
        }
        Ok(history)
    }

    /// Recompute hashes, linkage, header rules (difficulty, challenge, total
    /// difficulty, timestamp order), merkle roots, consensus proofs and entry
    /// checksums over the whole chain, and check that no entry is spent
    /// twice. Reports the first conflicting block.
    ///
    /// Entry signatures and balances depend on account and balance state at
    /// commit time and are not replayed here.
    pub fn validate_entire_chain(&self) -> LedgerResult<ChainVerdict> {
        let mut seen = SpentIndex::new();
        let headers = self.chain.headers();

        for (index, header) in headers.iter().enumerate() {
            let number = header.block_number;
            let conflict = |reason: String| {
                warn!("[tl-04] Chain conflict at block {}: {}", number, reason);
                Ok(ChainVerdict::Conflict { number, reason })
            };

            if number != index as BlockNumber || !header.has_valid_hash() {
                return conflict("header hash or position mismatch".into());
            }
            let block = self.load_block(number)?;
            if block.header != *header {
                return conflict("stored block differs from header".into());
            }

            if index > 0 {
                let parent = &headers[index - 1];
                if !header.extends(parent) {
                    return conflict(format!("does not link to block {}", parent.block_number));
                }
                if header.timestamp <= parent.timestamp {
                    return conflict("timestamp not after parent".into());
                }
                if let Err(err) = self.check_header_consistency(&block, parent) {
                    return conflict(err.to_string());
                }
                if let Err(err) = self.check_integrity(&block) {
                    return conflict(err.to_string());
                }
            }

            for tx in &block.transactions {
                if !tx.has_valid_checksum() {
                    return conflict(format!("transaction {} checksum", tx.short_hash()));
                }
                if seen.is_spent(&tx.hash) {
                    return conflict(format!("transaction {} spent twice", tx.short_hash()));
                }
                if let Some(reference) = tx.reference() {
                    if seen.reference_used_by(&reference.hash).is_some() {
                        return conflict(format!(
                            "reference {} used twice",
                            reference.short_hash()
                        ));
                    }
                }
            }
            for action in &block.actions {
                if !action.has_valid_checksum() || seen.is_spent(&action.hash) {
                    return conflict(format!(
                        "action {} invalid or spent twice",
                        shared_types::short_hex(&action.hash)
                    ));
                }
            }
            seen.mark_block(&block);
        }
        Ok(ChainVerdict::Valid)
    }
}
