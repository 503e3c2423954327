//! # Block Validation and Assembly
//!
//! `validate_block` runs, in order: entry rules, block hash, coinbase,
//! consensus, merkle roots, spent sets and in-block conflicts, header
//! consistency with the parent, timestamp. The first failure is reported.

use std::collections::{HashMap, HashSet};

use super::*;
use shared_types::{short_hex, Amount, BlockTemplate, Hash};
use tl_01_difficulty::{meets_challenge, next_challenge, ParentInfo};
use tl_02_validator::{ValidationError, ValidationResult};
use tl_03_mempool::{Batch, PendingEntry};
use tracing::debug;

use crate::config::ConsensusMode;

impl Ledger {
    /// Full validation of a block against the current head.
    pub fn validate_block(&self, block: &Block) -> LedgerResult<()> {
        let head = self.head_header()?;
        let number = block.number();
        if !block.header.extends(head) {
            return Err(LedgerError::HeaderMismatch {
                number,
                field: "previous_hash",
            });
        }

        block.check_format()?;
        self.validate_entries(block)?;
        self.check_hash(block)?;
        self.check_coinbase(block)?;
        self.check_consensus(&block.header)?;
        self.check_merkle(block)?;
        self.check_unspent(block)?;
        self.check_conflicts(block)?;
        self.check_header_consistency(block, head)?;
        self.check_timestamp(block, head)
    }

    /// Checks that need no chain context: shape, hash, coinbase, claimed
    /// work, consensus and merkle roots.
    pub fn check_integrity(&self, block: &Block) -> LedgerResult<()> {
        block.check_format()?;
        self.check_hash(block)?;
        self.check_coinbase(block)?;
        self.check_work_claim(&block.header)?;
        self.check_consensus(&block.header)?;
        self.check_merkle(block)
    }

    /// For a block that does not extend the head but whose parent is known,
    /// either pooled or canonical: number, difficulty, challenge and total
    /// difficulty must follow that parent.
    pub(super) fn check_lineage(&self, block: &Block) -> LedgerResult<()> {
        let previous = block.previous_hash();
        let parent = self
            .pool
            .get(&previous)
            .map(|pooled| &pooled.header)
            .or_else(|| self.chain.get_by_hash(&previous));
        let Some(parent) = parent else {
            return Ok(());
        };
        if block.number() != parent.block_number + 1 {
            return Err(LedgerError::HeaderMismatch {
                number: block.number(),
                field: "block_number",
            });
        }
        self.check_header_consistency(block, parent)
    }

    /// The challenge a header is mined against must be the one its own
    /// difficulty yields, and that difficulty must not undercut the floor.
    fn check_work_claim(&self, header: &BlockHeader) -> LedgerResult<()> {
        let mismatch = |field| LedgerError::HeaderMismatch {
            number: header.block_number,
            field,
        };
        if header.difficulty < self.difficulty.config().minimum_difficulty {
            return Err(mismatch("difficulty"));
        }
        if header.challenge != next_challenge(header.difficulty) {
            return Err(mismatch("challenge"));
        }
        Ok(())
    }

    fn validate_entries(&self, block: &Block) -> LedgerResult<()> {
        let number = block.number();
        self.validator
            .validate_batch(&block.transactions, &self.spent)
            .map_err(|(hash, source)| LedgerError::InvalidEntry {
                number,
                hash: short_hex(&hash),
                source,
            })?;
        for action in &block.actions {
            self.validator
                .validate_action(action, &self.spent)
                .map_err(|source| LedgerError::InvalidEntry {
                    number,
                    hash: short_hex(&action.hash),
                    source,
                })?;
        }
        Ok(())
    }

    fn check_hash(&self, block: &Block) -> LedgerResult<()> {
        if block.header.has_valid_hash() {
            Ok(())
        } else {
            Err(LedgerError::InvalidHash(block.number()))
        }
    }

    /// Exactly one coinbase, the one the block names, minted for this block.
    fn check_coinbase(&self, block: &Block) -> LedgerResult<()> {
        let number = block.number();
        let mut coinbases = block.coinbase_transactions();
        let (Some(coinbase), None) = (coinbases.next(), coinbases.next()) else {
            return Err(LedgerError::CoinbaseCount {
                number,
                found: block.coinbase_transactions().count(),
            });
        };
        if coinbase.hash != block.coinbase_transaction_hash || coinbase.nonce != number {
            return Err(LedgerError::CoinbaseNotAttached(number));
        }
        Ok(())
    }

    fn check_consensus(&self, header: &BlockHeader) -> LedgerResult<()> {
        let number = header.block_number;
        match &self.config.consensus {
            ConsensusMode::ProofOfWork => {
                if meets_challenge(&header.hash, header.challenge) {
                    Ok(())
                } else {
                    Err(LedgerError::ConsensusCheck {
                        number,
                        reason: "hash above challenge".into(),
                    })
                }
            }
            ConsensusMode::Permissioned { minimum_signatures } => {
                let valid = header
                    .signatures
                    .iter()
                    .filter(|(signer, signature)| {
                        self.config.validators.contains(*signer)
                            && self
                                .deps
                                .verifier
                                .verify(&header.hash, *signature, signer.as_str())
                    })
                    .count();
                if valid >= *minimum_signatures {
                    Ok(())
                } else {
                    Err(LedgerError::ConsensusCheck {
                        number,
                        reason: format!("{valid} of {minimum_signatures} required signatures"),
                    })
                }
            }
        }
    }

    fn check_merkle(&self, block: &Block) -> LedgerResult<()> {
        let number = block.number();
        if block.recompute_merkle_root() != block.header.merkle_root {
            return Err(LedgerError::MerkleMismatch {
                number,
                list: "transaction",
            });
        }
        if block.recompute_action_merkle_root() != block.header.action_merkle_root {
            return Err(LedgerError::MerkleMismatch {
                number,
                list: "action",
            });
        }
        Ok(())
    }

    fn check_unspent(&self, block: &Block) -> LedgerResult<()> {
        let spent = block
            .header
            .tx_hashes
            .iter()
            .chain(block.header.action_hashes.iter())
            .find(|hash| self.spent.is_spent(hash));
        match spent {
            Some(hash) => Err(LedgerError::DoubleSpend {
                number: block.number(),
                hash: short_hex(hash),
            }),
            None => Ok(()),
        }
    }

    /// Conflicts between entries of the same block that each pass alone.
    fn check_conflicts(&self, block: &Block) -> LedgerResult<()> {
        let number = block.number();
        let mut conflicts = BatchConflicts::new(self);
        for tx in &block.transactions {
            conflicts
                .admit_transaction(tx)
                .map_err(|source| LedgerError::InvalidEntry {
                    number,
                    hash: tx.short_hash(),
                    source,
                })?;
        }
        for action in &block.actions {
            conflicts
                .admit_action(action)
                .map_err(|source| LedgerError::InvalidEntry {
                    number,
                    hash: short_hex(&action.hash),
                    source,
                })?;
        }
        Ok(())
    }

    pub(super) fn check_header_consistency(&self, block: &Block, parent: &BlockHeader) -> LedgerResult<()> {
        let header = &block.header;
        let mismatch = |field| LedgerError::HeaderMismatch {
            number: header.block_number,
            field,
        };

        let difficulty = self
            .difficulty
            .next_difficulty(&ParentInfo::from(parent), header.timestamp);
        if header.difficulty != difficulty {
            return Err(mismatch("difficulty"));
        }
        if header.challenge != next_challenge(difficulty) {
            return Err(mismatch("challenge"));
        }
        if header.total_difficulty
            != self
                .difficulty
                .total_difficulty(parent.total_difficulty, difficulty)
        {
            return Err(mismatch("total_difficulty"));
        }
        Ok(())
    }

    fn check_timestamp(&self, block: &Block, parent: &BlockHeader) -> LedgerResult<()> {
        let number = block.number();
        let timestamp = block.header.timestamp;
        let reject = |reason| Err(LedgerError::InvalidTimestamp { number, reason });

        if timestamp <= parent.timestamp {
            return reject("not after parent");
        }
        let horizon = self
            .deps
            .time
            .now()
            .saturating_add(self.config.max_future_drift_ms);
        if timestamp >= horizon {
            return reject("too far in the future");
        }
        if let Some(median) = self.snapshot.median_timestamp() {
            if timestamp < median {
                return reject("below median of recent blocks");
            }
        }
        Ok(())
    }

    // =========================================================================
    // ASSEMBLY
    // =========================================================================

    /// Admission check for a submitted transaction against the committed
    /// chain.
    pub fn check_transaction(&self, tx: &Transaction) -> ValidationResult<()> {
        self.validator.validate_transaction(tx, &self.spent)
    }

    pub fn check_action(&self, action: &Action) -> ValidationResult<()> {
        self.validator.validate_action(action, &self.spent)
    }

    /// Re-check gathered entries against the current chain. Returns the
    /// entries that may go into the next block and the rejected ones.
    pub fn revalidate(&self, batch: Batch) -> (Batch, Vec<(Hash, ValidationError)>) {
        let mut kept = Batch::default();
        let mut rejected = Vec::new();
        let mut conflicts = BatchConflicts::new(self);

        for tx in batch.transactions {
            let verdict = self
                .validator
                .validate_transaction(&tx, &self.spent)
                .and_then(|_| conflicts.admit_transaction(&tx));
            match verdict {
                Ok(()) => {
                    let size = tx.serialized_size();
                    kept.push(PendingEntry::Transaction(tx), size);
                }
                Err(err) => rejected.push((tx.hash, err)),
            }
        }
        for action in batch.actions {
            let verdict = self
                .validator
                .validate_action(&action, &self.spent)
                .and_then(|_| conflicts.admit_action(&action));
            match verdict {
                Ok(()) => {
                    let size = action.serialized_size();
                    kept.push(PendingEntry::Action(action), size);
                }
                Err(err) => rejected.push((action.hash, err)),
            }
        }

        if !rejected.is_empty() {
            debug!(
                "[tl-04] Revalidation kept {} entries, rejected {}",
                kept.len(),
                rejected.len()
            );
        }
        (kept, rejected)
    }

    /// Unsealed block on top of the head carrying `batch` and a reward to
    /// `mined_by`.
    pub fn create_block_template(&self, batch: &Batch, mined_by: &str) -> LedgerResult<BlockTemplate> {
        self.ensure_running()?;
        let head = self.head_header()?;
        let block_number = head.block_number + 1;
        let timestamp = self.deps.time.now().max(head.timestamp + 1);

        let difficulty = self
            .difficulty
            .next_difficulty(&ParentInfo::from(head), timestamp);
        let total_difficulty = self
            .difficulty
            .total_difficulty(head.total_difficulty, difficulty);

        let coinbase = Transaction::coinbase(
            mined_by,
            self.validator.config().mining_reward,
            timestamp,
            block_number,
        );
        let coinbase_transaction_hash = coinbase.hash;
        let mut transactions = Vec::with_capacity(batch.transactions.len() + 1);
        transactions.push(coinbase);
        transactions.extend(batch.transactions.iter().cloned());

        Ok(BlockTemplate {
            block_number,
            previous_hash: head.hash,
            timestamp,
            transactions,
            actions: batch.actions.clone(),
            coinbase_transaction_hash,
            difficulty,
            total_difficulty,
            challenge: next_challenge(difficulty),
            mined_by: mined_by.to_string(),
        })
    }
}

/// Running totals over a block or batch: cumulative spending per key, payable
/// references consumed, names registered.
struct BatchConflicts<'a> {
    ledger: &'a Ledger,
    spending: HashMap<String, Amount>,
    references: HashMap<Hash, Hash>,
    accounts: HashSet<String>,
    contracts: HashSet<String>,
}

impl<'a> BatchConflicts<'a> {
    fn new(ledger: &'a Ledger) -> Self {
        Self {
            ledger,
            spending: HashMap::new(),
            references: HashMap::new(),
            accounts: HashSet::new(),
            contracts: HashSet::new(),
        }
    }

    fn admit_transaction(&mut self, tx: &Transaction) -> ValidationResult<()> {
        if tx.is_coinbase() {
            return Ok(());
        }
        if let Some(reference) = tx.reference() {
            if let Some(first) = self.references.get(&reference.hash) {
                return Err(ValidationError::ReferenceAlreadyUsed {
                    reference: reference.short_hash(),
                    used_by: short_hex(first),
                });
            }
        }

        let key = self.ledger.validator.accounts().resolve_key(&tx.from_address);
        let total = self.charge(&key, tx.amount.saturating_add(tx.mining_fee))?;

        if let Some(reference) = tx.reference() {
            self.references.insert(reference.hash, tx.hash);
        }
        self.spending.insert(key, total);
        Ok(())
    }

    fn admit_action(&mut self, action: &Action) -> ValidationResult<()> {
        let mut account_name = None;
        let key = if action.is_account_creation() {
            let record = action
                .account_record()
                .map_err(|e| ValidationError::MalformedAccount(e.to_string()))?;
            if self.accounts.contains(&record.name) {
                return Err(ValidationError::AccountExists(record.name));
            }
            account_name = Some(record.name);
            record.owner_key
        } else {
            self.ledger
                .validator
                .accounts()
                .resolve_key(&action.from_account)
        };

        let mut contract_name = None;
        if action.is_contract_deploy() {
            let contract = contract_record(action)
                .map_err(|e| ValidationError::MalformedContract(e.to_string()))?;
            if self.contracts.contains(&contract.name) {
                return Err(ValidationError::ContractExists(contract.name));
            }
            contract_name = Some(contract.name);
        }

        let total = self.charge(&key, action.fee)?;
        self.spending.insert(key, total);
        self.accounts.extend(account_name);
        self.contracts.extend(contract_name);
        Ok(())
    }

    /// Spending of `key` after adding `amount`, if the balance covers it.
    fn charge(&self, key: &str, amount: Amount) -> ValidationResult<Amount> {
        let required = self
            .spending
            .get(key)
            .copied()
            .unwrap_or(0)
            .saturating_add(amount);
        let available = self.ledger.deps.balances.balance_of(key);
        if required > available {
            return Err(ValidationError::InsufficientFunds {
                required,
                available,
            });
        }
        Ok(required)
    }
}
