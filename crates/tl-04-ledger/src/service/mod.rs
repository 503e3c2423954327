//! # Ledger Service
//!
//! The single writer over the canonical chain. Routing, validation, rollback
//! and read queries live in the submodules; this module holds the state,
//! startup replay and the commit path.
//!
//! ## Commit Order
//!
//! 1. account and contract registrations carried by the block's actions
//! 2. external state (`StateRollback::apply_block`)
//! 3. block store
//! 4. spent-hash sets, header chain, snapshot
//!
//! A failure in steps 2-3 undoes the earlier steps. If an undo fails the
//! ledger halts.

mod queries;
mod rollback;
mod routing;
mod validation;

use std::fmt::Display;
use std::sync::Arc;

use shared_crypto::SignatureVerifier;
use shared_types::{Action, Block, BlockHeader, BlockNumber, NodeState, StorageError, Transaction};
use tl_01_difficulty::DifficultyEngine;
use tl_02_validator::{BalanceProvider, ContractInfo, Validator};
use tracing::{error, info, instrument};

use crate::config::LedgerConfig;
use crate::domain::chain::HeaderChain;
use crate::domain::pool::BlockPool;
use crate::domain::snapshot::Snapshot;
use crate::domain::spent::SpentIndex;
use crate::error::{LedgerError, LedgerResult};
use crate::ports::outbound::{BlockStore, StateRollback, TimeSource};

/// Capabilities the ledger is constructed with. Accounts and contracts are
/// reached through the validator.
#[derive(Clone)]
pub struct LedgerDependencies {
    pub block_store: Arc<dyn BlockStore>,
    pub state: Arc<dyn StateRollback>,
    pub balances: Arc<dyn BalanceProvider>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub time: Arc<dyn TimeSource>,
}

/// Where a received block ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Committed on top of the head; the number is the new head.
    Extended(BlockNumber),
    /// Held in the block pool awaiting a linking block.
    Pooled,
    /// Linked to a pooled branch that lost fork choice.
    KeptCurrent,
    /// A pooled branch won fork choice and replaced the blocks above
    /// `fork_point`.
    Reorganized {
        fork_point: BlockNumber,
        new_head: BlockNumber,
        displaced: Vec<Block>,
    },
    /// The chain was rolled back and must be resynchronized from peers.
    /// `removed` holds the blocks taken off, oldest first.
    ResyncRequested {
        rolled_back_to: BlockNumber,
        removed: Vec<Block>,
    },
}

/// Committed transactions touching an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressHistory {
    pub sent: Vec<Transaction>,
    pub received: Vec<Transaction>,
}

/// Result of a whole-chain recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerdict {
    Valid,
    Conflict { number: BlockNumber, reason: String },
}

pub struct Ledger {
    config: LedgerConfig,
    difficulty: DifficultyEngine,
    validator: Arc<Validator>,
    deps: LedgerDependencies,
    chain: HeaderChain,
    spent: SpentIndex,
    pool: BlockPool,
    snapshot: Snapshot,
    state: NodeState,
}

impl Ledger {
    /// Open the ledger over `deps.block_store`.
    ///
    /// An empty store receives `genesis`; every stored block is then replayed
    /// into the header chain, spent sets, registries and external state.
    #[instrument(skip_all, fields(genesis = %genesis.header.short_hash()))]
    pub fn open(
        config: LedgerConfig,
        difficulty: DifficultyEngine,
        validator: Arc<Validator>,
        deps: LedgerDependencies,
        genesis: Block,
    ) -> LedgerResult<Self> {
        Self::check_genesis(&genesis)?;

        let mut ledger = Self {
            pool: BlockPool::new(config.block_pool_capacity),
            snapshot: Snapshot::new(config.snapshot_size),
            config,
            difficulty,
            validator,
            deps,
            chain: HeaderChain::new(),
            spent: SpentIndex::new(),
            state: NodeState::Running,
        };

        let last = match ledger.deps.block_store.last_block_number()? {
            Some(last) => last,
            None => {
                ledger.deps.block_store.put_block(&genesis)?;
                info!("[tl-04] Stored genesis block {}", genesis.header.short_hash());
                0
            }
        };

        for number in 0..=last {
            let block = ledger.load_block(number)?;
            if number == 0 && block.hash() != genesis.hash() {
                return Err(LedgerError::InvalidGenesis(format!(
                    "stored genesis {} differs from configured {}",
                    block.header.short_hash(),
                    genesis.header.short_hash()
                )));
            }
            if let Some(head) = ledger.chain.head() {
                if !block.header.extends(head) {
                    return Err(StorageError::DataCorruption {
                        key: number.to_string(),
                        reason: "stored block does not link to its predecessor".into(),
                    }
                    .into());
                }
            }
            ledger.commit_block(block, false)?;
        }

        info!(
            "[tl-04] Ledger open at block {} ({} spent transactions)",
            last,
            ledger.spent.transaction_count()
        );
        Ok(ledger)
    }

    fn check_genesis(genesis: &Block) -> LedgerResult<()> {
        if genesis.number() != 0 {
            return Err(LedgerError::InvalidGenesis(format!(
                "block number {}",
                genesis.number()
            )));
        }
        if !genesis.header.has_valid_hash() {
            return Err(LedgerError::InvalidGenesis("hash mismatch".into()));
        }
        genesis
            .check_format()
            .map_err(|e| LedgerError::InvalidGenesis(e.to_string()))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    pub fn difficulty_engine(&self) -> &DifficultyEngine {
        &self.difficulty
    }

    pub fn node_state(&self) -> NodeState {
        self.state
    }

    /// Operator acknowledgement after a failed rollback was repaired.
    pub fn clear_halt(&mut self) {
        if self.state == NodeState::HaltedAwaitingIntervention {
            info!("[tl-04] Halt cleared by operator");
            self.state = NodeState::Running;
        }
    }

    fn ensure_running(&self) -> LedgerResult<()> {
        if self.state.accepts_blocks() {
            Ok(())
        } else {
            Err(LedgerError::Halted)
        }
    }

    fn head_header(&self) -> LedgerResult<&BlockHeader> {
        self.chain.head().ok_or(LedgerError::NotInitialized)
    }

    fn load_block(&self, number: BlockNumber) -> LedgerResult<Block> {
        self.deps
            .block_store
            .get_block(number)?
            .ok_or_else(|| StorageError::NotFound(format!("block {number}")).into())
    }

    /// Enter the halted state and build the error reported to the caller.
    fn fail_closed(&mut self, target: BlockNumber, reason: impl Display) -> LedgerError {
        let reason = reason.to_string();
        error!(
            "[tl-04] Rollback to block {} failed, halting block acceptance: {}",
            target, reason
        );
        self.state = NodeState::HaltedAwaitingIntervention;
        LedgerError::RollbackFailed { target, reason }
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Apply a validated block. `persist` is false while replaying the store.
    fn commit_block(&mut self, block: Block, persist: bool) -> LedgerResult<()> {
        let number = block.number();
        let previous = number.saturating_sub(1);

        self.apply_registry_actions(&block, previous)?;

        if let Err(err) = self.deps.state.apply_block(&block) {
            if let Err(undo) = self.revert_registry_actions(&block) {
                return Err(self.fail_closed(previous, undo));
            }
            return Err(err.into());
        }

        if persist {
            if let Err(err) = self.deps.block_store.put_block(&block) {
                let undo = self
                    .revert_registry_actions(&block)
                    .and_then(|_| self.deps.state.rollback_to(previous));
                if let Err(undo) = undo {
                    return Err(self.fail_closed(previous, undo));
                }
                return Err(err.into());
            }
        }

        self.spent.mark_block(&block);
        self.snapshot.push(block.header.clone());
        self.chain.push(block.header);
        Ok(())
    }

    fn apply_registry_actions(&mut self, block: &Block, previous: BlockNumber) -> LedgerResult<()> {
        for (index, action) in block.actions.iter().enumerate() {
            if let Err(err) = self.apply_registry_action(action) {
                for applied in block.actions[..index].iter().rev() {
                    if let Err(undo) = self.revert_registry_action(applied) {
                        return Err(self.fail_closed(previous, undo));
                    }
                }
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn apply_registry_action(&self, action: &Action) -> Result<(), StorageError> {
        if action.is_account_creation() {
            let account = action
                .account_record()
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            self.validator.accounts().add_account(account)
        } else if action.is_contract_deploy() {
            self.validator.contracts().add_contract(contract_record(action)?)
        } else {
            Ok(())
        }
    }

    /// Undo the registrations of `block`, newest first.
    fn revert_registry_actions(&self, block: &Block) -> Result<(), StorageError> {
        block
            .actions
            .iter()
            .rev()
            .try_for_each(|action| self.revert_registry_action(action))
    }

    fn revert_registry_action(&self, action: &Action) -> Result<(), StorageError> {
        if action.is_account_creation() {
            let account = action
                .account_record()
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            self.validator.accounts().remove_account(&account.name)
        } else if action.is_contract_deploy() {
            self.validator
                .contracts()
                .remove_contract(&contract_record(action)?.name)
        } else {
            Ok(())
        }
    }
}

fn contract_record(action: &Action) -> Result<ContractInfo, StorageError> {
    serde_json::from_value(action.data.clone()).map_err(|e| StorageError::Serialization(e.to_string()))
}
