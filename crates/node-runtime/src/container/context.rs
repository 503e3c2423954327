//! # Node Context
//!
//! Owns one node's Ledger and Mempool behind a single coordinating lock.
//! Every operation that reads or mutates chain state, spent sets or mempool
//! reservations takes the lock, so an assembly never interleaves with a
//! commit or a rollback.
//!
//! ## Logical Transaction
//!
//! ```text
//! assemble ──→ gather (reserve) ──→ revalidate ──→ reject failures ──→ template
//!     │
//!     ├─ finalize: receive_block ──→ commit reserved entries ──→ announce
//!     └─ discard:  putback reserved entries
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_crypto::{EcdsaVerifier, SignatureVerifier};
use shared_types::{
    Action, Amount, Block, BlockHeader, BlockNumber, Hash, NodeState, Transaction,
};
use tl_01_difficulty::DifficultyEngine;
use tl_02_validator::{
    AccountRegistry, ContractRegistry, InMemoryAccountRegistry, InMemoryContractRegistry,
    Validator, ValidatorDependencies,
};
use tl_03_mempool::{Mempool, MempoolError, PendingHistory, Receipt};
use tl_04_ledger::{
    BalanceTable, ChainVerdict, KvBlockStore, Ledger, LedgerDependencies, RouteOutcome,
    SystemTimeSource, TimeSource,
};
use tl_05_consensus::{ConsensusError, ConsensusResult, LedgerGateway};
use tracing::{debug, info, instrument, warn};

use crate::adapters::{ChannelTransport, NodeStores};
use crate::container::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::genesis::GenesisBuilder;

/// Host capabilities the context is built over.
#[derive(Clone)]
pub struct NodeDependencies {
    pub stores: NodeStores,
    pub time: Arc<dyn TimeSource>,
    pub verifier: Arc<dyn SignatureVerifier>,
}

impl NodeDependencies {
    pub fn in_memory() -> Self {
        Self::with_stores(NodeStores::in_memory())
    }

    pub fn with_stores(stores: NodeStores) -> Self {
        Self {
            stores,
            time: Arc::new(SystemTimeSource),
            verifier: Arc::new(EcdsaVerifier),
        }
    }
}

/// Committed and pending transactions touching one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressActivity {
    pub sent: Vec<Transaction>,
    pub received: Vec<Transaction>,
    pub pending: PendingHistory,
}

struct NodeCore {
    ledger: Ledger,
    mempool: Mempool,
}

pub struct NodeContext {
    core: Mutex<NodeCore>,
    accounts: Arc<dyn AccountRegistry>,
    contracts: Arc<dyn ContractRegistry>,
    transport: Arc<ChannelTransport>,
    byte_budget: usize,
}

impl NodeContext {
    /// Open the ledger (storing genesis on first start) and reload the
    /// mempool.
    pub fn open(
        config: &NodeConfig,
        deps: NodeDependencies,
        transport: Arc<ChannelTransport>,
    ) -> NodeResult<Self> {
        let genesis = GenesisBuilder::new(config.genesis.clone()).build()?;

        let accounts: Arc<dyn AccountRegistry> = Arc::new(InMemoryAccountRegistry::new());
        let contracts: Arc<dyn ContractRegistry> = Arc::new(InMemoryContractRegistry::new());
        let balances = Arc::new(BalanceTable::new(accounts.clone()));
        let validator = Arc::new(Validator::new(
            config.validator.clone(),
            ValidatorDependencies {
                balances: balances.clone(),
                accounts: accounts.clone(),
                contracts: contracts.clone(),
                verifier: deps.verifier.clone(),
            },
        ));

        let ledger = Ledger::open(
            config.ledger_config(),
            DifficultyEngine::new(config.difficulty.clone()),
            validator,
            LedgerDependencies {
                block_store: Arc::new(KvBlockStore::new(deps.stores.blocks)),
                state: balances.clone(),
                balances,
                verifier: deps.verifier,
                time: deps.time,
            },
            genesis,
        )?;

        let mempool = Mempool::new(config.mempool.clone(), deps.stores.mempool);
        mempool.load()?;

        info!(
            "Node context ready at block {} with {} pending entries",
            ledger.height(),
            mempool.size()
        );
        Ok(Self {
            core: Mutex::new(NodeCore { ledger, mempool }),
            accounts,
            contracts,
            transport,
            byte_budget: config.mempool.max_batch_bytes,
        })
    }

    pub fn accounts(&self) -> &Arc<dyn AccountRegistry> {
        &self.accounts
    }

    pub fn contracts(&self) -> &Arc<dyn ContractRegistry> {
        &self.contracts
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Validate against the committed chain, then queue.
    pub fn submit_transaction(&self, tx: Transaction) -> NodeResult<Receipt> {
        let core = self.core.lock();
        core.ledger.check_transaction(&tx)?;
        Ok(core.mempool.submit_transaction(tx)?)
    }

    pub fn submit_action(&self, action: Action) -> NodeResult<Receipt> {
        let core = self.core.lock();
        core.ledger.check_action(&action)?;
        Ok(core.mempool.submit_action(action)?)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn head(&self) -> Option<BlockHeader> {
        self.core.lock().ledger.head().cloned()
    }

    pub fn height(&self) -> BlockNumber {
        self.core.lock().ledger.height()
    }

    pub fn header(&self, number: BlockNumber) -> Option<BlockHeader> {
        self.core.lock().ledger.header(number).cloned()
    }

    pub fn header_by_hash(&self, hash: &Hash) -> Option<BlockHeader> {
        self.core.lock().ledger.header_by_hash(hash).cloned()
    }

    pub fn block(&self, number: BlockNumber) -> NodeResult<Option<Block>> {
        Ok(self.core.lock().ledger.block(number)?)
    }

    pub fn block_by_hash(&self, hash: &Hash) -> NodeResult<Option<Block>> {
        Ok(self.core.lock().ledger.block_by_hash(hash)?)
    }

    pub fn block_fees(&self, number: BlockNumber) -> NodeResult<Option<Amount>> {
        Ok(self.core.lock().ledger.block_fees(number)?)
    }

    pub fn balance(&self, address: &str) -> Amount {
        self.core.lock().ledger.balance_of(address)
    }

    pub fn history(&self, address: &str) -> NodeResult<AddressActivity> {
        let core = self.core.lock();
        let committed = core.ledger.history(address)?;
        let pending = core.mempool.pending_history(address)?;
        Ok(AddressActivity {
            sent: committed.sent,
            received: committed.received,
            pending,
        })
    }

    pub fn find_transaction(&self, hash: &Hash) -> NodeResult<Option<(BlockNumber, Transaction)>> {
        Ok(self.core.lock().ledger.find_transaction(hash)?)
    }

    pub fn validate_entire_chain(&self) -> NodeResult<ChainVerdict> {
        Ok(self.core.lock().ledger.validate_entire_chain()?)
    }

    pub fn mempool_size(&self) -> usize {
        self.core.lock().mempool.size()
    }

    pub fn node_state(&self) -> NodeState {
        self.core.lock().ledger.node_state()
    }

    // =========================================================================
    // CHAIN MUTATION
    // =========================================================================

    /// Route a block received from a peer.
    #[instrument(skip_all, fields(number = block.number()))]
    pub fn receive_block(&self, block: Block) -> NodeResult<RouteOutcome> {
        let mut core = self.core.lock();
        let previous_head = core.ledger.height();
        let outcome = core.ledger.receive_block(block)?;
        match &outcome {
            RouteOutcome::Extended(new_head) => {
                core.commit_range(previous_head, *new_head)?;
            }
            RouteOutcome::Reorganized {
                fork_point,
                new_head,
                displaced,
            } => {
                core.commit_range(*fork_point, *new_head)?;
                core.requeue(displaced);
            }
            RouteOutcome::ResyncRequested {
                rolled_back_to,
                removed,
            } => {
                warn!("Rolled back to block {}, awaiting resync", rolled_back_to);
                core.requeue(removed);
            }
            RouteOutcome::Pooled | RouteOutcome::KeptCurrent => {}
        }
        Ok(outcome)
    }

    /// Remove blocks above `target`; their entries return to the mempool when
    /// still valid.
    #[instrument(skip(self))]
    pub fn rollback_to_block(&self, target: BlockNumber) -> NodeResult<Vec<Block>> {
        let mut core = self.core.lock();
        let removed = core.ledger.rollback_to_block(target)?;
        core.requeue(&removed);
        Ok(removed)
    }

    /// Operator acknowledgement after a failed rollback was repaired.
    pub fn clear_halt(&self) {
        self.core.lock().ledger.clear_halt();
    }
}

impl NodeCore {
    fn assemble(&self, proposer: &str, byte_budget: usize) -> NodeResult<Block> {
        let batch = self.mempool.gather_for_block(byte_budget)?;
        let (kept, rejected) = self.ledger.revalidate(batch);
        for (hash, reason) in &rejected {
            warn!(
                "Dropping {} from the mempool: {}",
                shared_types::short_hex(hash),
                reason
            );
            self.mempool.reject(hash)?;
        }

        match self.ledger.create_block_template(&kept, proposer) {
            Ok(template) => Ok(Block::from_template(template)),
            Err(err) => {
                self.mempool.putback_hashes(kept.hashes())?;
                Err(err.into())
            }
        }
    }

    /// Commit a locally produced block. Its entries are deleted when it
    /// becomes the head and returned to the mempool otherwise.
    fn finalize(&mut self, block: &Block) -> NodeResult<RouteOutcome> {
        let previous_head = self.ledger.height();
        match self.ledger.receive_block(block.clone()) {
            Ok(RouteOutcome::Extended(number)) => {
                self.commit_range(previous_head, number)?;
                Ok(RouteOutcome::Extended(number))
            }
            Ok(other) => {
                self.mempool.putback(block)?;
                Ok(other)
            }
            Err(err) => {
                self.mempool.putback(block)?;
                Err(err.into())
            }
        }
    }

    /// Purge the entries of every block above `from` up to `to`, which a
    /// single route may commit together with pooled children.
    fn commit_range(&self, from: BlockNumber, to: BlockNumber) -> NodeResult<()> {
        for number in from + 1..=to {
            if let Some(committed) = self.ledger.block(number)? {
                self.mempool.commit(&committed)?;
            }
        }
        Ok(())
    }

    /// Queue the entries of blocks that left the chain.
    fn requeue(&self, blocks: &[Block]) {
        let mut queued = 0;
        for block in blocks {
            for tx in block.transactions.iter().filter(|tx| !tx.is_coinbase()) {
                if self.ledger.check_transaction(tx).is_ok()
                    && queue(self.mempool.submit_transaction(tx.clone()))
                {
                    queued += 1;
                }
            }
            for action in &block.actions {
                if self.ledger.check_action(action).is_ok()
                    && queue(self.mempool.submit_action(action.clone()))
                {
                    queued += 1;
                }
            }
        }
        if queued > 0 {
            info!("Requeued {} entries from {} removed blocks", queued, blocks.len());
        }
    }
}

fn queue(result: Result<Receipt, MempoolError>) -> bool {
    match result {
        Ok(_) => true,
        Err(MempoolError::DuplicateEntry(_)) => false,
        Err(err) => {
            warn!("Could not requeue entry: {}", err);
            false
        }
    }
}

#[async_trait]
impl LedgerGateway for NodeContext {
    fn is_ready(&self) -> bool {
        self.node_state() == NodeState::Running
    }

    async fn assemble(&self, proposer: &str) -> ConsensusResult<Block> {
        let core = self.core.lock();
        core.assemble(proposer, self.byte_budget)
            .map_err(|e| ConsensusError::Ledger(e.to_string()))
    }

    async fn finalize(&self, block: Block) -> ConsensusResult<()> {
        let outcome = {
            let mut core = self.core.lock();
            core.finalize(&block)
        };
        match outcome {
            Ok(RouteOutcome::Extended(number)) => {
                debug!("Committed local block {}", number);
                self.transport.announce_block(&block);
                Ok(())
            }
            Ok(other) => Err(ConsensusError::Ledger(format!(
                "local block {} not committed: {:?}",
                block.number(),
                other
            ))),
            Err(err) => Err(ConsensusError::Ledger(err.to_string())),
        }
    }

    /// Only headers that directly extend the current head get a signature.
    fn accepts_header(&self, header: &BlockHeader) -> bool {
        header.has_valid_hash() && self.head().is_some_and(|head| header.extends(&head))
    }

    async fn discard(&self, block: &Block) -> ConsensusResult<()> {
        let core = self.core.lock();
        core.mempool
            .putback(block)
            .map(|_| ())
            .map_err(|e| ConsensusError::Ledger(NodeError::from(e).to_string()))
    }
}
