//! # Consensus Coordinator
//!
//! One task owns all coordinator state. It reacts to three event sources:
//!
//! - peer messages and block commits (`ConsensusInput`)
//! - mining results (`WorkerEvent`)
//! - the single turn timer
//!
//! ## Turn Flow
//!
//! | Turn holder | Local behaviour |
//! |-------------|-----------------|
//! | local node | announce `GeneratingBlock`, assemble, mine, sign, request signatures, finalize at threshold |
//! | peer | wait `confirmation_wait` for its announcement, then `header_wait` for its header; skip on expiry |
//!
//! Validator joins and leaves reset the rotation to the first active
//! validator and abandon any local proposal.

mod messages;
mod turns;

use std::sync::Arc;
use std::time::Duration;

use shared_crypto::{SignatureVerifier, Signer};
use shared_types::{Block, Hash};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::ConsensusConfig;
use crate::domain::messages::{ConsensusInput, ConsensusMessage};
use crate::domain::order::ValidatorOrder;
use crate::domain::round::{RoundPhase, TurnTimer};
use crate::error::{ConsensusError, WaitPhase};
use crate::ports::outbound::{LedgerGateway, PeerBroadcast};
use crate::worker::{MiningWorker, WorkerEvent};

/// Capabilities the coordinator is constructed with.
#[derive(Clone)]
pub struct CoordinatorDependencies {
    pub ledger: Arc<dyn LedgerGateway>,
    pub broadcast: Arc<dyn PeerBroadcast>,
    pub signer: Arc<dyn Signer>,
    pub verifier: Arc<dyn SignatureVerifier>,
}

pub struct ConsensusCoordinator {
    config: ConsensusConfig,
    deps: CoordinatorDependencies,
    identity: String,
    order: ValidatorOrder,
    phase: RoundPhase,
    timer: Option<TurnTimer>,
    round: u64,
    /// Local block waiting for peer signatures.
    pending: Option<Block>,
    worker: MiningWorker,
    worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl ConsensusCoordinator {
    /// Must be called within a Tokio runtime; the mining worker is spawned
    /// here.
    pub fn new(config: ConsensusConfig, deps: CoordinatorDependencies) -> Self {
        let identity = deps.signer.identity();
        let order = ValidatorOrder::new(config.validators.clone(), &identity);
        let (worker, worker_events) = MiningWorker::spawn(config.nonces_per_slice);
        info!(
            "[tl-05] Coordinator for {} ({} configured validators, {} signatures required)",
            identity,
            config.validators.len(),
            config.minimum_signatures
        );
        Self {
            config,
            deps,
            identity,
            order,
            phase: RoundPhase::Idle,
            timer: None,
            round: 0,
            pending: None,
            worker,
            worker_events,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn phase(&self) -> &RoundPhase {
        &self.phase
    }

    /// Validator holding the current turn.
    pub fn turn(&self) -> Option<&str> {
        self.order.current()
    }

    pub fn order(&self) -> &ValidatorOrder {
        &self.order
    }

    pub fn timer(&self) -> Option<&TurnTimer> {
        self.timer.as_ref()
    }

    /// Announce this node and take the first turn.
    pub async fn start(&mut self) {
        self.send(ConsensusMessage::ValidatorConnected {
            identity: self.identity.clone(),
        })
        .await;
        self.begin_turn().await;
    }

    /// Drive the coordinator until `inbound` closes or `shutdown` flips.
    #[instrument(skip_all, fields(identity = %self.identity))]
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<ConsensusInput>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.start().await;
        loop {
            let deadline = self.timer.as_ref().map(|timer| timer.deadline);
            tokio::select! {
                input = inbound.recv() => match input {
                    Some(input) => {
                        // an expired deadline takes effect before same-instant input
                        self.fire_due_timer().await;
                        self.handle(input).await
                    }
                    None => break,
                },
                Some(event) = self.worker_events.recv() => self.on_worker_event(event).await,
                _ = sleep_until(deadline) => {
                    self.fire_due_timer().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        self.abandon_proposal().await;
        info!("[tl-05] Coordinator stopped");
    }

    pub async fn handle(&mut self, input: ConsensusInput) {
        match input {
            ConsensusInput::Peer(message) => self.on_message(message).await,
            ConsensusInput::BlockCommitted { hash } => self.on_block_committed(hash).await,
        }
    }

    /// Act on an expired timer. Returns the timeout that caused a turn skip,
    /// if any.
    pub async fn fire_due_timer(&mut self) -> Option<ConsensusError> {
        let due = self
            .timer
            .as_ref()
            .is_some_and(|timer| timer.is_due(Instant::now()));
        if !due {
            return None;
        }
        let timer = self.timer.take()?;

        let Some(phase) = timer.phase else {
            self.next_turn().await;
            return None;
        };

        let timeout = ConsensusError::Timeout {
            phase,
            validator: timer.validator,
        };
        warn!("[tl-05] {}, skipping turn", timeout);
        if phase == WaitPhase::Signatures {
            self.abandon_proposal().await;
        }
        self.next_turn().await;
        Some(timeout)
    }

    pub async fn on_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Mined { round, block } => self.produced(round, block).await,
            WorkerEvent::Abandoned { round, block } => {
                debug!("[tl-05] Returning entries of abandoned round {}", round);
                self.discard(&block).await;
            }
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn arm(&mut self, phase: Option<WaitPhase>, validator: &str, wait: Duration) {
        self.timer = Some(TurnTimer {
            phase,
            validator: validator.to_string(),
            deadline: Instant::now() + wait,
        });
    }

    async fn send(&self, message: ConsensusMessage) {
        if let Err(err) = self.deps.broadcast.broadcast(message).await {
            warn!("[tl-05] {}", err);
        }
    }

    async fn discard(&self, block: &Block) {
        if let Err(err) = self.deps.ledger.discard(block).await {
            warn!("[tl-05] Could not return entries of block {}: {}", block.number(), err);
        }
    }

    /// Drop the local proposal in whatever stage it is.
    async fn abandon_proposal(&mut self) {
        match self.phase {
            RoundPhase::Proposing { round } => {
                // the worker hands the block back as `Abandoned`
                if let Err(err) = self.worker.cancel(round) {
                    warn!("[tl-05] {}", err);
                }
            }
            RoundPhase::AwaitingSignatures { .. } => {
                if let Some(block) = self.pending.take() {
                    self.discard(&block).await;
                }
            }
            _ => {}
        }
        self.phase = RoundPhase::Idle;
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn is_pending(pending: &Option<Block>, hash: &Hash) -> bool {
    pending.as_ref().is_some_and(|block| &block.hash() == hash)
}
