//! # Node Runtime
//!
//! Owns one node's context and its consensus coordinator task.
//!
//! ```text
//! peer payload ──→ deliver ──┬─ Consensus ──→ coordinator inbound queue
//!                            └─ NewBlock  ──→ NodeContext::receive_block
//!                                                  │ (head changed)
//!                                                  └──→ BlockCommitted
//! ```
//!
//! Outbound traffic leaves through the `ChannelTransport` the runtime was
//! built with.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_crypto::Signer;
use shared_types::Block;
use tl_04_ledger::RouteOutcome;
use tl_05_consensus::{ConsensusCoordinator, ConsensusInput, CoordinatorDependencies};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapters::{ChannelTransport, PeerPayload};
use crate::container::{NodeConfig, NodeContext, NodeDependencies};
use crate::error::{NodeError, NodeResult};

/// Coordinator built but not yet spawned.
struct Idle {
    coordinator: ConsensusCoordinator,
    inbound: mpsc::Receiver<ConsensusInput>,
}

pub struct NodeRuntime {
    context: Arc<NodeContext>,
    identity: String,
    inbound: mpsc::Sender<ConsensusInput>,
    shutdown: watch::Sender<bool>,
    idle: Mutex<Option<Idle>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeRuntime {
    /// Open the node and build its coordinator. Must be called within a Tokio
    /// runtime.
    pub fn new(
        config: &NodeConfig,
        signer: Arc<dyn Signer>,
        deps: NodeDependencies,
        transport: Arc<ChannelTransport>,
    ) -> NodeResult<Self> {
        config.validate()?;
        let verifier = deps.verifier.clone();
        let context = Arc::new(NodeContext::open(config, deps, transport.clone())?);
        let identity = signer.identity();

        let coordinator = ConsensusCoordinator::new(
            config.consensus_config(),
            CoordinatorDependencies {
                ledger: context.clone(),
                broadcast: transport,
                signer,
                verifier,
            },
        );
        let (inbound, inbound_rx) = mpsc::channel(config.inbound_queue);
        let (shutdown, _) = watch::channel(false);

        info!("Node {} opened at block {}", identity, context.height());
        Ok(Self {
            context,
            identity,
            inbound,
            shutdown,
            idle: Mutex::new(Some(Idle {
                coordinator,
                inbound: inbound_rx,
            })),
            task: Mutex::new(None),
        })
    }

    pub fn context(&self) -> &Arc<NodeContext> {
        &self.context
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Spawn the coordinator task. Calling it twice has no effect.
    pub fn start(&self) {
        let Some(Idle {
            coordinator,
            inbound,
        }) = self.idle.lock().take()
        else {
            warn!("Node {} already started", self.identity);
            return;
        };
        let shutdown = self.shutdown.subscribe();
        *self.task.lock() = Some(tokio::spawn(coordinator.run(inbound, shutdown)));
        info!("Node {} started", self.identity);
    }

    /// Hand a payload received from a peer to the node.
    pub async fn deliver(&self, payload: PeerPayload) -> NodeResult<()> {
        match payload {
            PeerPayload::Consensus { message } => {
                self.inbound
                    .send(ConsensusInput::Peer(message))
                    .await
                    .map_err(|_| NodeError::CoordinatorStopped)
            }
            PeerPayload::NewBlock { block } => match self.accept_block(*block).await {
                Ok(_) => Ok(()),
                Err(err) if err.is_recoverable() => {
                    debug!("Ignoring peer block: {}", err);
                    Ok(())
                }
                Err(err) => Err(err),
            },
        }
    }

    /// Route a peer block and tell the coordinator when the head moved.
    pub async fn accept_block(&self, block: Block) -> NodeResult<RouteOutcome> {
        let outcome = self.context.receive_block(block)?;
        if matches!(
            outcome,
            RouteOutcome::Extended(_) | RouteOutcome::Reorganized { .. }
        ) {
            if let Some(head) = self.context.head() {
                self.inbound
                    .send(ConsensusInput::BlockCommitted { hash: head.hash })
                    .await
                    .map_err(|_| NodeError::CoordinatorStopped)?;
            }
        }
        Ok(outcome)
    }

    /// Stop the coordinator and wait for it to return its pending block.
    pub async fn shutdown(&self) {
        if self.shutdown.send(true).is_err() {
            debug!("Coordinator already gone");
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!("Coordinator task failed: {}", err);
            }
        }
        info!("Node {} stopped", self.identity);
    }
}
