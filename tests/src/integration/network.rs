//! # In-Process Network
//!
//! Real `NodeRuntime`s wired through their `ChannelTransport`s. One router
//! task per node forwards every outbound payload to every other node, unless
//! the sender or the recipient is muted.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use node_runtime::{
    ChannelTransport, GenesisAllocation, NodeConfig, NodeContext, NodeDependencies, NodeRuntime,
};
use parking_lot::Mutex;
use serde_json::json;
use shared_crypto::{Secp256k1KeyPair, Signer};
use shared_types::{Amount, Block, Transaction, TransactionKind};
use tl_01_difficulty::meets_challenge;
use tl_04_ledger::ConsensusMode;
use tl_05_consensus::LedgerGateway;
use tokio::task::JoinHandle;
use tracing::warn;

/// Genesis allocation of the shared test wallet.
pub const ALLOCATION: Amount = 1_000;

pub struct TestNetwork {
    nodes: Vec<Arc<NodeRuntime>>,
    /// Holds the genesis allocation on every node.
    pub wallet: Secp256k1KeyPair,
    muted: Arc<Mutex<HashSet<String>>>,
    routers: Vec<JoinHandle<()>>,
}

impl TestNetwork {
    /// `size` validators, all configured, none started.
    pub fn new(size: usize, mode: ConsensusMode) -> Self {
        Self::build(size, |config| config.ledger.consensus = mode.clone())
    }

    pub fn build(size: usize, configure: impl Fn(&mut NodeConfig)) -> Self {
        let wallet = Secp256k1KeyPair::generate();
        let keys: Vec<Arc<Secp256k1KeyPair>> = (0..size)
            .map(|_| Arc::new(Secp256k1KeyPair::generate()))
            .collect();

        let mut config = NodeConfig::for_testing();
        config.consensus.validators = keys.iter().map(|key| key.identity()).collect();
        config.genesis.allocations = vec![GenesisAllocation {
            address: wallet.identity(),
            amount: ALLOCATION,
        }];
        configure(&mut config);

        let mut nodes = Vec::with_capacity(size);
        let mut outbound = Vec::with_capacity(size);
        for key in keys {
            let (transport, rx) = ChannelTransport::new();
            let runtime = NodeRuntime::new(
                &config,
                key,
                NodeDependencies::in_memory(),
                Arc::new(transport),
            )
            .unwrap();
            nodes.push(Arc::new(runtime));
            outbound.push(rx);
        }

        let muted = Arc::new(Mutex::new(HashSet::new()));
        let routers = outbound
            .into_iter()
            .enumerate()
            .map(|(index, mut rx)| {
                let nodes = nodes.clone();
                let muted = muted.clone();
                tokio::spawn(async move {
                    while let Some(payload) = rx.recv().await {
                        let recipients: Vec<Arc<NodeRuntime>> = {
                            let muted = muted.lock();
                            if muted.contains(nodes[index].identity()) {
                                continue;
                            }
                            nodes
                                .iter()
                                .enumerate()
                                .filter(|(peer, node)| {
                                    *peer != index && !muted.contains(node.identity())
                                })
                                .map(|(_, node)| node.clone())
                                .collect()
                        };
                        for node in recipients {
                            if let Err(err) = node.deliver(payload.clone()).await {
                                warn!("Delivery to {} failed: {}", node.identity(), err);
                            }
                        }
                    }
                })
            })
            .collect();

        Self {
            nodes,
            wallet,
            muted,
            routers,
        }
    }

    pub fn node(&self, index: usize) -> &Arc<NodeRuntime> {
        &self.nodes[index]
    }

    pub fn context(&self, index: usize) -> &Arc<NodeContext> {
        self.nodes[index].context()
    }

    pub fn nodes(&self) -> &[Arc<NodeRuntime>] {
        &self.nodes
    }

    /// Start the coordinators one after another, letting each settle.
    pub async fn start_all(&self) {
        for node in &self.nodes {
            node.start();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Drop all traffic from and to node `index`.
    pub fn mute(&self, index: usize) {
        self.muted
            .lock()
            .insert(self.nodes[index].identity().to_string());
    }

    pub fn mute_all(&self) {
        let mut muted = self.muted.lock();
        for node in &self.nodes {
            muted.insert(node.identity().to_string());
        }
    }

    pub async fn shutdown(self) {
        for node in &self.nodes {
            node.shutdown().await;
        }
        for router in self.routers {
            router.abort();
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Simple transfer signed by `from`.
pub fn transfer(
    from: &Secp256k1KeyPair,
    to: &str,
    amount: Amount,
    fee: Amount,
    nonce: u64,
) -> Transaction {
    let mut tx = Transaction::new(
        TransactionKind::Simple,
        from.identity(),
        to,
        amount,
        json!("transfer"),
        1_700_000_000_000 + nonce,
        nonce,
        fee,
    );
    tx.signature = Signer::sign(from, &tx.hash);
    tx
}

pub fn mine(mut block: Block) -> Block {
    let mut nonce = 0;
    while !meets_challenge(&block.hash(), block.header.challenge) {
        nonce += 1;
        block.seal(nonce);
    }
    block
}

/// Assemble, mine and commit one block on `context` outside the coordinator.
pub async fn produce(context: &NodeContext, proposer: &str) -> Block {
    let block = mine(context.assemble(proposer).await.unwrap());
    context.finalize(block.clone()).await.unwrap();
    block
}

/// Sleep in small steps until `context` reaches `height`.
pub async fn wait_for_height(context: &NodeContext, height: u64) {
    for _ in 0..400 {
        if context.height() >= height {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "node stuck at block {} waiting for {}",
        context.height(),
        height
    );
}
