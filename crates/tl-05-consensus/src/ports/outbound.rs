//! # Outbound Ports
//!
//! The coordinator reaches the node's ledger and mempool through
//! `LedgerGateway` and the network through `PeerBroadcast`. Signing uses
//! `shared_crypto::Signer`.

use async_trait::async_trait;
use shared_types::{Block, BlockHeader};

use crate::domain::messages::ConsensusMessage;
use crate::error::ConsensusResult;

/// Block assembly and commit, serialized by the node's coordinating lock.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Whether the node can take part in a turn (not syncing, not halted).
    fn is_ready(&self) -> bool;

    /// Unsealed candidate on top of the current head, with mempool entries
    /// reserved for it.
    async fn assemble(&self, proposer: &str) -> ConsensusResult<Block>;

    /// Commit a finalized block.
    async fn finalize(&self, block: Block) -> ConsensusResult<()>;

    /// Return the entries of an abandoned candidate to the mempool.
    async fn discard(&self, block: &Block) -> ConsensusResult<()>;

    /// Whether a peer's header may be signed: hash integrity plus whatever the
    /// node checks against its head.
    fn accepts_header(&self, header: &BlockHeader) -> bool {
        header.has_valid_hash()
    }
}

/// Delivery of coordination messages to the other validators.
#[async_trait]
pub trait PeerBroadcast: Send + Sync {
    async fn broadcast(&self, message: ConsensusMessage) -> ConsensusResult<()>;
}
