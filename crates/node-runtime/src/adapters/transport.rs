//! # Peer Transport Adapter
//!
//! Outbound side of the peer transport. The node pushes every payload onto an
//! unbounded channel; whatever owns the receiving end (a network layer, or an
//! in-process hub in tests) delivers it to peers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::Block;
use tl_05_consensus::{ConsensusError, ConsensusMessage, ConsensusResult, PeerBroadcast};
use tokio::sync::mpsc;
use tracing::warn;

/// Everything a node sends to its peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PeerPayload {
    Consensus { message: ConsensusMessage },
    NewBlock { block: Box<Block> },
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<PeerPayload>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PeerPayload>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        (Self { outbound }, receiver)
    }

    /// Announce a block this node committed.
    pub fn announce_block(&self, block: &Block) {
        let payload = PeerPayload::NewBlock {
            block: Box::new(block.clone()),
        };
        if self.outbound.send(payload).is_err() {
            warn!("Peer transport closed, block {} not announced", block.number());
        }
    }
}

#[async_trait]
impl PeerBroadcast for ChannelTransport {
    async fn broadcast(&self, message: ConsensusMessage) -> ConsensusResult<()> {
        self.outbound
            .send(PeerPayload::Consensus { message })
            .map_err(|_| ConsensusError::Broadcast("peer transport closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_and_announce_share_channel() {
        let (transport, mut rx) = ChannelTransport::new();
        transport
            .broadcast(ConsensusMessage::GeneratingBlock {
                identity: "02aa".into(),
            })
            .await
            .unwrap();

        let payload = rx.recv().await.unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "consensus");
        assert_eq!(json["message"]["type"], "generatingBlock");
    }

    #[tokio::test]
    async fn test_closed_transport_reports_broadcast_error() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);
        let err = transport
            .broadcast(ConsensusMessage::ValidatorConnected {
                identity: "02aa".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Broadcast(_)));
    }
}
