//! Coordination messages exchanged between validators, and the inputs the
//! coordinator task consumes.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::{BlockHeader, Hash, Signature};

/// Peer-to-peer coordination event. Transport encoding is up to the network
/// layer; the serde shape is the `type`-tagged form.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConsensusMessage {
    /// A validator came online.
    ValidatorConnected { identity: String },
    /// Reply to `ValidatorConnected` so the newcomer learns who is online.
    DiscoverValidator { identity: String },
    ValidatorDisconnected { identity: String },
    /// The leader confirms it is producing a block for its turn.
    GeneratingBlock { identity: String },
    /// The leader asks peers to sign its block.
    RequestSignature {
        identity: String,
        header: Box<BlockHeader>,
    },
    Signature {
        identity: String,
        hash: Hash,
        #[serde_as(as = "Bytes")]
        signature: Signature,
    },
}

impl ConsensusMessage {
    /// Identity of the validator that sent the message.
    pub fn sender(&self) -> &str {
        match self {
            ConsensusMessage::ValidatorConnected { identity }
            | ConsensusMessage::DiscoverValidator { identity }
            | ConsensusMessage::ValidatorDisconnected { identity }
            | ConsensusMessage::GeneratingBlock { identity }
            | ConsensusMessage::RequestSignature { identity, .. }
            | ConsensusMessage::Signature { identity, .. } => identity,
        }
    }
}

/// Everything the coordinator task reacts to besides its own timers and
/// mining results.
#[derive(Debug, Clone)]
pub enum ConsensusInput {
    Peer(ConsensusMessage),
    /// A block for the current turn was committed by the node. Any local
    /// mining for the same height is now stale.
    BlockCommitted { hash: Hash },
}
