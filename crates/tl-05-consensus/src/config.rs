//! Coordinator configuration.

use std::time::Duration;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Validator identities (hex public keys) in rotation order.
    pub validators: Vec<String>,
    /// Signatures a proposed block needs, the proposer's own included.
    pub minimum_signatures: usize,
    /// How long to wait for the leader to announce it is generating a block.
    pub confirmation_wait_ms: u64,
    /// How long to wait for the announced leader's header, and for signatures
    /// on a local proposal.
    pub header_wait_ms: u64,
    /// Pause between finalizing a local block and the next turn.
    pub block_interval_ms: u64,
    /// Search for a nonce under the header challenge before proposing. When
    /// false the assembled block is proposed as is.
    pub proof_of_work: bool,
    /// Nonces tried between checks for a cancel message.
    pub nonces_per_slice: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
            minimum_signatures: 1,
            confirmation_wait_ms: 20_000,
            header_wait_ms: 30_000,
            block_interval_ms: 2_000,
            proof_of_work: true,
            nonces_per_slice: 10_000,
        }
    }
}

impl ConsensusConfig {
    /// Short timers for tests running on paused time.
    pub fn for_testing() -> Self {
        Self {
            confirmation_wait_ms: 1_000,
            header_wait_ms: 1_500,
            block_interval_ms: 500,
            nonces_per_slice: 64,
            ..Default::default()
        }
    }

    pub fn confirmation_wait(&self) -> Duration {
        Duration::from_millis(self.confirmation_wait_ms)
    }

    pub fn header_wait(&self) -> Duration {
        Duration::from_millis(self.header_wait_ms)
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }
}
