//! Ledger configuration.

use serde::Deserialize;

/// How a block proves it may extend the chain.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConsensusMode {
    /// Block hash at or below the header challenge.
    ProofOfWork,
    /// Quorum of validator signatures over the block hash.
    Permissioned { minimum_signatures: usize },
}

impl Default for ConsensusMode {
    fn default() -> Self {
        ConsensusMode::Permissioned {
            minimum_signatures: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub consensus: ConsensusMode,
    /// Identities (hex public keys) whose signatures count toward the quorum.
    pub validators: Vec<String>,
    /// A block this many numbers ahead of the head signals a major fork.
    pub major_fork_threshold: u64,
    /// Depth of the rollback a major fork triggers.
    pub major_fork_rollback_depth: u64,
    /// A branch this many blocks longer wins regardless of work.
    pub longer_branch_margin: u64,
    pub block_pool_capacity: usize,
    /// Number of recent headers kept for median-time and fork comparison.
    pub snapshot_size: usize,
    /// How far ahead of local time a block timestamp may be.
    pub max_future_drift_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            consensus: ConsensusMode::default(),
            validators: Vec::new(),
            major_fork_threshold: 5,
            major_fork_rollback_depth: 20,
            longer_branch_margin: 5,
            block_pool_capacity: 30,
            snapshot_size: 10,
            max_future_drift_ms: 20 * 60 * 1000,
        }
    }
}

impl LedgerConfig {
    /// Proof-of-work mode; tests pair it with a tiny minimum difficulty.
    pub fn for_testing() -> Self {
        Self {
            consensus: ConsensusMode::ProofOfWork,
            ..Default::default()
        }
    }
}
