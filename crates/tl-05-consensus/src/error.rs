//! # Consensus Errors
//!
//! Timeouts are never fatal: the coordinator logs them and skips the turn.

use thiserror::Error;

pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// What the coordinator was waiting for when a timer expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    Confirmation,
    Header,
    Signatures,
}

impl std::fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WaitPhase::Confirmation => "turn confirmation",
            WaitPhase::Header => "block header",
            WaitPhase::Signatures => "signatures",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("Timed out waiting for {phase} from {validator}")]
    Timeout { phase: WaitPhase, validator: String },

    #[error("No active validators")]
    NoValidators,

    #[error("Header {0} does not match its contents")]
    InvalidHeader(String),

    #[error("Ledger rejected the operation: {0}")]
    Ledger(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Mining worker stopped")]
    WorkerStopped,
}

impl ConsensusError {
    /// Whether the coordinator keeps running after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ConsensusError::WorkerStopped)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConsensusError::Timeout { .. })
    }
}
