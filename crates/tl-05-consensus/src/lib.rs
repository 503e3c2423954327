//! # Consensus Coordinator (TL-05)
//!
//! Round-robin leadership among the connected validators, proof-of-work
//! production in a cancellable worker, and threshold-signature finalization.
//!
//! ## Per-Node State Machine
//!
//! ```text
//!            ┌──────────── own turn ────────────┐
//!            │                                   ▼
//! Idle ──→ AwaitingTurn ──(skip on timeout)   Proposing ──mined──→ AwaitingSignatures
//!  ▲                                                                   │
//!  └────────────── block interval ←── Finalizing ←── threshold met ────┘
//! ```
//!
//! ## Liveness
//!
//! Every wait has a deadline. A silent leader, a missing header or missing
//! signatures move the rotation to the next validator; nothing stalls.
//!
//! ## Cancellation
//!
//! Mining runs in a separate task reached only through messages. When a
//! competing block is committed the round is cancelled, and any late result for
//! it is discarded with its mempool entries returned.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod worker;

pub use config::ConsensusConfig;
pub use domain::messages::{ConsensusInput, ConsensusMessage};
pub use domain::order::ValidatorOrder;
pub use domain::round::{RoundPhase, TurnTimer};
pub use error::{ConsensusError, ConsensusResult, WaitPhase};
pub use ports::outbound::{LedgerGateway, PeerBroadcast};
pub use service::{ConsensusCoordinator, CoordinatorDependencies};
pub use worker::{MiningWorker, WorkerCommand, WorkerEvent};
