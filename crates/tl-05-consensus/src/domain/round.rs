//! Turn phases and the single pending timer.

use shared_types::Hash;
use tokio::time::Instant;

use crate::error::WaitPhase;

/// Where the local node is in the current turn.
///
/// ```text
/// Idle → AwaitingTurn → Proposing → AwaitingSignatures → Finalizing → Idle
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoundPhase {
    #[default]
    Idle,
    /// Another validator holds the turn. `announced` once it confirmed it is
    /// generating.
    AwaitingTurn { validator: String, announced: bool },
    /// Assembling or mining the local block for `round`.
    Proposing { round: u64 },
    AwaitingSignatures { hash: Hash },
    Finalizing,
}

impl RoundPhase {
    /// A node busy with its own proposal does not start another.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            RoundPhase::Proposing { .. }
                | RoundPhase::AwaitingSignatures { .. }
                | RoundPhase::Finalizing
        )
    }
}

/// Deadline for the event the coordinator is waiting on. Expiry moves to the
/// next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTimer {
    /// `None` is the pause after a local block was finalized.
    pub phase: Option<WaitPhase>,
    pub validator: String,
    pub deadline: Instant,
}

impl TurnTimer {
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_busy_phases() {
        assert!(!RoundPhase::Idle.is_busy());
        assert!(!RoundPhase::AwaitingTurn {
            validator: "b".into(),
            announced: true
        }
        .is_busy());
        assert!(RoundPhase::Proposing { round: 1 }.is_busy());
        assert!(RoundPhase::Finalizing.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_due_after_deadline() {
        let timer = TurnTimer {
            phase: Some(WaitPhase::Confirmation),
            validator: "b".into(),
            deadline: Instant::now() + Duration::from_secs(1),
        };
        assert!(!timer.is_due(Instant::now()));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(timer.is_due(Instant::now()));
    }
}
