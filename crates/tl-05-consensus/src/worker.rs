//! # Mining Worker
//!
//! Proof-of-work search on Tokio's blocking pool. The coordinator talks to
//! the supervising task only through messages:
//!
//! ```text
//! coordinator ──Mine{round, block}──→ worker
//! coordinator ──Cancel{round}───────→ worker
//! coordinator ←──Mined{round, block}── worker
//! coordinator ←──Abandoned{round, block}── worker
//! ```
//!
//! The search thread tries `nonces_per_slice` nonces between looks at its
//! stop flag. A `Mined` result may still arrive after the coordinator moved
//! on; the coordinator compares the round and discards it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared_types::Block;
use tl_01_difficulty::meets_challenge;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace, warn};

use crate::error::{ConsensusError, ConsensusResult};

#[derive(Debug)]
pub enum WorkerCommand {
    /// Search a nonce for `block`, replacing any running search.
    Mine { round: u64, block: Block },
    Cancel { round: u64 },
}

#[derive(Debug)]
pub enum WorkerEvent {
    /// `block` is sealed with a nonce that meets its challenge.
    Mined { round: u64, block: Block },
    /// The search for `round` was cancelled or superseded.
    Abandoned { round: u64, block: Block },
}

impl WorkerEvent {
    pub fn round(&self) -> u64 {
        match self {
            WorkerEvent::Mined { round, .. } | WorkerEvent::Abandoned { round, .. } => *round,
        }
    }
}

/// Handle to a spawned worker task. Dropping it stops the task.
#[derive(Debug, Clone)]
pub struct MiningWorker {
    commands: mpsc::UnboundedSender<WorkerCommand>,
}

impl MiningWorker {
    /// Spawn the supervising task on the current Tokio runtime.
    pub fn spawn(nonces_per_slice: u64) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(run(command_rx, event_tx, nonces_per_slice.max(1)));
        (Self { commands }, events)
    }

    pub fn mine(&self, round: u64, block: Block) -> ConsensusResult<()> {
        self.commands
            .send(WorkerCommand::Mine { round, block })
            .map_err(|_| ConsensusError::WorkerStopped)
    }

    pub fn cancel(&self, round: u64) -> ConsensusResult<()> {
        self.commands
            .send(WorkerCommand::Cancel { round })
            .map_err(|_| ConsensusError::WorkerStopped)
    }
}

/// Where a search thread left its block.
#[derive(Debug)]
struct Search {
    block: Block,
    found: bool,
}

/// Walk nonces upward until the block meets its challenge or `stop` is set.
fn search(mut block: Block, stop: &AtomicBool, slice: u64) -> Search {
    let challenge = block.header.challenge;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Search { block, found: false };
        }
        for _ in 0..slice {
            if meets_challenge(&block.hash(), challenge) {
                return Search { block, found: true };
            }
            let next = block.header.nonce.wrapping_add(1);
            block.seal(next);
        }
    }
}

/// A search running on the blocking pool.
struct Job {
    round: u64,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Search>,
}

impl Job {
    fn start(round: u64, block: Block, slice: u64) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = tokio::task::spawn_blocking(move || search(block, &flag, slice));
        Self {
            round,
            stop,
            handle,
        }
    }

    /// Stop the thread and take the block back.
    async fn halt(&mut self) -> Result<Block, JoinError> {
        self.stop.store(true, Ordering::Relaxed);
        (&mut self.handle).await.map(|search| search.block)
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        // a dropped supervisor must not leave a thread spinning
        self.stop.store(true, Ordering::Relaxed);
    }
}

enum Wake {
    Command(Option<WorkerCommand>),
    Finished(Result<Search, JoinError>),
}

async fn run(
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    slice: u64,
) {
    let mut job: Option<Job> = None;

    loop {
        let wake = match job.as_mut() {
            Some(running) => tokio::select! {
                command = commands.recv() => Wake::Command(command),
                finished = &mut running.handle => Wake::Finished(finished),
            },
            None => Wake::Command(commands.recv().await),
        };

        let event = match wake {
            Wake::Command(None) => return,
            Wake::Command(Some(WorkerCommand::Mine { round, block })) => {
                debug!("[tl-05] Mining block {} for round {}", block.number(), round);
                let previous = job.replace(Job::start(round, block, slice));
                match previous {
                    Some(previous) => abandon(previous).await,
                    None => None,
                }
            }
            Wake::Command(Some(WorkerCommand::Cancel { round })) => {
                if job.as_ref().is_some_and(|running| running.round == round) {
                    debug!("[tl-05] Mining for round {} cancelled", round);
                    match job.take() {
                        Some(cancelled) => abandon(cancelled).await,
                        None => None,
                    }
                } else {
                    None
                }
            }
            Wake::Finished(finished) => {
                let Some(done) = job.take() else {
                    continue;
                };
                match finished {
                    Ok(Search { block, found: true }) => {
                        trace!(
                            "[tl-05] Nonce {} found for round {}",
                            block.header.nonce,
                            done.round
                        );
                        Some(WorkerEvent::Mined {
                            round: done.round,
                            block,
                        })
                    }
                    Ok(Search { block, found: false }) => Some(WorkerEvent::Abandoned {
                        round: done.round,
                        block,
                    }),
                    Err(err) => {
                        warn!("[tl-05] Mining thread for round {} failed: {}", done.round, err);
                        None
                    }
                }
            }
        };

        if let Some(event) = event {
            if events.send(event).is_err() {
                return;
            }
        }
    }
}

/// Stop `job` and report its block as abandoned.
async fn abandon(mut job: Job) -> Option<WorkerEvent> {
    match job.halt().await {
        Ok(block) => Some(WorkerEvent::Abandoned {
            round: job.round,
            block,
        }),
        Err(err) => {
            warn!("[tl-05] Mining thread for round {} failed: {}", job.round, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;
    use shared_types::{BlockTemplate, Transaction};
    use tl_01_difficulty::next_challenge;

    fn block(challenge: U256) -> Block {
        let coinbase = Transaction::coinbase("miner", 1, 1_000, 1);
        Block::from_template(BlockTemplate {
            block_number: 1,
            previous_hash: [1; 32],
            timestamp: 1_000,
            coinbase_transaction_hash: coinbase.hash,
            transactions: vec![coinbase],
            actions: vec![],
            difficulty: U256::from(4),
            total_difficulty: U256::from(5),
            challenge,
            mined_by: "miner".into(),
        })
    }

    #[tokio::test]
    async fn test_worker_finds_nonce_under_challenge() {
        let (worker, mut events) = MiningWorker::spawn(16);
        worker.mine(7, block(next_challenge(U256::from(4)))).unwrap();

        match events.recv().await.unwrap() {
            WorkerEvent::Mined { round, block } => {
                assert_eq!(round, 7);
                assert!(block.header.has_valid_hash());
                assert!(meets_challenge(&block.hash(), block.header.challenge));
            }
            other => panic!("expected a mined block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_returns_block() {
        let (worker, mut events) = MiningWorker::spawn(16);
        // no hash is at or below zero
        worker.mine(1, block(U256::zero())).unwrap();
        worker.cancel(1).unwrap();

        let event = events.recv().await.unwrap();
        assert!(matches!(event, WorkerEvent::Abandoned { round: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancel_for_other_round_is_ignored() {
        let (worker, mut events) = MiningWorker::spawn(16);
        worker.mine(2, block(U256::zero())).unwrap();
        worker.cancel(1).unwrap();
        worker.mine(3, block(U256::MAX)).unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, WorkerEvent::Abandoned { round: 2, .. }));
        let second = events.recv().await.unwrap();
        assert!(matches!(second, WorkerEvent::Mined { round: 3, .. }));
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_worker() {
        let (worker, mut events) = MiningWorker::spawn(16);
        drop(worker);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_running_search() {
        let (worker, mut events) = MiningWorker::spawn(16);
        worker.mine(1, block(U256::zero())).unwrap();
        tokio::task::yield_now().await;
        drop(worker);

        // the runtime only shuts down once the search thread has returned
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_other_tasks_run_during_search() {
        let (worker, mut events) = MiningWorker::spawn(1 << 12);
        worker.mine(1, block(U256::zero())).unwrap();

        let ticks = tokio::spawn(async {
            for _ in 0..100 {
                tokio::task::yield_now().await;
            }
            100
        });
        assert_eq!(ticks.await.unwrap(), 100);

        worker.cancel(1).unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(event, WorkerEvent::Abandoned { round: 1, .. }));
    }

    #[test]
    fn test_search_honors_stop_flag() {
        let stop = AtomicBool::new(true);
        let original = block(U256::MAX);
        let result = search(original.clone(), &stop, 16);
        assert!(!result.found);
        assert_eq!(result.block, original);
    }
}
