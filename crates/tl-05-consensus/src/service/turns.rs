//! Turn rotation and the local proposal path.

use super::*;

impl ConsensusCoordinator {
    /// Act on whoever holds the turn now.
    pub(super) async fn begin_turn(&mut self) {
        self.timer = None;
        let Some(turn) = self.order.current().map(str::to_string) else {
            warn!("[tl-05] {}", ConsensusError::NoValidators);
            self.phase = RoundPhase::Idle;
            return;
        };

        if turn != self.identity {
            debug!("[tl-05] Awaiting confirmation from {}", turn);
            self.arm(
                Some(WaitPhase::Confirmation),
                &turn,
                self.config.confirmation_wait(),
            );
            self.phase = RoundPhase::AwaitingTurn {
                validator: turn,
                announced: false,
            };
            return;
        }

        if self.phase.is_busy() || !self.deps.ledger.is_ready() {
            debug!("[tl-05] Node busy, letting own turn lapse");
            self.arm(
                Some(WaitPhase::Confirmation),
                &turn,
                self.config.confirmation_wait(),
            );
            return;
        }

        self.send(ConsensusMessage::GeneratingBlock {
            identity: self.identity.clone(),
        })
        .await;
        self.propose().await;
    }

    pub(super) async fn next_turn(&mut self) {
        self.order.advance();
        self.begin_turn().await;
    }

    /// Validator set changed: start over from the first active validator.
    pub(super) async fn reset_turns(&mut self) {
        self.abandon_proposal().await;
        self.timer = None;
        info!(
            "[tl-05] Resetting turns, {} active validators",
            self.order.len()
        );
        self.begin_turn().await;
    }

    async fn propose(&mut self) {
        self.round += 1;
        let round = self.round;
        self.phase = RoundPhase::Proposing { round };

        let block = match self.deps.ledger.assemble(&self.identity).await {
            Ok(block) => block,
            Err(err) => {
                warn!("[tl-05] Could not assemble a block: {}", err);
                self.phase = RoundPhase::Idle;
                let own = self.identity.clone();
                self.arm(
                    Some(WaitPhase::Confirmation),
                    &own,
                    self.config.confirmation_wait(),
                );
                return;
            }
        };
        info!(
            "[tl-05] Producing block {} with {} transactions and {} actions",
            block.number(),
            block.transactions.len(),
            block.actions.len()
        );

        if !self.config.proof_of_work {
            self.produced(round, block).await;
            return;
        }
        if let Err(err) = self.worker.mine(round, block) {
            warn!("[tl-05] {}", err);
            self.phase = RoundPhase::Idle;
        }
    }

    /// A candidate for `round` is ready. Stale rounds are discarded.
    pub(super) async fn produced(&mut self, round: u64, mut block: Block) {
        if self.phase != (RoundPhase::Proposing { round }) {
            debug!(
                "[tl-05] Discarding stale block {} from round {}",
                block.number(),
                round
            );
            self.discard(&block).await;
            return;
        }

        let hash = block.hash();
        let signature = self.deps.signer.sign(&hash);
        block
            .header
            .signatures
            .insert(self.identity.clone(), signature);
        self.send(ConsensusMessage::RequestSignature {
            identity: self.identity.clone(),
            header: Box::new(block.header.clone()),
        })
        .await;

        if self.order.len() <= 1 || block.header.signatures.len() >= self.config.minimum_signatures {
            self.finalize(block).await;
            return;
        }

        debug!(
            "[tl-05] Block {} awaiting {} signatures",
            block.number(),
            self.config.minimum_signatures
        );
        self.phase = RoundPhase::AwaitingSignatures { hash };
        self.pending = Some(block);
        let own = self.identity.clone();
        self.arm(Some(WaitPhase::Signatures), &own, self.config.header_wait());
    }

    /// Commit a local block, then pause before the next turn.
    pub(super) async fn finalize(&mut self, block: Block) {
        self.phase = RoundPhase::Finalizing;
        self.timer = None;
        let number = block.number();
        let signatures = block.header.signatures.len();

        match self.deps.ledger.finalize(block).await {
            Ok(()) => info!(
                "[tl-05] Finalized block {} with {} signatures",
                number, signatures
            ),
            Err(err) => warn!("[tl-05] Block {} not finalized: {}", number, err),
        }

        self.phase = RoundPhase::Idle;
        let own = self.identity.clone();
        self.arm(None, &own, self.config.block_interval());
    }

    /// A peer's block for this turn was committed by the node. The turn
    /// passes after the block interval, the same pause the proposer takes.
    pub(super) async fn on_block_committed(&mut self, hash: Hash) {
        if is_pending(&self.pending, &hash) {
            return;
        }
        if self.phase.is_busy() {
            info!("[tl-05] Competing block adopted, abandoning local proposal");
            self.abandon_proposal().await;
        }
        self.phase = RoundPhase::Idle;
        let holder = self
            .order
            .current()
            .map(str::to_string)
            .unwrap_or_else(|| self.identity.clone());
        self.arm(None, &holder, self.config.block_interval());
    }
}
