//! Peer coordination messages.

use super::*;
use shared_types::{BlockHeader, Signature};

impl ConsensusCoordinator {
    pub(super) async fn on_message(&mut self, message: ConsensusMessage) {
        if message.sender() == self.identity {
            return;
        }
        match message {
            ConsensusMessage::ValidatorConnected { identity } => {
                self.order.join(&identity);
                self.send(ConsensusMessage::DiscoverValidator {
                    identity: self.identity.clone(),
                })
                .await;
                self.reset_turns().await;
            }
            ConsensusMessage::DiscoverValidator { identity } => {
                if self.order.join(&identity) {
                    self.reset_turns().await;
                }
            }
            ConsensusMessage::ValidatorDisconnected { identity } => {
                if self.order.leave(&identity) {
                    self.reset_turns().await;
                }
            }
            ConsensusMessage::GeneratingBlock { identity } => self.on_generating(identity),
            ConsensusMessage::RequestSignature { identity, header } => {
                self.on_signature_request(identity, *header).await
            }
            ConsensusMessage::Signature {
                identity,
                hash,
                signature,
            } => self.on_signature(identity, hash, signature).await,
        }
    }

    fn on_generating(&mut self, identity: String) {
        let RoundPhase::AwaitingTurn {
            validator,
            announced,
        } = &mut self.phase
        else {
            debug!("[tl-05] Ignoring announcement from {} outside a peer turn", identity);
            return;
        };
        if *validator != identity {
            warn!(
                "[tl-05] Announcement from {} but the turn belongs to {}",
                identity, validator
            );
            return;
        }
        if *announced {
            return;
        }
        *announced = true;
        debug!("[tl-05] {} is generating, awaiting its header", identity);
        self.arm(Some(WaitPhase::Header), &identity, self.config.header_wait());
    }

    /// Sign the turn holder's header once its hash checks out.
    async fn on_signature_request(&mut self, identity: String, header: BlockHeader) {
        if self.order.current() != Some(identity.as_str()) {
            warn!(
                "[tl-05] Signature request from {} outside its turn",
                identity
            );
            return;
        }
        if !self.deps.ledger.accepts_header(&header) {
            warn!(
                "[tl-05] {}",
                ConsensusError::InvalidHeader(header.short_hash())
            );
            return;
        }

        if self.phase.is_busy() {
            self.abandon_proposal().await;
        }
        let signature = self.deps.signer.sign(&header.hash);
        debug!(
            "[tl-05] Signing block {} from {}",
            header.block_number, identity
        );
        self.send(ConsensusMessage::Signature {
            identity: self.identity.clone(),
            hash: header.hash,
            signature,
        })
        .await;

        self.phase = RoundPhase::AwaitingTurn {
            validator: identity.clone(),
            announced: true,
        };
        // wait for the block itself to be committed
        self.arm(Some(WaitPhase::Header), &identity, self.config.header_wait());
    }

    async fn on_signature(&mut self, identity: String, hash: Hash, signature: Signature) {
        let RoundPhase::AwaitingSignatures { hash: awaited } = &self.phase else {
            return;
        };
        if *awaited != hash {
            debug!("[tl-05] Signature from {} for a block no longer pending", identity);
            return;
        }
        if !self.order.is_active(&identity) {
            warn!("[tl-05] Signature from inactive validator {}", identity);
            return;
        }
        if !self.deps.verifier.verify(&hash, &signature, &identity) {
            warn!("[tl-05] Invalid signature from {}", identity);
            return;
        }

        let Some(block) = self.pending.as_mut() else {
            return;
        };
        block.header.signatures.insert(identity, signature);
        if block.header.signatures.len() < self.config.minimum_signatures {
            return;
        }
        if let Some(block) = self.pending.take() {
            self.finalize(block).await;
        }
    }
}
