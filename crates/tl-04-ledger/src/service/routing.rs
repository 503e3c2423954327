//! # Block Routing
//!
//! | Received block | Outcome |
//! |----------------|---------|
//! | extends the head | fully validated and committed, then pooled children are drained |
//! | parent is pooled | fork choice between the pooled branch and the canonical chain |
//! | number ≥ head + `major_fork_threshold` | pooled, rollback by `major_fork_rollback_depth`, resync |
//! | anything else | pooled |
//!
//! Blocks that do not extend the head only get the context-free integrity
//! checks here, plus the header rules against their parent when that parent is
//! known. Their entries are validated when their branch is applied.

use super::*;
use tracing::{debug, warn};

use crate::domain::fork_choice::{prefer_branch, ChainTip};

impl Ledger {
    /// Validate and place a block received from a peer or produced locally.
    #[instrument(skip_all, fields(number = block.number(), hash = %block.header.short_hash()))]
    pub fn receive_block(&mut self, block: Block) -> LedgerResult<RouteOutcome> {
        self.ensure_running()?;

        let hash = block.hash();
        if self.chain.contains(&hash) || self.pool.contains(&hash) {
            return Err(LedgerError::DuplicateBlock(block.header.short_hash()));
        }

        let head = self.head_header()?.clone();

        if block.header.extends(&head) {
            self.validate_block(&block)?;
            self.commit_block(block, true)?;
            self.state = NodeState::Running;
            let new_head = self.extend_from_pool();
            info!("[tl-04] Chain extended to block {}", new_head);
            return Ok(RouteOutcome::Extended(new_head));
        }

        self.check_integrity(&block)?;
        self.check_lineage(&block)?;

        if self.pool.contains(&block.previous_hash()) {
            return self.route_to_pooled_branch(block, &head);
        }

        let threshold = head
            .block_number
            .saturating_add(self.config.major_fork_threshold);
        if block.number() >= threshold {
            let target = head
                .block_number
                .saturating_sub(self.config.major_fork_rollback_depth);
            warn!(
                "[tl-04] Block {} is {} ahead of head {}, rolling back to {} for resync",
                block.number(),
                block.number() - head.block_number,
                head.block_number,
                target
            );
            self.pool_block(block);
            let removed = self.rollback_to_block(target)?;
            self.state = NodeState::Syncing;
            return Ok(RouteOutcome::ResyncRequested {
                rolled_back_to: target,
                removed,
            });
        }

        debug!("[tl-04] Pooling unlinked block {}", block.number());
        self.pool_block(block);
        Ok(RouteOutcome::Pooled)
    }

    fn pool_block(&mut self, block: Block) {
        match self.pool.insert(block) {
            Ok(Some(evicted)) => debug!(
                "[tl-04] Block pool full, evicted block {} {}",
                evicted.number(),
                evicted.header.short_hash()
            ),
            Ok(None) => {}
            Err(duplicate) => debug!(
                "[tl-04] Block {} already pooled",
                duplicate.header.short_hash()
            ),
        }
    }

    /// Commit pooled blocks that now extend the head. Returns the head number.
    fn extend_from_pool(&mut self) -> BlockNumber {
        loop {
            let Some(head) = self.chain.head().cloned() else {
                return 0;
            };
            if !self.state.accepts_blocks() {
                return head.block_number;
            }
            let Some(child) = self.pool.child_of(&head) else {
                return head.block_number;
            };
            let Some(block) = self.pool.remove(&child) else {
                return head.block_number;
            };

            let committed = self
                .validate_block(&block)
                .and_then(|_| self.commit_block(block, true));
            if let Err(err) = committed {
                warn!("[tl-04] Dropping pooled block above {}: {}", head.block_number, err);
            }
        }
    }

    /// Fork choice between the canonical chain and the pooled branch `block`
    /// extends.
    fn route_to_pooled_branch(
        &mut self,
        block: Block,
        head: &BlockHeader,
    ) -> LedgerResult<RouteOutcome> {
        let tip = ChainTip::from(&block.header);
        let tip_hash = block.hash();
        self.pool_block(block);

        if !prefer_branch(
            ChainTip::from(head),
            tip,
            self.config.longer_branch_margin,
        ) {
            debug!(
                "[tl-04] Keeping head {} over branch ending at {}",
                head.block_number, tip.number
            );
            return Ok(RouteOutcome::KeptCurrent);
        }

        let branch: Vec<Block> = self
            .pool
            .branch_ending_at(&tip_hash)
            .into_iter()
            .cloned()
            .collect();
        let Some(root) = branch.first() else {
            return Ok(RouteOutcome::KeptCurrent);
        };

        match self.chain.number_of(&root.previous_hash()) {
            Some(fork_point) => self.adopt_branch(fork_point, branch),
            None => {
                let target = root
                    .number()
                    .saturating_sub(1)
                    .min(head.block_number);
                warn!(
                    "[tl-04] Preferred branch from block {} does not link, rolling back to {} for resync",
                    root.number(),
                    target
                );
                let removed = self.rollback_to_block(target)?;
                self.state = NodeState::Syncing;
                Ok(RouteOutcome::ResyncRequested {
                    rolled_back_to: target,
                    removed,
                })
            }
        }
    }

    /// Replace the blocks above `fork_point` with `branch`. If a branch block
    /// fails validation the displaced blocks are restored.
    fn adopt_branch(
        &mut self,
        fork_point: BlockNumber,
        branch: Vec<Block>,
    ) -> LedgerResult<RouteOutcome> {
        for block in &branch {
            self.pool.remove(&block.hash());
        }
        let displaced = self.rollback_to_block(fork_point)?;
        info!(
            "[tl-04] Reorganizing at block {}: {} blocks displaced, {} adopted",
            fork_point,
            displaced.len(),
            branch.len()
        );

        for block in branch {
            let adopted = self
                .validate_block(&block)
                .and_then(|_| self.commit_block(block, true));
            if let Err(err) = adopted {
                warn!("[tl-04] Branch block rejected, restoring previous chain: {}", err);
                self.restore_displaced(fork_point, displaced)?;
                return Err(err);
            }
        }

        for block in &displaced {
            self.pool_block(block.clone());
        }
        self.state = NodeState::Running;
        let new_head = self.head_header()?.block_number;
        Ok(RouteOutcome::Reorganized {
            fork_point,
            new_head,
            displaced,
        })
    }

    fn restore_displaced(&mut self, fork_point: BlockNumber, displaced: Vec<Block>) -> LedgerResult<()> {
        self.rollback_to_block(fork_point)?;
        for block in displaced {
            let number = block.number();
            if let Err(err) = self.commit_block(block, true) {
                return Err(self.fail_closed(fork_point, format!("re-applying block {number}: {err}")));
            }
        }
        Ok(())
    }
}
