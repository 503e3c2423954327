//! # Rollback
//!
//! External steps run first, newest block first: registry undo, state
//! rollback, block store truncation. Only when all succeed are the spent sets,
//! header chain and snapshot rewound. A failing external step halts the
//! ledger.

use super::*;

impl Ledger {
    /// Remove every block above `target`. Returns the removed blocks, oldest
    /// first. A target at or above the head is a no-op.
    #[instrument(skip(self))]
    pub fn rollback_to_block(&mut self, target: BlockNumber) -> LedgerResult<Vec<Block>> {
        self.ensure_running()?;
        let head = self.head_header()?.block_number;
        if target >= head {
            return Ok(Vec::new());
        }

        let removed = (target + 1..=head)
            .map(|number| self.load_block(number))
            .collect::<LedgerResult<Vec<Block>>>()?;
        info!(
            "[tl-04] Rolling back {} blocks from {} to {}",
            removed.len(),
            head,
            target
        );

        for block in removed.iter().rev() {
            if let Err(err) = self.revert_registry_actions(block) {
                return Err(self.fail_closed(
                    target,
                    format!("registry undo of block {}: {err}", block.number()),
                ));
            }
        }
        if let Err(err) = self.deps.state.rollback_to(target) {
            return Err(self.fail_closed(target, format!("state rollback: {err}")));
        }
        if let Err(err) = self.deps.block_store.truncate_above(target) {
            return Err(self.fail_closed(target, format!("block store: {err}")));
        }

        for block in removed.iter().rev() {
            self.spent.unmark_block(block);
        }
        self.chain.truncate_above(target);
        self.snapshot.rebuild(&self.chain);
        Ok(removed)
    }
}
