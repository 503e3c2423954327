//! # Fork Choice
//!
//! Heaviest chain with hysteresis: a candidate needs strictly more cumulative
//! difficulty, or a tip at least `margin` blocks beyond the current head.

use primitive_types::U256;
use shared_types::{BlockHeader, BlockNumber};

/// Summary of a chain tip for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub number: BlockNumber,
    pub total_difficulty: U256,
}

impl From<&BlockHeader> for ChainTip {
    fn from(header: &BlockHeader) -> Self {
        Self {
            number: header.block_number,
            total_difficulty: header.total_difficulty,
        }
    }
}

/// Whether `candidate` should replace `current`.
pub fn prefer_branch(current: ChainTip, candidate: ChainTip, margin: u64) -> bool {
    candidate.total_difficulty > current.total_difficulty
        || candidate.number >= current.number.saturating_add(margin)
}
