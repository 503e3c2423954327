//! Difficulty and challenge computation.

use primitive_types::U256;
use shared_types::{BlockHeader, BlockNumber, Hash, Timestamp};
use tracing::trace;

use crate::config::DifficultyConfig;

/// Parent metadata the next difficulty is derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentInfo {
    pub block_number: BlockNumber,
    /// Milliseconds since epoch
    pub timestamp: Timestamp,
    pub difficulty: U256,
}

impl From<&BlockHeader> for ParentInfo {
    fn from(header: &BlockHeader) -> Self {
        Self {
            block_number: header.block_number,
            timestamp: header.timestamp,
            difficulty: header.difficulty,
        }
    }
}

/// Difficulty calculator
#[derive(Clone, Debug, Default)]
pub struct DifficultyEngine {
    config: DifficultyConfig,
}

impl DifficultyEngine {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    /// Difficulty of a block mined at `new_timestamp` on top of `previous`.
    pub fn next_difficulty(&self, previous: &ParentInfo, new_timestamp: Timestamp) -> U256 {
        let elapsed_ms = i128::from(new_timestamp) - i128::from(previous.timestamp);
        let mine_time = elapsed_ms.div_euclid(1000);
        let floor = -i128::from(self.config.max_slowdown_adjustment);
        let time_adjustment = (i128::from(self.config.target_block_time_secs) - mine_time).max(floor);

        let step = previous.difficulty / U256::from(self.config.adjustment_divisor.max(1));
        let scaled = step.saturating_mul(U256::from(time_adjustment.unsigned_abs()));
        let adjusted = if time_adjustment >= 0 {
            previous.difficulty.saturating_add(scaled)
        } else {
            previous.difficulty.saturating_sub(scaled)
        };

        let bomb = self.bomb(previous.block_number);
        let difficulty = adjusted.saturating_add(bomb).max(self.config.minimum_difficulty);

        trace!(
            mine_time = mine_time as i64,
            time_adjustment = time_adjustment as i64,
            %difficulty,
            "next difficulty"
        );
        difficulty
    }

    /// Exponential term that kicks in every `bomb_period` blocks.
    fn bomb(&self, block_number: BlockNumber) -> U256 {
        let period = self.config.bomb_period.max(1);
        let exponent = (block_number / period) as i128 - 2;
        if exponent < 0 {
            U256::zero()
        } else if exponent >= 256 {
            U256::MAX
        } else {
            U256::one() << (exponent as usize)
        }
    }

    /// Cumulative work after adding `difficulty` on top of `parent_total`.
    pub fn total_difficulty(&self, parent_total: U256, difficulty: U256) -> U256 {
        parent_total.saturating_add(difficulty)
    }
}

/// floor((2^255 - 1) / max(difficulty, 1))
pub fn next_challenge(difficulty: U256) -> U256 {
    let ceiling = (U256::one() << 255) - U256::one();
    ceiling / difficulty.max(U256::one())
}

/// Whether a block hash, read as a big-endian integer, is at or below the challenge.
#[inline]
pub fn meets_challenge(hash: &Hash, challenge: U256) -> bool {
    U256::from_big_endian(hash) <= challenge
}
