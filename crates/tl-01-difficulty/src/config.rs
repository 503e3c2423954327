//! Difficulty configuration.
//!
//! Every constant here is tunable per deployment; none is load-bearing for
//! safety.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Genesis difficulty, also the default floor.
pub const GENESIS_DIFFICULTY: u64 = 0x1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Target time between blocks (in seconds)
    pub target_block_time_secs: u64,
    /// Divisor applied to the parent difficulty before scaling by the time
    /// adjustment
    pub adjustment_divisor: u64,
    /// Lower bound of the time adjustment (stored positive, applied negative)
    pub max_slowdown_adjustment: u64,
    /// Blocks per difficulty-bomb doubling
    pub bomb_period: u64,
    /// Floor of any computed difficulty
    pub minimum_difficulty: U256,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            target_block_time_secs: 20,
            adjustment_divisor: 384,
            max_slowdown_adjustment: 99,
            bomb_period: 100_000,
            minimum_difficulty: U256::from(GENESIS_DIFFICULTY),
        }
    }
}

impl DifficultyConfig {
    /// Difficulty 1 keeps proof-of-work searches to a couple of hashes.
    pub fn for_testing() -> Self {
        Self {
            target_block_time_secs: 1,
            minimum_difficulty: U256::one(),
            ..Default::default()
        }
    }
}
