//! Validator configuration.

use serde::Deserialize;
use shared_types::{Amount, BASE_UNITS_PER_COIN};

/// Tunable validation thresholds.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Entries at or above this many encoded bytes are rejected.
    pub max_entry_size_bytes: usize,
    /// Ceiling on a coinbase amount.
    pub mining_reward: Amount,
    /// Minimum fee charged per byte of the unsigned body.
    pub fee_per_byte: Amount,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_entry_size_bytes: 10 * 1024,
            mining_reward: 50 * BASE_UNITS_PER_COIN,
            fee_per_byte: 1,
        }
    }
}

impl ValidatorConfig {
    /// Zero size fee so fixtures need not compute exact fees.
    pub fn for_testing() -> Self {
        Self {
            fee_per_byte: 0,
            ..Default::default()
        }
    }
}
