//! Mempool configuration.

use serde::Deserialize;

/// Order in which available receipts are offered to block assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOrder {
    /// Oldest first.
    #[default]
    Timestamp,
    /// Highest fee first.
    Fee,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Byte budget of one gathered batch.
    pub max_batch_bytes: usize,
    /// Maximum pending entries (available + reserved).
    pub capacity: usize,
    pub selection_order: SelectionOrder,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: 50_000,
            capacity: 100_000,
            selection_order: SelectionOrder::Timestamp,
        }
    }
}

impl MempoolConfig {
    pub fn for_testing() -> Self {
        Self {
            capacity: 1_000,
            ..Default::default()
        }
    }
}
