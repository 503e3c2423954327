//! Rolling window of the most recent headers.

use std::collections::VecDeque;

use shared_types::{BlockHeader, Timestamp};

use crate::domain::chain::HeaderChain;

#[derive(Debug)]
pub struct Snapshot {
    size: usize,
    headers: VecDeque<BlockHeader>,
}

impl Snapshot {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            headers: VecDeque::new(),
        }
    }

    pub fn push(&mut self, header: BlockHeader) {
        if self.headers.len() == self.size {
            self.headers.pop_front();
        }
        self.headers.push_back(header);
    }

    /// Re-derive from the tail of `chain`.
    pub fn rebuild(&mut self, chain: &HeaderChain) {
        self.headers.clear();
        let headers = chain.headers();
        let start = headers.len().saturating_sub(self.size);
        self.headers.extend(headers[start..].iter().cloned());
    }

    pub fn headers(&self) -> impl Iterator<Item = &BlockHeader> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Median timestamp of the window (lower median for even counts).
    pub fn median_timestamp(&self) -> Option<Timestamp> {
        if self.headers.is_empty() {
            return None;
        }
        let mut timestamps: Vec<Timestamp> = self.headers.iter().map(|h| h.timestamp).collect();
        timestamps.sort_unstable();
        Some(timestamps[(timestamps.len() - 1) / 2])
    }
}
