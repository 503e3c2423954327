//! Round-robin validator order.

use std::collections::HashSet;

/// Validators in configured order, filtered to the connected ones, and the
/// position of the current turn.
#[derive(Debug, Clone)]
pub struct ValidatorOrder {
    configured: Vec<String>,
    connected: HashSet<String>,
    active: Vec<String>,
    counter: usize,
}

impl ValidatorOrder {
    /// `local` counts as connected from the start.
    pub fn new(configured: Vec<String>, local: &str) -> Self {
        let mut order = Self {
            configured,
            connected: HashSet::from([local.to_string()]),
            active: Vec::new(),
            counter: 0,
        };
        order.reset();
        order
    }

    /// Whose turn it is, if anyone is active.
    pub fn current(&self) -> Option<&str> {
        self.active.get(self.counter).map(String::as_str)
    }

    pub fn advance(&mut self) -> Option<&str> {
        if !self.active.is_empty() {
            self.counter = (self.counter + 1) % self.active.len();
        }
        self.current()
    }

    /// Re-derive the active order and restart at the first validator.
    pub fn reset(&mut self) {
        self.active = self
            .configured
            .iter()
            .filter(|key| self.connected.contains(*key))
            .cloned()
            .collect();
        self.counter = 0;
    }

    /// Returns whether the set changed. Identities outside the configured set
    /// are tracked but never get a turn.
    pub fn join(&mut self, identity: &str) -> bool {
        let added = self.connected.insert(identity.to_string());
        self.reset();
        added
    }

    pub fn leave(&mut self, identity: &str) -> bool {
        let removed = self.connected.remove(identity);
        self.reset();
        removed
    }

    pub fn is_active(&self, identity: &str) -> bool {
        self.active.iter().any(|key| key == identity)
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
