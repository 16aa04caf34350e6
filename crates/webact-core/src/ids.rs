//! Element id allocation.
//!
//! Ids have the form `"{class}_{n}"` where `n` counts up per class name. An
//! [`IdAllocator`] is owned by whatever needs ids (a widget root, a
//! connector) instead of living in process-wide state, so two independent
//! owners never share counters.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Hands out `Class_N` style identifiers with one counter per class name.
#[derive(Debug, Default)]
pub struct IdAllocator {
    counters: Mutex<HashMap<String, u64>>,
}

impl IdAllocator {
    /// Create an allocator with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id for `class`, starting at `{class}_1`.
    pub fn next_id(&self, class: &str) -> String {
        format!("{class}_{}", self.next_number(class))
    }

    /// Allocate the next raw counter value for `class`.
    pub fn next_number(&self, class: &str) -> u64 {
        let mut counters = self.counters.lock();
        let counter = counters.entry(class.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Build a sub-element id from an allocated id, e.g. `Table_3_header`.
    pub fn derived_id(id: &str, postfix: &str) -> String {
        format!("{id}_{postfix}")
    }

    /// Number of ids handed out so far for `class`.
    pub fn issued(&self, class: &str) -> u64 {
        self.counters.lock().get(class).copied().unwrap_or(0)
    }

    /// Reset every counter.
    pub fn reset(&self) {
        self.counters.lock().clear();
    }
}
