//! In-memory state store.

use crate::core::Result;
use crate::state::store::{StateEntry, StateStore};
use std::collections::BTreeMap;

/// Non-durable store for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    committed: BTreeMap<String, StateEntry>,
    pending: BTreeMap<String, StateEntry>,
    flushes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Number of non-empty flushes so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Committed keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.committed.keys().map(String::as_str)
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&StateEntry> {
        self.pending.get(key).or_else(|| self.committed.get(key))
    }

    fn put(&mut self, key: String, entry: StateEntry) {
        self.pending.insert(key, entry);
    }

    fn flush(&mut self) -> Result<usize> {
        let committed = self.pending.len();
        if committed > 0 {
            self.committed.append(&mut self.pending);
            self.flushes += 1;
        }
        Ok(committed)
    }

    fn rollback(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}
