//! Distilled memory pool

use std::collections::HashMap;

use chrono::Utc;

use crate::types::{MemoryEntry, MemoryId};

/// Owns memory entries keyed by memory id
///
/// Iteration follows insertion order so pairwise consolidation passes and
/// tie-breaking ("first-indexed wins") are deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<MemoryId, MemoryEntry>,
    order: Vec<MemoryId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry by memory id
    pub fn insert(&mut self, entry: MemoryEntry) {
        let id = entry.memory.memory_id.clone();
        if self.entries.insert(id.clone(), entry).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&MemoryEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MemoryEntry> {
        self.entries.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<MemoryEntry> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.order.retain(|x| x != id);
        }
        removed
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Memory ids in insertion order
    pub fn ids(&self) -> Vec<MemoryId> {
        self.order.clone()
    }

    /// Retrieval bookkeeping: bump usage count and refresh last-used
    pub fn record_usage(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.memory.usage_count += 1;
            entry.memory.last_used = Utc::now();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
