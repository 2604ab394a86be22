//! In-memory handoff cache.
//!
//! An explicit get/put/invalidate abstraction owned by the state
//! machine. Entries for resolved handoffs must be invalidated at the
//! point of resolution.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::handoff::Handoff;

/// Per-venture cache of known handoffs, keyed by id.
#[derive(Debug, Default)]
pub struct HandoffCache {
    entries: HashMap<Uuid, Handoff>,
}

impl HandoffCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handoff_id: Uuid) -> Option<&Handoff> {
        self.entries.get(&handoff_id)
    }

    pub fn put(&mut self, handoff: Handoff) {
        self.entries.insert(handoff.handoff_id, handoff);
    }

    pub fn invalidate(&mut self, handoff_id: Uuid) {
        self.entries.remove(&handoff_id);
    }

    /// Drop every entry (used on re-initialization).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached pending handoffs, oldest first.
    pub fn pending(&self) -> Vec<&Handoff> {
        let mut pending: Vec<&Handoff> = self
            .entries
            .values()
            .filter(|h| !h.status.is_terminal())
            .collect();
        pending.sort_by_key(|h| h.proposed_at);
        pending
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
