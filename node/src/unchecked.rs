//! Unchecked blocks: candidates waiting for a missing dependency.
//!
//! A block classified as `gap_previous` or `gap_source` is stored here under
//! the hash (or account) it is missing. Once that dependency is written to the
//! ledger, every block waiting on it is drained in arrival order and queued
//! for processing again. Registration is advisory: a replayed block is
//! classified from scratch and may land here again under another key.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use lattice_types::HashOrAccount;

use crate::block_processor::CandidateBlock;

/// A block waiting for its dependency to arrive.
#[derive(Clone, Debug)]
pub struct UncheckedEntry {
    pub candidate: CandidateBlock,
    pub registered_at: Instant,
}

/// Dependency key to waiting blocks, bounded in total size.
pub struct UncheckedMap {
    by_dependency: HashMap<HashOrAccount, Vec<UncheckedEntry>>,
    /// Total number of individual entries across all dependency keys.
    count: usize,
    /// Maximum total entries allowed (prevents memory exhaustion from spam).
    max_size: usize,
}

impl UncheckedMap {
    pub fn new(max_size: usize) -> Self {
        Self {
            by_dependency: HashMap::new(),
            count: 0,
            max_size,
        }
    }

    /// Store `candidate` until `dependency` is present.
    ///
    /// Returns `false` when the map is full or the same block already waits on
    /// this key.
    pub fn register(
        &mut self,
        dependency: HashOrAccount,
        candidate: CandidateBlock,
        now: Instant,
    ) -> bool {
        if self.count >= self.max_size {
            return false;
        }
        let waiting = self.by_dependency.entry(dependency).or_default();
        if waiting.iter().any(|e| e.candidate.hash == candidate.hash) {
            return false;
        }
        waiting.push(UncheckedEntry {
            candidate,
            registered_at: now,
        });
        self.count += 1;
        true
    }

    /// Remove and return every block waiting on `dependency`, oldest first.
    /// Empty if nothing waits on it, including on a second call.
    pub fn resolve(&mut self, dependency: &HashOrAccount) -> Vec<UncheckedEntry> {
        match self.by_dependency.remove(dependency) {
            Some(entries) => {
                self.count -= entries.len();
                entries
            }
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of distinct missing dependencies.
    pub fn dependency_count(&self) -> usize {
        self.by_dependency.len()
    }

    /// Remove entries registered at least `max_age` before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn clear_expired(&mut self, max_age: Duration, now: Instant) -> usize {
        let mut removed = 0;
        self.by_dependency.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| now.saturating_duration_since(e.registered_at) < max_age);
            removed += before - entries.len();
            !entries.is_empty()
        });
        self.count -= removed;
        removed
    }

    pub fn clear(&mut self) {
        self.by_dependency.clear();
        self.count = 0;
    }
}
