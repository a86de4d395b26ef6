use std::collections::VecDeque;

use crate::snapshot::Snapshot;
use crate::surface::Surface;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Bounded undo stack of raster snapshots, oldest first.
///
/// Pushing past the limit evicts the oldest entry; undo pops the newest.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Snapshot>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    /// `limit` is clamped to `1..=DEFAULT_HISTORY_LIMIT`.
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, DEFAULT_HISTORY_LIMIT);
        Self {
            entries: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    /// Encodes the surface as it is now and pushes it.
    /// Returns false if the surface could not be encoded.
    pub fn snapshot_before_change(&mut self, surface: &Surface) -> bool {
        match surface.encode() {
            Ok(snapshot) => {
                self.push(snapshot);
                true
            }
            Err(err) => {
                log::error!("Failed to snapshot surface for undo: {err}");
                false
            }
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Pops the most recent snapshot. An empty stack is not an error.
    pub fn undo(&mut self) -> Option<Snapshot> {
        self.entries.pop_back()
    }

    /// Replaces the stack, keeping only the newest `limit` entries.
    pub fn restore(&mut self, entries: Vec<Snapshot>) {
        let skip = entries.len().saturating_sub(self.limit);
        self.entries = entries.into_iter().skip(skip).collect();
    }

    pub fn entries(&self) -> Vec<Snapshot> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }
}
