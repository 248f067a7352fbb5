use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::world::coords::TilePos;

/// Suppresses repeated edits to the same tile within a short window.
pub(crate) struct EditCooldown {
    window: Duration,
    entries: HashMap<TilePos, Instant>,
}

impl EditCooldown {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Records an edit at `pos` unless one was recorded less than a window ago.
    pub(crate) fn try_acquire(&mut self, pos: TilePos, now: Instant) -> bool {
        match self.entries.get(&pos) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                self.entries.insert(pos, now);
                true
            }
        }
    }

    /// Drops expired entries. Linear in the number of entries, never in world size.
    pub(crate) fn expire(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let window = self.window;
        self.entries
            .retain(|_, last| now.saturating_duration_since(*last) < window);
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
