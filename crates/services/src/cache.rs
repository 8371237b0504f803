//! Per-learner recency cache used by exercise selection.
//!
//! The cache remembers which items were served to a learner recently so the
//! selector can avoid handing the same exercise back twice in a row. It is
//! advisory and purely in memory: losing it on restart only widens the
//! candidate pool for a while, it never corrupts session state. Skip and
//! completion sets are not mirrored here; those live on the session record.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use practice_core::model::{ItemId, LearnerId};

/// How many recently served items are remembered per learner.
pub const RECENCY_WINDOW: usize = 20;

/// Default bound on how many learners the cache tracks at once.
pub const DEFAULT_LEARNER_CAPACITY: usize = 1024;

#[derive(Debug)]
struct LearnerWindow {
    recent: VecDeque<ItemId>,
    last_touch: u64,
}

/// Bounded in-memory map of recently served items per learner.
///
/// Both dimensions are capped: each learner keeps at most
/// [`RECENCY_WINDOW`] item ids, and when the learner count exceeds the
/// configured capacity the least recently touched learner is evicted.
#[derive(Debug)]
pub struct RecencyCache {
    inner: Mutex<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    windows: HashMap<LearnerId, LearnerWindow>,
    capacity: usize,
    window: usize,
    tick: u64,
}

impl RecencyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LEARNER_CAPACITY)
    }

    /// Cache bounded to `capacity` learners. A capacity of zero is treated
    /// as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                windows: HashMap::new(),
                capacity: capacity.max(1),
                window: RECENCY_WINDOW,
                tick: 0,
            }),
        }
    }

    /// Overrides the per-learner window size. Mainly for tests.
    #[must_use]
    pub fn with_window(self, window: usize) -> Self {
        {
            let mut inner = self.lock();
            inner.window = window.max(1);
        }
        self
    }

    /// Records that `item_id` was just served to `learner_id`.
    pub fn note_served(&self, learner_id: LearnerId, item_id: ItemId) {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;
        let window = inner.window;

        let entry = inner
            .windows
            .entry(learner_id)
            .or_insert_with(|| LearnerWindow {
                recent: VecDeque::new(),
                last_touch: tick,
            });
        entry.last_touch = tick;
        entry.recent.retain(|id| *id != item_id);
        entry.recent.push_back(item_id);
        while entry.recent.len() > window {
            entry.recent.pop_front();
        }

        if inner.windows.len() > inner.capacity {
            inner.evict_least_recent();
        }
    }

    /// Items served to `learner_id` within the recency window.
    #[must_use]
    pub fn recent_for(&self, learner_id: LearnerId) -> HashSet<ItemId> {
        let inner = self.lock();
        inner
            .windows
            .get(&learner_id)
            .map(|w| w.recent.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drops all hints for a learner, e.g. when a session ends.
    pub fn forget(&self, learner_id: LearnerId) {
        let mut inner = self.lock();
        inner.windows.remove(&learner_id);
    }

    #[must_use]
    pub fn learner_count(&self) -> usize {
        self.lock().windows.len()
    }

    // A poisoned lock only loses selection hints, so recover the guard
    // instead of failing the caller.
    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RecencyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInner {
    fn evict_least_recent(&mut self) {
        let oldest = self
            .windows
            .iter()
            .min_by_key(|(_, w)| w.last_touch)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            self.windows.remove(&id);
        }
    }
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//
