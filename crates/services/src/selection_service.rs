//! Three-pass exercise selection.
//!
//! The first pass serves material the learner has never seen: it applies
//! the session's full filters and excludes everything attempted, viewed,
//! answered, skipped or recently served, then picks at random from a small
//! candidate pool. When nothing fresh is left the passes relax in order,
//! first to filter-matching items not yet completed in this session, then
//! to anything matching the kind/category constraints at all. Only a store
//! with zero base-filter matches is reported as exhausted.

use std::collections::HashSet;
use std::sync::Arc;

use practice_core::Clock;
use practice_core::model::{ExposureMarker, ItemId, PracticeItem, SessionState};
use rand::seq::IndexedRandom;
use storage::repository::{AttemptRepository, ItemRepository, MarkerRepository};
use tracing::{debug, instrument};

use crate::cache::RecencyCache;
use crate::error::SelectionError;

/// Cap on how many fresh candidates the randomized pass draws from.
pub const FRESH_CANDIDATE_POOL: usize = 20;

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The next exercise to present.
    Item(PracticeItem),
    /// Nothing in the store matches even the relaxed kind/category filters.
    Exhausted,
}

/// Picks the next exercise for a session.
pub struct SelectionService {
    clock: Clock,
    items: Arc<dyn ItemRepository>,
    attempts: Arc<dyn AttemptRepository>,
    markers: Arc<dyn MarkerRepository>,
    cache: Arc<RecencyCache>,
    randomize: bool,
}

impl SelectionService {
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemRepository>,
        attempts: Arc<dyn AttemptRepository>,
        markers: Arc<dyn MarkerRepository>,
        cache: Arc<RecencyCache>,
    ) -> Self {
        Self {
            clock: Clock::default(),
            items,
            attempts,
            markers,
            cache,
            randomize: true,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Disables the random draw of the fresh pass so tests get the lowest
    /// item ID instead.
    #[must_use]
    pub fn with_randomized_pick(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Selects the next item for `session` and records the exposure.
    ///
    /// A successful pick leaves a viewed marker for the (learner, item,
    /// session) triple and a recency hint, so repeated calls walk through
    /// fresh material instead of looping on one item.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Storage` when the underlying repositories
    /// fail.
    #[instrument(skip(self, session), fields(session_id = %session.id(), learner_id = %session.learner_id()))]
    pub async fn select_next(&self, session: &SessionState) -> Result<Selection, SelectionError> {
        let all = self.items.list_items().await?;
        if !all.iter().any(|item| session.filter().matches_base(item)) {
            return Ok(Selection::Exhausted);
        }

        let answered = session.answered_item_ids();
        let picked = if let Some(item) = self.fresh_pick(session, &all, &answered).await? {
            debug!(item_id = %item.id(), "serving fresh material");
            item
        } else if let Some(item) = Self::unfinished_pick(session, &all, &answered) {
            debug!(item_id = %item.id(), "fresh pool empty, serving an unfinished match");
            item
        } else {
            // Relaxed pass: anything matching kind/category, repeats included.
            // Non-empty by the exhaustion check above.
            let Some(item) = all
                .iter()
                .find(|item| session.filter().matches_base(item))
                .cloned()
            else {
                return Ok(Selection::Exhausted);
            };
            debug!(item_id = %item.id(), "serving a relaxed match");
            item
        };

        self.note_served(session, &picked).await?;
        Ok(Selection::Item(picked))
    }

    /// How many filter-matching items the session can still serve, not
    /// counting what it already answered or skipped.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Storage` when the listing fails.
    pub async fn count_available(&self, session: &SessionState) -> Result<usize, SelectionError> {
        let all = self.items.list_items().await?;
        let answered = session.answered_item_ids();
        let skipped = session.skipped_item_ids();
        Ok(all
            .iter()
            .filter(|item| session.filter().matches(item))
            .filter(|item| {
                let id = item.id();
                !answered.contains(&id) && !skipped.contains(&id)
            })
            .count())
    }

    async fn fresh_pick(
        &self,
        session: &SessionState,
        all: &[PracticeItem],
        answered: &HashSet<ItemId>,
    ) -> Result<Option<PracticeItem>, SelectionError> {
        let learner_id = session.learner_id();
        let attempted = self.attempts.attempted_item_ids(learner_id).await?;
        let viewed: HashSet<ItemId> = self
            .markers
            .markers_for_learner(learner_id)
            .await?
            .into_iter()
            .map(|marker| marker.item_id)
            .collect();
        let recent = self.cache.recent_for(learner_id);
        let skipped = session.skipped_item_ids();

        let candidates: Vec<&PracticeItem> = all
            .iter()
            .filter(|item| session.filter().matches(item))
            .filter(|item| {
                let id = item.id();
                !attempted.contains(&id)
                    && !viewed.contains(&id)
                    && !answered.contains(&id)
                    && !skipped.contains(&id)
                    && !recent.contains(&id)
            })
            .take(FRESH_CANDIDATE_POOL)
            .collect();

        let chosen = if self.randomize {
            candidates.choose(&mut rand::rng()).copied()
        } else {
            candidates.first().copied()
        };
        Ok(chosen.cloned())
    }

    fn unfinished_pick(
        session: &SessionState,
        all: &[PracticeItem],
        answered: &HashSet<ItemId>,
    ) -> Option<PracticeItem> {
        all.iter()
            .find(|item| session.filter().matches(item) && !answered.contains(&item.id()))
            .cloned()
    }

    async fn note_served(
        &self,
        session: &SessionState,
        item: &PracticeItem,
    ) -> Result<(), SelectionError> {
        let learner_id = session.learner_id();
        let existing = self
            .markers
            .find_marker(learner_id, item.id(), session.id())
            .await?;
        if existing.is_none() {
            let marker =
                ExposureMarker::viewed(learner_id, item.id(), session.id(), self.clock.now());
            self.markers.upsert_marker(&marker).await?;
        }
        self.cache.note_served(learner_id, item.id());
        Ok(())
    }
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//
