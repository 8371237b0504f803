use async_trait::async_trait;
use chrono::NaiveDate;
use practice_core::model::{
    AttemptRecord, DailyProgress, ExposureMarker, ItemId, LearnerId, LearnerProfile,
    PracticeItem, ReviewSchedule, SessionId, SessionState,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for practice items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Persist or update an item.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item cannot be stored.
    async fn upsert_item(&self, item: &PracticeItem) -> Result<(), StorageError>;

    /// Fetch an item by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_item(&self, id: ItemId) -> Result<PracticeItem, StorageError>;

    /// All items, ordered by ID so callers see a stable scan order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn list_items(&self) -> Result<Vec<PracticeItem>, StorageError>;
}

/// Repository contract for attempt records.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<(), StorageError>;

    /// Every attempt a learner has made, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn attempts_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<AttemptRecord>, StorageError>;

    /// The distinct item IDs a learner has ever attempted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn attempted_item_ids(
        &self,
        learner_id: LearnerId,
    ) -> Result<HashSet<ItemId>, StorageError>;
}

/// Repository contract for review schedules, keyed by (learner, item).
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Persist or update the schedule for a pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the schedule cannot be stored.
    async fn upsert_schedule(&self, schedule: &ReviewSchedule) -> Result<(), StorageError>;

    /// Fetch the schedule for a pair, if it exists yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_schedule(
        &self,
        learner_id: LearnerId,
        item_id: ItemId,
    ) -> Result<Option<ReviewSchedule>, StorageError>;

    /// Every schedule a learner has.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn schedules_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<ReviewSchedule>, StorageError>;
}

/// Repository contract for session state.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist or update a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn upsert_session(&self, session: &SessionState) -> Result<(), StorageError>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<SessionState, StorageError>;

    /// The learner's most recently active open (in-progress or paused)
    /// session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_open_session(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<SessionState>, StorageError>;

    /// Every session of a learner, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn sessions_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<SessionState>, StorageError>;
}

/// Repository contract for learner profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Persist or update a profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError>;

    /// Fetch a learner's profile, creating the default one on first access.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup or creation fails.
    async fn get_or_create_profile(
        &self,
        learner_id: LearnerId,
    ) -> Result<LearnerProfile, StorageError>;
}

/// Repository contract for exposure markers, keyed by (learner, item,
/// session).
#[async_trait]
pub trait MarkerRepository: Send + Sync {
    /// Persist or update a marker.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the marker cannot be stored.
    async fn upsert_marker(&self, marker: &ExposureMarker) -> Result<(), StorageError>;

    /// Fetch one marker, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_marker(
        &self,
        learner_id: LearnerId,
        item_id: ItemId,
        session_id: SessionId,
    ) -> Result<Option<ExposureMarker>, StorageError>;

    /// Every marker a learner has, across all sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn markers_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<ExposureMarker>, StorageError>;

    /// Deletes every marker belonging to one session. Used when a session is
    /// discarded as if it never existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the purge fails.
    async fn purge_session_markers(&self, session_id: SessionId) -> Result<(), StorageError>;
}

/// Repository contract for per-day progress buckets.
#[async_trait]
pub trait DailyProgressRepository: Send + Sync {
    /// Persist or update a day bucket.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bucket cannot be stored.
    async fn upsert_daily(&self, progress: &DailyProgress) -> Result<(), StorageError>;

    /// Fetch the bucket for one day, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_daily(
        &self,
        learner_id: LearnerId,
        day: NaiveDate,
    ) -> Result<Option<DailyProgress>, StorageError>;

    /// Every bucket of a learner, ordered by day.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn daily_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<DailyProgress>, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Simple in-memory store implementation for testing and embedding.
///
/// Clones share the same underlying maps.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    items: Arc<Mutex<HashMap<ItemId, PracticeItem>>>,
    attempts: Arc<Mutex<Vec<AttemptRecord>>>,
    schedules: Arc<Mutex<HashMap<(LearnerId, ItemId), ReviewSchedule>>>,
    sessions: Arc<Mutex<HashMap<SessionId, SessionState>>>,
    profiles: Arc<Mutex<HashMap<LearnerId, LearnerProfile>>>,
    markers: Arc<Mutex<HashMap<(LearnerId, ItemId, SessionId), ExposureMarker>>>,
    daily: Arc<Mutex<HashMap<(LearnerId, NaiveDate), DailyProgress>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<'a, T>(
    mutex: &'a Mutex<T>,
) -> Result<std::sync::MutexGuard<'a, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn upsert_item(&self, item: &PracticeItem) -> Result<(), StorageError> {
        let mut guard = lock(&self.items)?;
        guard.insert(item.id(), item.clone());
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<PracticeItem, StorageError> {
        let guard = lock(&self.items)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_items(&self) -> Result<Vec<PracticeItem>, StorageError> {
        let guard = lock(&self.items)?;
        let mut items: Vec<PracticeItem> = guard.values().cloned().collect();
        items.sort_by_key(PracticeItem::id);
        Ok(items)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryStore {
    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<(), StorageError> {
        let mut guard = lock(&self.attempts)?;
        guard.push(attempt.clone());
        Ok(())
    }

    async fn attempts_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let guard = lock(&self.attempts)?;
        Ok(guard
            .iter()
            .filter(|a| a.learner_id == learner_id)
            .cloned()
            .collect())
    }

    async fn attempted_item_ids(
        &self,
        learner_id: LearnerId,
    ) -> Result<HashSet<ItemId>, StorageError> {
        let guard = lock(&self.attempts)?;
        Ok(guard
            .iter()
            .filter(|a| a.learner_id == learner_id)
            .map(|a| a.item_id)
            .collect())
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn upsert_schedule(&self, schedule: &ReviewSchedule) -> Result<(), StorageError> {
        let mut guard = lock(&self.schedules)?;
        guard.insert(
            (schedule.learner_id, schedule.item_id),
            schedule.clone(),
        );
        Ok(())
    }

    async fn find_schedule(
        &self,
        learner_id: LearnerId,
        item_id: ItemId,
    ) -> Result<Option<ReviewSchedule>, StorageError> {
        let guard = lock(&self.schedules)?;
        Ok(guard.get(&(learner_id, item_id)).cloned())
    }

    async fn schedules_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<ReviewSchedule>, StorageError> {
        let guard = lock(&self.schedules)?;
        let mut schedules: Vec<ReviewSchedule> = guard
            .values()
            .filter(|s| s.learner_id == learner_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.item_id);
        Ok(schedules)
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn upsert_session(&self, session: &SessionState) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionState, StorageError> {
        let guard = lock(&self.sessions)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_open_session(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<SessionState>, StorageError> {
        let guard = lock(&self.sessions)?;
        Ok(guard
            .values()
            .filter(|s| s.learner_id() == learner_id && s.status().is_open())
            .max_by_key(|s| s.last_active_at())
            .cloned())
    }

    async fn sessions_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<SessionState>, StorageError> {
        let guard = lock(&self.sessions)?;
        Ok(guard
            .values()
            .filter(|s| s.learner_id() == learner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn upsert_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError> {
        let mut guard = lock(&self.profiles)?;
        guard.insert(profile.learner_id(), profile.clone());
        Ok(())
    }

    async fn get_or_create_profile(
        &self,
        learner_id: LearnerId,
    ) -> Result<LearnerProfile, StorageError> {
        let mut guard = lock(&self.profiles)?;
        Ok(guard
            .entry(learner_id)
            .or_insert_with(|| LearnerProfile::new(learner_id))
            .clone())
    }
}

#[async_trait]
impl MarkerRepository for InMemoryStore {
    async fn upsert_marker(&self, marker: &ExposureMarker) -> Result<(), StorageError> {
        let mut guard = lock(&self.markers)?;
        guard.insert(
            (marker.learner_id, marker.item_id, marker.session_id),
            marker.clone(),
        );
        Ok(())
    }

    async fn find_marker(
        &self,
        learner_id: LearnerId,
        item_id: ItemId,
        session_id: SessionId,
    ) -> Result<Option<ExposureMarker>, StorageError> {
        let guard = lock(&self.markers)?;
        Ok(guard.get(&(learner_id, item_id, session_id)).cloned())
    }

    async fn markers_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<ExposureMarker>, StorageError> {
        let guard = lock(&self.markers)?;
        Ok(guard
            .values()
            .filter(|m| m.learner_id == learner_id)
            .cloned()
            .collect())
    }

    async fn purge_session_markers(&self, session_id: SessionId) -> Result<(), StorageError> {
        let mut guard = lock(&self.markers)?;
        guard.retain(|_, m| m.session_id != session_id);
        Ok(())
    }
}

#[async_trait]
impl DailyProgressRepository for InMemoryStore {
    async fn upsert_daily(&self, progress: &DailyProgress) -> Result<(), StorageError> {
        let mut guard = lock(&self.daily)?;
        guard.insert((progress.learner_id, progress.day), progress.clone());
        Ok(())
    }

    async fn find_daily(
        &self,
        learner_id: LearnerId,
        day: NaiveDate,
    ) -> Result<Option<DailyProgress>, StorageError> {
        let guard = lock(&self.daily)?;
        Ok(guard.get(&(learner_id, day)).cloned())
    }

    async fn daily_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<DailyProgress>, StorageError> {
        let guard = lock(&self.daily)?;
        let mut buckets: Vec<DailyProgress> = guard
            .values()
            .filter(|d| d.learner_id == learner_id)
            .cloned()
            .collect();
        buckets.sort_by_key(|d| d.day);
        Ok(buckets)
    }
}

//
// ─── STORE AGGREGATE ───────────────────────────────────────────────────────────
//

/// Aggregates every repository behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Store {
    pub items: Arc<dyn ItemRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub markers: Arc<dyn MarkerRepository>,
    pub daily: Arc<dyn DailyProgressRepository>,
}

impl Store {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::backed_by(InMemoryStore::new())
    }

    /// Wraps one shared in-memory backend. Callers that keep a clone of
    /// `repo` can seed and inspect the same data the store serves.
    #[must_use]
    pub fn backed_by(repo: InMemoryStore) -> Self {
        Self {
            items: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            schedules: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            markers: Arc::new(repo.clone()),
            daily: Arc::new(repo),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
