use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ItemId, LearnerId, SessionId};
use crate::model::item::ItemFilter;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle state of a practice session.
///
/// `Completed` and `Discarded` are terminal. A session that ends with zero
/// answered items is Discarded rather than Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    InProgress,
    Paused,
    Completed,
    Discarded,
}

impl SessionStatus {
    /// True for sessions that can still be resumed or mutated.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, SessionStatus::InProgress | SessionStatus::Paused)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session is already finalized as {status:?}")]
    Finalized { status: SessionStatus },

    #[error("cannot pause a session that is {status:?}")]
    NotInProgress { status: SessionStatus },

    #[error("item {item_id} was already answered in this session")]
    DuplicateCompletion { item_id: ItemId },
}

//
// ─── COUNTERS ──────────────────────────────────────────────────────────────────
//

/// Running totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub completed: u32,
    pub correct: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub points: f64,
    pub time_spent_secs: u32,
}

//
// ─── ANSWERED ITEM ─────────────────────────────────────────────────────────────
//

/// One resolved answer inside a session, kept in answer order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnsweredItem {
    pub item_id: ItemId,
    pub score: f64,
    pub point_value: f64,
}

impl AnsweredItem {
    /// Score as a percentage of the item's point value, in `[0, 100]`.
    #[must_use]
    pub fn score_percent(&self) -> f64 {
        if self.point_value > 0.0 {
            (self.score / self.point_value * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// How a `complete` call finalized the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Completed { average_percent: u32 },
    Discarded,
}

/// Per-learner practice session: status, counters, exclusion sets, and the
/// active filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    id: SessionId,
    learner_id: LearnerId,
    status: SessionStatus,
    counters: SessionCounters,
    answered: Vec<AnsweredItem>,
    skipped_item_ids: HashSet<ItemId>,
    filter: ItemFilter,
    started_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Opens a fresh session in `InProgress`.
    #[must_use]
    pub fn open(
        id: SessionId,
        learner_id: LearnerId,
        filter: ItemFilter,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            learner_id,
            status: SessionStatus::InProgress,
            counters: SessionCounters::default(),
            answered: Vec::new(),
            skipped_item_ids: HashSet::new(),
            filter,
            started_at: now,
            last_active_at: now,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    #[must_use]
    pub fn filter(&self) -> &ItemFilter {
        &self.filter
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn answered(&self) -> &[AnsweredItem] {
        &self.answered
    }

    /// True once at least one answer has resolved.
    #[must_use]
    pub fn has_answers(&self) -> bool {
        !self.answered.is_empty()
    }

    #[must_use]
    pub fn has_answered(&self, item_id: ItemId) -> bool {
        self.answered.iter().any(|a| a.item_id == item_id)
    }

    #[must_use]
    pub fn answered_item_ids(&self) -> HashSet<ItemId> {
        self.answered.iter().map(|a| a.item_id).collect()
    }

    #[must_use]
    pub fn skipped_item_ids(&self) -> &HashSet<ItemId> {
        &self.skipped_item_ids
    }

    /// Mean answer score of this session as a rounded percentage.
    #[must_use]
    pub fn average_percent(&self) -> u32 {
        if self.counters.completed == 0 {
            return 0;
        }
        let ratio = f64::from(self.counters.correct) / f64::from(self.counters.completed);
        (ratio * 100.0).round() as u32
    }

    fn ensure_open(&self) -> Result<(), SessionStateError> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(SessionStateError::Finalized {
                status: self.status,
            })
        }
    }

    /// Replaces the active filter.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` if the session is no longer open.
    pub fn set_filter(
        &mut self,
        filter: ItemFilter,
        now: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        self.filter = filter;
        self.last_active_at = now;
        Ok(())
    }

    /// Moves `InProgress` to `Paused`.
    ///
    /// # Errors
    ///
    /// Returns `NotInProgress` unless the session is currently in progress.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionStateError::NotInProgress {
                status: self.status,
            });
        }
        self.status = SessionStatus::Paused;
        self.last_active_at = now;
        Ok(())
    }

    /// Returns the session to `InProgress`. A session that already is in
    /// progress is just touched.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` if the session is no longer open.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        self.status = SessionStatus::InProgress;
        self.last_active_at = now;
        Ok(())
    }

    /// Refreshes the activity timestamp without any other change.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` if the session is no longer open.
    pub fn touch(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        self.last_active_at = now;
        Ok(())
    }

    /// Adds an item to the session skip set.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` if the session is no longer open.
    pub fn record_skip(
        &mut self,
        item_id: ItemId,
        now: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        self.skipped_item_ids.insert(item_id);
        self.last_active_at = now;
        Ok(())
    }

    /// Records one resolved answer and moves every counter.
    ///
    /// `correct` is the caller's canonical correctness decision; it drives the
    /// correct count and the streak. Points always accumulate the raw score.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` if the session is no longer open, or
    /// `DuplicateCompletion` if the item was already answered in this session.
    pub fn record_answer(
        &mut self,
        item_id: ItemId,
        score: f64,
        point_value: f64,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        if self.has_answered(item_id) {
            return Err(SessionStateError::DuplicateCompletion { item_id });
        }

        self.answered.push(AnsweredItem {
            item_id,
            score,
            point_value,
        });
        self.counters.completed += 1;
        if correct {
            self.counters.correct += 1;
            self.counters.streak += 1;
            self.counters.max_streak = self.counters.max_streak.max(self.counters.streak);
        } else {
            self.counters.streak = 0;
        }
        self.counters.points += score;
        self.status = SessionStatus::InProgress;
        self.last_active_at = now;
        Ok(())
    }

    /// Overwrites the tracked time-spent counter during a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` if the session is no longer open.
    pub fn set_time_spent(
        &mut self,
        secs: u32,
        now: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        self.counters.time_spent_secs = secs;
        self.last_active_at = now;
        Ok(())
    }

    /// Finalizes the session: `Completed` with its average when anything was
    /// answered, `Discarded` otherwise. Terminal either way.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` when called a second time.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<CompletionKind, SessionStateError> {
        self.ensure_open()?;
        self.last_active_at = now;
        if self.answered.is_empty() {
            self.status = SessionStatus::Discarded;
            return Ok(CompletionKind::Discarded);
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        Ok(CompletionKind::Completed {
            average_percent: self.average_percent(),
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn session() -> SessionState {
        SessionState::open(
            SessionId::new(1),
            LearnerId::new(7),
            ItemFilter::default(),
            fixed_now(),
        )
    }

    #[test]
    fn answer_moves_counters_and_streak() {
        let mut s = session();
        let now = fixed_now();

        s.record_answer(ItemId::new(1), 2.0, 2.0, true, now).unwrap();
        s.record_answer(ItemId::new(2), 1.5, 2.0, true, now).unwrap();
        s.record_answer(ItemId::new(3), 0.0, 2.0, false, now).unwrap();
        s.record_answer(ItemId::new(4), 2.0, 2.0, true, now).unwrap();

        let c = s.counters();
        assert_eq!(c.completed, 4);
        assert_eq!(c.correct, 3);
        assert_eq!(c.streak, 1);
        assert_eq!(c.max_streak, 2);
        assert!((c.points - 5.5).abs() < 1e-9);
        assert_eq!(s.average_percent(), 75);
    }

    #[test]
    fn duplicate_answer_is_rejected() {
        let mut s = session();
        let now = fixed_now();
        s.record_answer(ItemId::new(1), 1.0, 2.0, false, now).unwrap();

        let err = s
            .record_answer(ItemId::new(1), 2.0, 2.0, true, now)
            .unwrap_err();
        assert!(matches!(
            err,
            SessionStateError::DuplicateCompletion { item_id } if item_id == ItemId::new(1)
        ));
        assert_eq!(s.counters().completed, 1);
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let mut s = session();
        let now = fixed_now();

        s.pause(now).unwrap();
        assert_eq!(s.status(), SessionStatus::Paused);

        let err = s.pause(now).unwrap_err();
        assert!(matches!(err, SessionStateError::NotInProgress { .. }));

        s.resume(now + Duration::minutes(5)).unwrap();
        assert_eq!(s.status(), SessionStatus::InProgress);
        assert_eq!(s.last_active_at(), now + Duration::minutes(5));
    }

    #[test]
    fn empty_session_is_discarded_on_complete() {
        let mut s = session();
        let kind = s.complete(fixed_now()).unwrap();
        assert_eq!(kind, CompletionKind::Discarded);
        assert_eq!(s.status(), SessionStatus::Discarded);
        assert_eq!(s.completed_at(), None);
    }

    #[test]
    fn complete_is_terminal() {
        let mut s = session();
        let now = fixed_now();
        s.record_answer(ItemId::new(1), 2.0, 2.0, true, now).unwrap();

        let kind = s.complete(now).unwrap();
        assert_eq!(kind, CompletionKind::Completed { average_percent: 100 });
        assert_eq!(s.completed_at(), Some(now));

        assert!(matches!(
            s.complete(now),
            Err(SessionStateError::Finalized {
                status: SessionStatus::Completed
            })
        ));
        assert!(matches!(
            s.record_answer(ItemId::new(2), 1.0, 2.0, true, now),
            Err(SessionStateError::Finalized { .. })
        ));
    }

    #[test]
    fn skip_set_accumulates() {
        let mut s = session();
        let now = fixed_now();
        s.record_skip(ItemId::new(9), now).unwrap();
        s.record_skip(ItemId::new(9), now).unwrap();
        s.record_skip(ItemId::new(10), now).unwrap();
        assert_eq!(s.skipped_item_ids().len(), 2);
    }

    #[test]
    fn score_percent_is_clamped() {
        let a = AnsweredItem {
            item_id: ItemId::new(1),
            score: 3.0,
            point_value: 2.0,
        };
        assert_eq!(a.score_percent(), 100.0);

        let zero_max = AnsweredItem {
            item_id: ItemId::new(1),
            score: 1.0,
            point_value: 0.0,
        };
        assert_eq!(zero_max.score_percent(), 0.0);
    }
}
