//! Review scheduling over the pure planning step.

use std::sync::Arc;

use practice_core::Clock;
use practice_core::model::{ItemId, LearnerId, ReviewSchedule};
use practice_core::scheduler::{ReviewInput, plan_review};
use storage::repository::ScheduleRepository;
use tracing::{instrument, warn};

use crate::error::ReviewServiceError;

/// Aggregate numbers over a learner's review schedules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepetitionStats {
    pub total_items: usize,
    pub average_ease: f64,
    pub average_repetitions: f64,
    pub due_today: usize,
    pub mastered: usize,
}

/// Maintains the per-(learner, item) spaced repetition schedules.
pub struct ReviewService {
    clock: Clock,
    schedules: Arc<dyn ScheduleRepository>,
}

impl ReviewService {
    #[must_use]
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self {
            clock: Clock::default(),
            schedules,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Folds a scored attempt into the pair's schedule.
    ///
    /// A pair without a schedule starts from the default interval and ease;
    /// afterwards each attempt advances the stored state by one planning
    /// step and bumps the repetition count.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` when the schedule cannot be
    /// read or written.
    #[instrument(skip(self), fields(learner_id = %learner_id, item_id = %item_id))]
    pub async fn record_score(
        &self,
        learner_id: LearnerId,
        item_id: ItemId,
        score_percent: f64,
    ) -> Result<ReviewSchedule, ReviewServiceError> {
        let now = self.clock.now();
        let existing = self.schedules.find_schedule(learner_id, item_id).await?;
        let input = match &existing {
            Some(schedule) => ReviewInput::from_schedule(score_percent, schedule),
            None => ReviewInput::first_attempt(score_percent),
        };

        let plan = plan_review(input);
        if plan.sanitized {
            warn!(
                score = score_percent,
                "review input was out of range and got clamped"
            );
        }

        let schedule = ReviewSchedule {
            learner_id,
            item_id,
            interval_days: plan.interval_days,
            ease_factor: plan.ease_factor,
            repetition_count: existing.as_ref().map_or(1, |s| s.repetition_count + 1),
            next_review_at: plan.next_review_at(now),
        };
        self.schedules.upsert_schedule(&schedule).await?;
        Ok(schedule)
    }

    /// Schedules currently due, soonest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` when the listing fails.
    pub async fn due_for_review(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<ReviewSchedule>, ReviewServiceError> {
        let now = self.clock.now();
        let mut due: Vec<ReviewSchedule> = self
            .schedules
            .schedules_for_learner(learner_id)
            .await?
            .into_iter()
            .filter(|s| s.is_due(now))
            .collect();
        due.sort_by_key(|s| s.next_review_at);
        Ok(due)
    }

    /// Aggregates a learner's schedules for the progress screens.
    ///
    /// With no schedules yet, the averages fall back to the scheduling
    /// defaults rather than zero.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` when the listing fails.
    pub async fn repetition_stats(
        &self,
        learner_id: LearnerId,
    ) -> Result<RepetitionStats, ReviewServiceError> {
        let schedules = self.schedules.schedules_for_learner(learner_id).await?;
        if schedules.is_empty() {
            return Ok(RepetitionStats {
                total_items: 0,
                average_ease: ReviewSchedule::DEFAULT_EASE,
                average_repetitions: 0.0,
                due_today: 0,
                mastered: 0,
            });
        }

        let now = self.clock.now();
        let total = schedules.len();
        let ease_sum: f64 = schedules.iter().map(|s| s.ease_factor).sum();
        let reps_sum: f64 = schedules.iter().map(|s| f64::from(s.repetition_count)).sum();

        Ok(RepetitionStats {
            total_items: total,
            average_ease: ease_sum / total as f64,
            average_repetitions: reps_sum / total as f64,
            due_today: schedules.iter().filter(|s| s.is_due(now)).count(),
            mastered: schedules.iter().filter(|s| s.is_mastered()).count(),
        })
    }
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use practice_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryStore;

    use super::*;

    fn service(store: &InMemoryStore) -> ReviewService {
        ReviewService::new(Arc::new(store.clone())).with_clock(fixed_clock())
    }

    #[tokio::test]
    async fn first_attempt_starts_from_defaults() {
        let store = InMemoryStore::new();
        let service = service(&store);

        let schedule = service
            .record_score(LearnerId::new(1), ItemId::new(1), 100.0)
            .await
            .unwrap();

        assert_eq!(schedule.interval_days, 1);
        assert_eq!(schedule.ease_factor, 2.5);
        assert_eq!(schedule.repetition_count, 1);
        assert_eq!(schedule.next_review_at, fixed_now() + Duration::days(1));
    }

    #[tokio::test]
    async fn failed_review_resets_the_interval_and_drops_ease() {
        let store = InMemoryStore::new();
        let learner = LearnerId::new(1);
        let item = ItemId::new(1);
        store
            .upsert_schedule(&ReviewSchedule {
                learner_id: learner,
                item_id: item,
                interval_days: 10,
                ease_factor: 2.0,
                repetition_count: 4,
                next_review_at: fixed_now(),
            })
            .await
            .unwrap();

        let schedule = service(&store)
            .record_score(learner, item, 40.0)
            .await
            .unwrap();

        assert_eq!(schedule.interval_days, 1);
        assert!((schedule.ease_factor - 1.8).abs() < 1e-9);
        assert_eq!(schedule.repetition_count, 5);
    }

    #[tokio::test]
    async fn passed_review_grows_the_interval() {
        let store = InMemoryStore::new();
        let learner = LearnerId::new(1);
        let item = ItemId::new(1);
        store
            .upsert_schedule(&ReviewSchedule {
                learner_id: learner,
                item_id: item,
                interval_days: 6,
                ease_factor: 2.5,
                repetition_count: 2,
                next_review_at: fixed_now(),
            })
            .await
            .unwrap();

        let schedule = service(&store)
            .record_score(learner, item, 100.0)
            .await
            .unwrap();

        assert_eq!(schedule.interval_days, 15);
        assert_eq!(schedule.repetition_count, 3);
        assert_eq!(schedule.next_review_at, fixed_now() + Duration::days(15));
    }

    #[tokio::test]
    async fn out_of_range_stored_state_is_clamped_not_rejected() {
        let store = InMemoryStore::new();
        let learner = LearnerId::new(1);
        let item = ItemId::new(1);
        store
            .upsert_schedule(&ReviewSchedule {
                learner_id: learner,
                item_id: item,
                interval_days: 10,
                ease_factor: 9.0,
                repetition_count: 1,
                next_review_at: fixed_now(),
            })
            .await
            .unwrap();

        let schedule = service(&store)
            .record_score(learner, item, 100.0)
            .await
            .unwrap();

        assert!(schedule.ease_factor <= ReviewSchedule::MAX_EASE);
        assert_eq!(schedule.interval_days, 25);
    }

    #[tokio::test]
    async fn stats_fall_back_to_defaults_when_empty() {
        let store = InMemoryStore::new();
        let stats = service(&store)
            .repetition_stats(LearnerId::new(1))
            .await
            .unwrap();

        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.average_ease, ReviewSchedule::DEFAULT_EASE);
        assert_eq!(stats.average_repetitions, 0.0);
    }

    #[tokio::test]
    async fn stats_count_due_and_mastered_schedules() {
        let store = InMemoryStore::new();
        let learner = LearnerId::new(1);
        store
            .upsert_schedule(&ReviewSchedule {
                learner_id: learner,
                item_id: ItemId::new(1),
                interval_days: 30,
                ease_factor: 2.5,
                repetition_count: 6,
                next_review_at: fixed_now() + Duration::days(30),
            })
            .await
            .unwrap();
        store
            .upsert_schedule(&ReviewSchedule {
                learner_id: learner,
                item_id: ItemId::new(2),
                interval_days: 1,
                ease_factor: 1.3,
                repetition_count: 2,
                next_review_at: fixed_now() - Duration::days(1),
            })
            .await
            .unwrap();

        let stats = service(&store).repetition_stats(learner).await.unwrap();

        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.due_today, 1);
        assert_eq!(stats.mastered, 1);
        assert!((stats.average_ease - 1.9).abs() < 1e-9);
        assert_eq!(stats.average_repetitions, 4.0);

        let due = service(&store).due_for_review(learner).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].item_id, ItemId::new(2));
    }
}
