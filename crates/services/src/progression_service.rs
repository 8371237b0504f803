//! Tier progression on top of the pure unlock rules.

use std::sync::Arc;

use practice_core::Clock;
use practice_core::model::{DifficultyTier, LearnerId};
use practice_core::progression::{self, ProgressionReport, TierUnlock, UnlockThresholds};
use storage::repository::ProfileRepository;
use tracing::{info, instrument};

use crate::error::ProgressionServiceError;
use crate::events::{DomainEvent, EventSink};

/// Applies earned scores to a learner's tier points and announces unlocks.
pub struct ProgressionService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    thresholds: UnlockThresholds,
    events: Arc<dyn EventSink>,
}

impl ProgressionService {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileRepository>, events: Arc<dyn EventSink>) -> Self {
        Self {
            clock: Clock::default(),
            profiles,
            thresholds: UnlockThresholds::default(),
            events,
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: UnlockThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Credits one attempt's earned score at the given tier and persists the
    /// profile. Emits `TierUnlocked` when the score pushed the learner over
    /// a threshold.
    ///
    /// Zero, negative, and non-finite scores are ignored without touching
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionServiceError::Storage` when the profile cannot be
    /// read or written.
    #[instrument(skip(self), fields(learner_id = %learner_id, tier = tier.value()))]
    pub async fn record_earned_score(
        &self,
        learner_id: LearnerId,
        tier: DifficultyTier,
        score: f64,
    ) -> Result<Option<TierUnlock>, ProgressionServiceError> {
        if !score.is_finite() || score <= 0.0 {
            return Ok(None);
        }

        let mut profile = self.profiles.get_or_create_profile(learner_id).await?;
        let unlock = progression::apply_score(&mut profile, tier, score, &self.thresholds);
        self.profiles.upsert_profile(&profile).await?;

        if let Some(unlock) = unlock {
            info!(unlocked = unlock.unlocked.value(), "tier unlocked");
            self.events
                .publish(DomainEvent::TierUnlocked {
                    learner_id,
                    tier: unlock.unlocked,
                    at: self.clock.now(),
                })
                .await;
        }
        Ok(unlock)
    }

    /// Read-only progression view for the learner.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionServiceError::Storage` when the profile cannot be
    /// read.
    pub async fn progression_report(
        &self,
        learner_id: LearnerId,
    ) -> Result<ProgressionReport, ProgressionServiceError> {
        let profile = self.profiles.get_or_create_profile(learner_id).await?;
        Ok(progression::report(&profile, &self.thresholds))
    }
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use practice_core::time::fixed_clock;
    use storage::repository::InMemoryStore;

    use crate::events::RecordingSink;

    use super::*;

    fn tier(level: u8) -> DifficultyTier {
        DifficultyTier::new(level).unwrap()
    }

    fn service(store: &InMemoryStore, sink: &RecordingSink) -> ProgressionService {
        ProgressionService::new(Arc::new(store.clone()), Arc::new(sink.clone()))
            .with_clock(fixed_clock())
    }

    #[tokio::test]
    async fn crossing_the_threshold_unlocks_once_and_emits_one_event() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::new();
        let service = service(&store, &sink);
        let learner = LearnerId::new(1);

        let first = service
            .record_earned_score(learner, tier(1), 60.0)
            .await
            .unwrap();
        assert_eq!(first, None);

        let unlock = service
            .record_earned_score(learner, tier(2), 40.0)
            .await
            .unwrap();
        assert_eq!(unlock.map(|u| u.unlocked), Some(tier(3)));

        // more low-tier points change nothing after the unlock
        let again = service
            .record_earned_score(learner, tier(1), 500.0)
            .await
            .unwrap();
        assert_eq!(again, None);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            DomainEvent::TierUnlocked { learner_id, tier: t, .. }
                if learner_id == learner && t == tier(3)
        ));
    }

    #[tokio::test]
    async fn non_positive_scores_never_touch_the_profile() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::new();
        let service = service(&store, &sink);
        let learner = LearnerId::new(7);

        service
            .record_earned_score(learner, tier(1), 0.0)
            .await
            .unwrap();
        service
            .record_earned_score(learner, tier(1), -2.5)
            .await
            .unwrap();
        service
            .record_earned_score(learner, tier(1), f64::NAN)
            .await
            .unwrap();

        let report = service.progression_report(learner).await.unwrap();
        assert_eq!(report.points_by_tier, [0.0; 5]);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn report_shows_progress_toward_the_next_tier() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::new();
        let service = service(&store, &sink);
        let learner = LearnerId::new(2);

        service
            .record_earned_score(learner, tier(1), 25.0)
            .await
            .unwrap();

        let report = service.progression_report(learner).await.unwrap();
        assert_eq!(report.unlocked_tier, tier(2));
        let next = report.progress_to_next.unwrap();
        assert_eq!(next.next_tier, tier(3));
        assert_eq!(next.current_points, 25.0);
        assert_eq!(next.required_points, 100.0);
        assert_eq!(next.percentage, 25);
    }

    #[tokio::test]
    async fn custom_thresholds_gate_the_unlock() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::new();
        let service = service(&store, &sink)
            .with_thresholds(UnlockThresholds::new(10.0, 20.0, 30.0).unwrap());
        let learner = LearnerId::new(3);

        let unlock = service
            .record_earned_score(learner, tier(2), 10.0)
            .await
            .unwrap();
        assert_eq!(unlock.map(|u| u.unlocked), Some(tier(3)));
    }
}
