use serde::{Deserialize, Serialize};

use crate::model::ids::LearnerId;
use crate::model::item::DifficultyTier;

/// Lifetime aggregates and tier progression for one learner.
///
/// The unlocked tier only ever rises. Per-tier points feed the unlock rules in
/// `crate::progression`; the remaining fields are the lifetime roll-up that a
/// completed session folds into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    learner_id: LearnerId,
    unlocked_tier: DifficultyTier,
    points_by_tier: [f64; 5],
    total_points: f64,
    completed_exercises: u64,
    average_score: u32,
    study_streak: u32,
    level: u32,
}

impl LearnerProfile {
    /// Sessions must answer at least this many items to extend the study
    /// streak.
    pub const STREAK_MIN_COMPLETED: u32 = 5;
    /// Minimum session average (percent) to extend the study streak.
    pub const STREAK_MIN_AVERAGE: u32 = 50;
    /// Points per learner level.
    pub const POINTS_PER_LEVEL: f64 = 1000.0;

    /// A fresh profile: tiers 1 and 2 unlocked, everything else at zero.
    #[must_use]
    pub fn new(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            unlocked_tier: DifficultyTier::new(2).unwrap_or(DifficultyTier::MIN),
            points_by_tier: [0.0; 5],
            total_points: 0.0,
            completed_exercises: 0,
            average_score: 0,
            study_streak: 0,
            level: 1,
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn unlocked_tier(&self) -> DifficultyTier {
        self.unlocked_tier
    }

    #[must_use]
    pub fn points_for(&self, tier: DifficultyTier) -> f64 {
        self.points_by_tier[usize::from(tier.value() - 1)]
    }

    #[must_use]
    pub fn points_by_tier(&self) -> &[f64; 5] {
        &self.points_by_tier
    }

    #[must_use]
    pub fn total_points(&self) -> f64 {
        self.total_points
    }

    #[must_use]
    pub fn completed_exercises(&self) -> u64 {
        self.completed_exercises
    }

    #[must_use]
    pub fn average_score(&self) -> u32 {
        self.average_score
    }

    #[must_use]
    pub fn study_streak(&self) -> u32 {
        self.study_streak
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Adds earned points to one tier's counter.
    pub fn add_tier_points(&mut self, tier: DifficultyTier, amount: f64) {
        self.points_by_tier[usize::from(tier.value() - 1)] += amount;
    }

    /// Raises the unlocked tier. Lower or equal targets are a no-op, so the
    /// unlock stays monotonic.
    ///
    /// Returns true if the tier actually rose.
    pub fn raise_unlocked_tier(&mut self, tier: DifficultyTier) -> bool {
        if tier > self.unlocked_tier {
            self.unlocked_tier = tier;
            true
        } else {
            false
        }
    }

    /// Folds a completed session into the lifetime aggregates.
    ///
    /// The running average is re-weighted over all completed exercises; the
    /// study streak extends only for sessions with at least
    /// `STREAK_MIN_COMPLETED` answers averaging `STREAK_MIN_AVERAGE` percent;
    /// the level is derived from total points.
    pub fn apply_completed_session(
        &mut self,
        session_average_percent: u32,
        session_completed: u32,
        session_points: f64,
    ) {
        let previous_total = self.completed_exercises;
        let new_total = previous_total + u64::from(session_completed);
        if new_total > 0 {
            let weighted = f64::from(self.average_score) * previous_total as f64
                + f64::from(session_average_percent) * f64::from(session_completed);
            self.average_score = (weighted / new_total as f64).round() as u32;
        }
        self.completed_exercises = new_total;
        self.total_points += session_points;

        if session_completed >= Self::STREAK_MIN_COMPLETED
            && session_average_percent >= Self::STREAK_MIN_AVERAGE
        {
            self.study_streak += 1;
        }

        self.level = (self.total_points / Self::POINTS_PER_LEVEL).floor() as u32 + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(level: u8) -> DifficultyTier {
        DifficultyTier::new(level).unwrap()
    }

    #[test]
    fn new_profile_starts_at_tier_two() {
        let p = LearnerProfile::new(LearnerId::new(1));
        assert_eq!(p.unlocked_tier().value(), 2);
        assert_eq!(p.level(), 1);
        assert_eq!(p.points_for(tier(1)), 0.0);
    }

    #[test]
    fn unlock_is_monotonic() {
        let mut p = LearnerProfile::new(LearnerId::new(1));
        assert!(p.raise_unlocked_tier(tier(3)));
        assert!(!p.raise_unlocked_tier(tier(3)));
        assert!(!p.raise_unlocked_tier(tier(2)));
        assert_eq!(p.unlocked_tier().value(), 3);
    }

    #[test]
    fn session_rollup_reweights_average() {
        let mut p = LearnerProfile::new(LearnerId::new(1));
        p.apply_completed_session(80, 5, 40.0);
        assert_eq!(p.average_score(), 80);
        assert_eq!(p.completed_exercises(), 5);
        assert_eq!(p.study_streak(), 1);

        p.apply_completed_session(50, 5, 20.0);
        assert_eq!(p.average_score(), 65);
        assert_eq!(p.completed_exercises(), 10);
        assert_eq!(p.study_streak(), 2);
        assert_eq!(p.total_points(), 60.0);
    }

    #[test]
    fn short_or_weak_sessions_do_not_extend_streak() {
        let mut p = LearnerProfile::new(LearnerId::new(1));
        p.apply_completed_session(100, 4, 8.0);
        assert_eq!(p.study_streak(), 0);

        p.apply_completed_session(49, 10, 10.0);
        assert_eq!(p.study_streak(), 0);
    }

    #[test]
    fn level_follows_total_points() {
        let mut p = LearnerProfile::new(LearnerId::new(1));
        p.apply_completed_session(90, 10, 999.0);
        assert_eq!(p.level(), 1);
        p.apply_completed_session(90, 10, 1.0);
        assert_eq!(p.level(), 2);
        p.apply_completed_session(90, 10, 2500.0);
        assert_eq!(p.level(), 4);
    }
}
