use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DifficultyTier, LearnerId, LearnerProfile};

//
// ─── THRESHOLDS ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("unlock threshold must be finite and positive, got {provided}")]
    InvalidThreshold { provided: f64 },
}

/// Points required to unlock tiers 3, 4, and 5.
///
/// Tiers 1 and 2 are open from the start. External configuration supplies
/// these; the defaults mirror the standard curriculum setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnlockThresholds {
    tier3: f64,
    tier4: f64,
    tier5: f64,
}

impl UnlockThresholds {
    /// Builds a threshold set.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::InvalidThreshold` if any value is
    /// non-positive or non-finite.
    pub fn new(tier3: f64, tier4: f64, tier5: f64) -> Result<Self, ProgressionError> {
        for provided in [tier3, tier4, tier5] {
            if !provided.is_finite() || provided <= 0.0 {
                return Err(ProgressionError::InvalidThreshold { provided });
            }
        }
        Ok(Self { tier3, tier4, tier5 })
    }

    /// The points needed to move past `unlocked` to the next tier, if there
    /// is one gated by points.
    #[must_use]
    pub fn required_after(&self, unlocked: DifficultyTier) -> Option<f64> {
        match unlocked.value() {
            2 => Some(self.tier3),
            3 => Some(self.tier4),
            4 => Some(self.tier5),
            _ => None,
        }
    }
}

impl Default for UnlockThresholds {
    fn default() -> Self {
        Self {
            tier3: 100.0,
            tier4: 200.0,
            tier5: 300.0,
        }
    }
}

//
// ─── UNLOCKS ───────────────────────────────────────────────────────────────────
//

/// Emitted when a learner unlocks a new difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierUnlock {
    pub learner_id: LearnerId,
    pub unlocked: DifficultyTier,
}

/// Points counted toward the unlock that follows `unlocked`.
///
/// Unlocking tier 3 counts tiers 1 and 2 together; each later unlock counts
/// only the tier directly below it.
#[must_use]
pub fn earned_toward_next(profile: &LearnerProfile) -> f64 {
    let points = profile.points_by_tier();
    match profile.unlocked_tier().value() {
        2 => points[0] + points[1],
        3 => points[2],
        4 => points[3],
        _ => 0.0,
    }
}

/// Accumulates one attempt's earned score and performs at most one unlock
/// step.
///
/// Attempts with zero or negative score never mutate anything. The unlock is
/// monotonic and idempotent: once a tier is open, re-checking it does
/// nothing, and each call moves at most one tier.
pub fn apply_score(
    profile: &mut LearnerProfile,
    tier: DifficultyTier,
    score: f64,
    thresholds: &UnlockThresholds,
) -> Option<TierUnlock> {
    if !score.is_finite() || score <= 0.0 {
        return None;
    }
    profile.add_tier_points(tier, score);
    check_unlock(profile, thresholds)
}

/// Checks whether the tier after the currently unlocked one opens, and
/// raises it if so.
pub fn check_unlock(
    profile: &mut LearnerProfile,
    thresholds: &UnlockThresholds,
) -> Option<TierUnlock> {
    let required = thresholds.required_after(profile.unlocked_tier())?;
    let next = profile.unlocked_tier().next()?;
    if earned_toward_next(profile) >= required && profile.raise_unlocked_tier(next) {
        Some(TierUnlock {
            learner_id: profile.learner_id(),
            unlocked: next,
        })
    } else {
        None
    }
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

/// Progress toward the next points-gated unlock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressToNext {
    pub next_tier: DifficultyTier,
    pub current_points: f64,
    pub required_points: f64,
    pub percentage: u32,
}

/// Read-only view of a learner's tier progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionReport {
    pub unlocked_tier: DifficultyTier,
    pub points_by_tier: [f64; 5],
    pub progress_to_next: Option<ProgressToNext>,
}

impl ProgressionReport {
    /// True once every tier is open.
    #[must_use]
    pub fn all_unlocked(&self) -> bool {
        self.progress_to_next.is_none()
    }
}

/// Builds the progression view for a profile.
#[must_use]
pub fn report(profile: &LearnerProfile, thresholds: &UnlockThresholds) -> ProgressionReport {
    let progress_to_next = thresholds
        .required_after(profile.unlocked_tier())
        .zip(profile.unlocked_tier().next())
        .map(|(required_points, next_tier)| {
            let current_points = earned_toward_next(profile);
            let percentage =
                ((current_points / required_points * 100.0).round() as u32).min(100);
            ProgressToNext {
                next_tier,
                current_points,
                required_points,
                percentage,
            }
        });

    ProgressionReport {
        unlocked_tier: profile.unlocked_tier(),
        points_by_tier: *profile.points_by_tier(),
        progress_to_next,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
