use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{ItemId, LearnerId};

/// The spaced-repetition state for one (learner, item) pair.
///
/// There is at most one schedule per pair. Interval and ease are always kept
/// inside their legal ranges; out-of-range values read back from storage are
/// clamped on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSchedule {
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetition_count: u32,
    pub next_review_at: DateTime<Utc>,
}

impl ReviewSchedule {
    pub const MIN_INTERVAL_DAYS: u32 = 1;
    pub const MAX_INTERVAL_DAYS: u32 = 365;
    pub const MIN_EASE: f64 = 1.3;
    pub const MAX_EASE: f64 = 2.5;
    pub const DEFAULT_EASE: f64 = 2.5;

    /// Interval length at which an item counts as mastered in statistics.
    pub const MASTERY_INTERVAL_DAYS: u32 = 30;

    /// Builds a schedule, clamping interval and ease into their legal ranges.
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        item_id: ItemId,
        interval_days: u32,
        ease_factor: f64,
        repetition_count: u32,
        next_review_at: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            item_id,
            interval_days: interval_days
                .clamp(Self::MIN_INTERVAL_DAYS, Self::MAX_INTERVAL_DAYS),
            ease_factor: clamp_ease(ease_factor),
            repetition_count,
            next_review_at,
        }
    }

    /// The schedule created on a learner's first attempt at an item.
    #[must_use]
    pub fn first(learner_id: LearnerId, item_id: ItemId, now: DateTime<Utc>) -> Self {
        Self::new(
            learner_id,
            item_id,
            Self::MIN_INTERVAL_DAYS,
            Self::DEFAULT_EASE,
            1,
            now + Duration::days(i64::from(Self::MIN_INTERVAL_DAYS)),
        )
    }

    /// True when the item is due at or before `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    /// True when the interval has grown past the mastery threshold.
    #[must_use]
    pub fn is_mastered(&self) -> bool {
        self.interval_days >= Self::MASTERY_INTERVAL_DAYS
    }
}

fn clamp_ease(ease: f64) -> f64 {
    if ease.is_finite() {
        ease.clamp(ReviewSchedule::MIN_EASE, ReviewSchedule::MAX_EASE)
    } else {
        ReviewSchedule::DEFAULT_EASE
    }
}
