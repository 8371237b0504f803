use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ReviewSchedule;

//
// ─── REVIEW INPUT ──────────────────────────────────────────────────────────────
//

/// Input to one scheduling step: the score just earned plus the pair's
/// current interval and ease.
///
/// # Fields
///
/// * `score_percent` - Score of the attempt as a percentage, 0 to 100
/// * `interval_days` - Current review interval (1 on the first attempt)
/// * `ease_factor` - Current ease factor (2.5 on the first attempt)
///
/// # Examples
///
/// ```
/// # use practice_core::scheduler::ReviewInput;
/// let input = ReviewInput::first_attempt(80.0);
/// assert_eq!(input.interval_days, 1);
/// assert_eq!(input.ease_factor, 2.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub score_percent: f64,
    pub interval_days: u32,
    pub ease_factor: f64,
}

impl ReviewInput {
    /// Input for a pair that has never been reviewed: default interval and
    /// ease.
    #[must_use]
    pub fn first_attempt(score_percent: f64) -> Self {
        Self {
            score_percent,
            interval_days: ReviewSchedule::MIN_INTERVAL_DAYS,
            ease_factor: ReviewSchedule::DEFAULT_EASE,
        }
    }

    /// Input carrying forward an existing schedule's state.
    #[must_use]
    pub fn from_schedule(score_percent: f64, schedule: &ReviewSchedule) -> Self {
        Self {
            score_percent,
            interval_days: schedule.interval_days,
            ease_factor: schedule.ease_factor,
        }
    }

    /// Pulls every field into its legal range.
    ///
    /// Returns the sanitized input and whether anything had to change. A
    /// non-finite score or ease falls back to 0 and the default ease.
    #[must_use]
    pub fn sanitized(&self) -> (Self, bool) {
        let score_percent = if self.score_percent.is_finite() {
            self.score_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let interval_days = self
            .interval_days
            .clamp(ReviewSchedule::MIN_INTERVAL_DAYS, ReviewSchedule::MAX_INTERVAL_DAYS);
        let ease_factor = if self.ease_factor.is_finite() {
            self.ease_factor
                .clamp(ReviewSchedule::MIN_EASE, ReviewSchedule::MAX_EASE)
        } else {
            ReviewSchedule::DEFAULT_EASE
        };

        let clean = Self {
            score_percent,
            interval_days,
            ease_factor,
        };
        let changed = clean != *self;
        (clean, changed)
    }
}

//
// ─── REVIEW PLAN ───────────────────────────────────────────────────────────────
//

/// Result of one scheduling step.
///
/// # Fields
///
/// * `quality` - The 0–5 quality grade derived from the score
/// * `passed` - Whether the attempt took the pass branch (quality >= 3)
/// * `interval_days` - The next review interval, clamped to `[1, 365]`
/// * `ease_factor` - The next ease factor, clamped to `[1.3, 2.5]`
/// * `sanitized` - Whether the input had to be pulled into range first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewPlan {
    pub quality: u8,
    pub passed: bool,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub sanitized: bool,
}

impl ReviewPlan {
    /// The next review date implied by this plan.
    #[must_use]
    pub fn next_review_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(i64::from(self.interval_days))
    }
}

//
// ─── SCHEDULING STEP ───────────────────────────────────────────────────────────
//

/// Computes the next interval and ease for a (learner, item) pair.
///
/// This is the SM-2 step driving all review scheduling. The quality grade is
/// `floor(score / 100 * 5)`; quality 3 and up passes, anything lower fails
/// and resets the interval to one day. The function is pure and total:
/// identical inputs always produce identical plans, and out-of-range inputs
/// are sanitized rather than rejected (the plan records that this happened).
///
/// # Examples
///
/// ```
/// # use practice_core::scheduler::{plan_review, ReviewInput};
/// let plan = plan_review(ReviewInput::first_attempt(100.0));
/// assert_eq!(plan.quality, 5);
/// assert_eq!(plan.interval_days, 1);
/// assert_eq!(plan.ease_factor, 2.5);
///
/// let failed = plan_review(ReviewInput {
///     score_percent: 40.0,
///     interval_days: 10,
///     ease_factor: 2.0,
/// });
/// assert_eq!(failed.quality, 2);
/// assert_eq!(failed.interval_days, 1);
/// assert_eq!(failed.ease_factor, 1.8);
/// ```
#[must_use]
pub fn plan_review(input: ReviewInput) -> ReviewPlan {
    let (input, sanitized) = input.sanitized();

    let quality = quality_from_percent(input.score_percent);
    let passed = quality >= 3;

    let (raw_interval, raw_ease) = if passed {
        let interval = match input.interval_days {
            1 => 1.0,
            2 => 6.0,
            days => (f64::from(days) * input.ease_factor).round(),
        };
        let shortfall = f64::from(5 - quality);
        let ease = input.ease_factor + (0.1 - shortfall * (0.08 + shortfall * 0.02));
        (interval, ease)
    } else {
        (1.0, (input.ease_factor - 0.2).max(ReviewSchedule::MIN_EASE))
    };

    let ease_factor = raw_ease.clamp(ReviewSchedule::MIN_EASE, ReviewSchedule::MAX_EASE);
    let interval_days = (raw_interval as u32)
        .clamp(ReviewSchedule::MIN_INTERVAL_DAYS, ReviewSchedule::MAX_INTERVAL_DAYS);

    ReviewPlan {
        quality,
        passed,
        interval_days,
        ease_factor,
        sanitized,
    }
}

/// Maps a percentage score onto the 0–5 quality scale.
#[must_use]
pub fn quality_from_percent(score_percent: f64) -> u8 {
    let clamped = if score_percent.is_finite() {
        score_percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    (clamped / 100.0 * 5.0).floor() as u8
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn input(score: f64, interval: u32, ease: f64) -> ReviewInput {
        ReviewInput {
            score_percent: score,
            interval_days: interval,
            ease_factor: ease,
        }
    }

    #[test]
    fn quality_mapping_covers_the_scale() {
        assert_eq!(quality_from_percent(0.0), 0);
        assert_eq!(quality_from_percent(19.9), 0);
        assert_eq!(quality_from_percent(20.0), 1);
        assert_eq!(quality_from_percent(40.0), 2);
        assert_eq!(quality_from_percent(59.9), 2);
        assert_eq!(quality_from_percent(60.0), 3);
        assert_eq!(quality_from_percent(80.0), 4);
        assert_eq!(quality_from_percent(99.9), 4);
        assert_eq!(quality_from_percent(100.0), 5);
    }

    #[test]
    fn perfect_first_attempt_keeps_interval_and_ease() {
        let plan = plan_review(input(100.0, 1, 2.5));
        assert_eq!(plan.quality, 5);
        assert!(plan.passed);
        assert_eq!(plan.interval_days, 1);
        assert_eq!(plan.ease_factor, 2.5);
        assert!(!plan.sanitized);
    }

    #[test]
    fn failed_review_resets_interval_and_drops_ease() {
        let plan = plan_review(input(40.0, 10, 2.0));
        assert_eq!(plan.quality, 2);
        assert!(!plan.passed);
        assert_eq!(plan.interval_days, 1);
        assert!((plan.ease_factor - 1.8).abs() < 1e-9);
    }

    #[test]
    fn second_interval_jumps_to_six_days() {
        let plan = plan_review(input(100.0, 2, 2.5));
        assert_eq!(plan.interval_days, 6);
    }

    #[test]
    fn established_interval_grows_by_ease() {
        let plan = plan_review(input(100.0, 10, 2.0));
        assert_eq!(plan.interval_days, 20);
        assert!((plan.ease_factor - 2.1).abs() < 1e-9);
    }

    #[test]
    fn quality_three_still_costs_ease() {
        // shortfall 2: 0.1 - 2 * (0.08 + 0.04) = -0.14
        let plan = plan_review(input(60.0, 10, 2.5));
        assert!(plan.passed);
        assert!((plan.ease_factor - 2.36).abs() < 1e-9);
    }

    #[test]
    fn quality_four_leaves_ease_unchanged() {
        let plan = plan_review(input(80.0, 10, 2.0));
        assert!((plan.ease_factor - 2.0).abs() < 1e-9);
    }

    #[test]
    fn interval_clamps_at_one_year() {
        let plan = plan_review(input(100.0, 300, 2.5));
        assert_eq!(plan.interval_days, 365);
    }

    #[test]
    fn ease_never_drops_below_floor() {
        let plan = plan_review(input(0.0, 1, 1.3));
        assert_eq!(plan.ease_factor, ReviewSchedule::MIN_EASE);
    }

    #[test]
    fn passing_scores_never_shrink_interval_below_one() {
        for score in [60.0, 75.0, 90.0, 100.0] {
            for interval in [1, 2, 5, 30, 365] {
                for ease in [1.3, 2.0, 2.5] {
                    let plan = plan_review(input(score, interval, ease));
                    assert!(plan.passed);
                    assert!(plan.interval_days >= 1);
                }
            }
        }
    }

    #[test]
    fn failing_scores_always_reset_interval() {
        for score in [0.0, 20.0, 40.0, 59.0] {
            for interval in [1, 6, 120] {
                let plan = plan_review(input(score, interval, 2.2));
                assert!(!plan.passed);
                assert_eq!(plan.interval_days, 1);
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_plans() {
        let a = plan_review(input(73.0, 17, 1.9));
        let b = plan_review(input(73.0, 17, 1.9));
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_inputs_are_sanitized() {
        let plan = plan_review(input(150.0, 10, 2.0));
        assert_eq!(plan.quality, 5);
        assert!(plan.sanitized);

        let plan = plan_review(input(f64::NAN, 10, 2.0));
        assert_eq!(plan.quality, 0);
        assert!(!plan.passed);
        assert!(plan.sanitized);

        let plan = plan_review(input(80.0, 0, 0.5));
        assert_eq!(plan.interval_days, 1);
        assert_eq!(plan.ease_factor, ReviewSchedule::MIN_EASE);
        assert!(plan.sanitized);
    }

    #[test]
    fn input_from_schedule_carries_state() {
        let schedule = ReviewSchedule::new(
            crate::model::LearnerId::new(1),
            crate::model::ItemId::new(2),
            12,
            1.7,
            4,
            fixed_now(),
        );
        let i = ReviewInput::from_schedule(55.0, &schedule);
        assert_eq!(i.interval_days, 12);
        assert!((i.ease_factor - 1.7).abs() < 1e-9);
    }

    #[test]
    fn next_review_at_adds_the_interval() {
        let plan = plan_review(input(100.0, 2, 2.5));
        let now = fixed_now();
        assert_eq!(plan.next_review_at(now), now + Duration::days(6));
    }
}
