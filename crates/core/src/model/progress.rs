use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::ids::LearnerId;

/// Per-day practice totals for one learner.
///
/// Completed sessions merge into the bucket of their completion day; the
/// average is re-weighted by exercise count on every merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub learner_id: LearnerId,
    pub day: NaiveDate,
    pub exercises_count: u32,
    pub study_time_minutes: u32,
    pub average_score: u32,
}

impl DailyProgress {
    /// An empty bucket for the given day.
    #[must_use]
    pub fn empty(learner_id: LearnerId, day: NaiveDate) -> Self {
        Self {
            learner_id,
            day,
            exercises_count: 0,
            study_time_minutes: 0,
            average_score: 0,
        }
    }

    /// Folds one completed session into the bucket.
    pub fn merge_session(
        &mut self,
        exercises: u32,
        time_spent_secs: u32,
        average_percent: u32,
    ) {
        let previous = self.exercises_count;
        let combined = previous + exercises;
        if combined > 0 {
            let weighted = f64::from(self.average_score) * f64::from(previous)
                + f64::from(average_percent) * f64::from(exercises);
            self.average_score = (weighted / f64::from(combined)).round() as u32;
        }
        self.exercises_count = combined;
        self.study_time_minutes += (f64::from(time_spent_secs) / 60.0).round() as u32;
    }
}
