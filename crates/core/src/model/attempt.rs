use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{AttemptId, ItemId, LearnerId};

/// Who produced the score for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessedBy {
    /// Scored locally against the answer key.
    System,
    /// Scored by the assessment pipeline.
    Ai,
}

/// The learner's submission for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmittedAnswer {
    Choice(u32),
    Choices(Vec<u32>),
    Text(String),
}

impl SubmittedAnswer {
    /// Returns the free-text body, if this is a text submission.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            SubmittedAnswer::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// One graded (or pending) submission of an item by a learner.
///
/// The score is absent until assessment resolves; session counters only move
/// once it is present.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub answer: SubmittedAnswer,
    pub score: Option<f64>,
    pub assessed_by: AssessedBy,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Creates an attempt that is still awaiting a score.
    #[must_use]
    pub fn pending(
        id: AttemptId,
        learner_id: LearnerId,
        item_id: ItemId,
        answer: SubmittedAnswer,
        assessed_by: AssessedBy,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            learner_id,
            item_id,
            answer,
            score: None,
            assessed_by,
            recorded_at,
        }
    }

    /// Returns a copy of this attempt with the score filled in.
    #[must_use]
    pub fn resolved(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// True once a score is present.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.score.is_some()
    }
}
