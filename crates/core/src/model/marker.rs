use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{ItemId, LearnerId, SessionId};

/// How far a learner has gotten with an item inside one session.
///
/// States only move forward: `Unseen → Viewed → Answered`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ExposureState {
    Unseen,
    Viewed,
    Answered,
}

/// The per (learner, item, session) exposure record.
///
/// Created when the selector serves the item; upgraded to `Answered` when a
/// submission resolves. Discarding a session purges its markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureMarker {
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub session_id: SessionId,
    pub state: ExposureState,
    pub updated_at: DateTime<Utc>,
}

impl ExposureMarker {
    /// The marker written when the selector serves an item.
    #[must_use]
    pub fn viewed(
        learner_id: LearnerId,
        item_id: ItemId,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            item_id,
            session_id,
            state: ExposureState::Viewed,
            updated_at: now,
        }
    }

    /// Advances the state, never backwards.
    ///
    /// Returns true when the state actually changed.
    pub fn upgrade_to(&mut self, state: ExposureState, now: DateTime<Utc>) -> bool {
        if state > self.state {
            self.state = state;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    /// True while the item has been shown but not answered.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ExposureState::Viewed
    }
}
