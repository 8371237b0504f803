use practice_core::model::{DailyProgress, LearnerId, SessionId, SessionState, SessionStatus};
use storage::repository::{DailyProgressRepository, SessionRepository};

use crate::error::SessionError;

/// Storage-backed read queries over past sessions.
pub(crate) struct SessionQueries;

impl SessionQueries {
    /// A learner's completed sessions, most recent first.
    ///
    /// Discarded sessions are treated as if they never happened and are not
    /// listed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when repository access fails.
    pub async fn completed_history(
        learner_id: LearnerId,
        sessions: &dyn SessionRepository,
    ) -> Result<Vec<SessionState>, SessionError> {
        let mut completed: Vec<SessionState> = sessions
            .sessions_for_learner(learner_id)
            .await?
            .into_iter()
            .filter(|s| s.status() == SessionStatus::Completed)
            .collect();
        completed.sort_by_key(|s| std::cmp::Reverse(s.completed_at()));
        Ok(completed)
    }

    /// One session by ID.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` wrapping `NotFound` when the session
    /// does not exist.
    pub async fn session_details(
        id: SessionId,
        sessions: &dyn SessionRepository,
    ) -> Result<SessionState, SessionError> {
        Ok(sessions.get_session(id).await?)
    }

    /// A learner's per-day practice totals, oldest day first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when repository access fails.
    pub async fn daily_history(
        learner_id: LearnerId,
        daily: &dyn DailyProgressRepository,
    ) -> Result<Vec<DailyProgress>, SessionError> {
        Ok(daily.daily_for_learner(learner_id).await?)
    }
}
