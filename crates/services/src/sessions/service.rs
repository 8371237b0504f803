use std::collections::HashSet;
use std::sync::Arc;

use practice_core::Clock;
use practice_core::model::{
    AnswerKey, AssessedBy, AttemptId, AttemptRecord, CompletionKind, DailyProgress,
    ExposureMarker, ExposureState, ItemFilter, ItemId, LearnerId, PracticeItem, SessionId,
    SessionState, SessionStateError, SubmittedAnswer,
};
use practice_core::progression::{TierUnlock, UnlockThresholds};
use storage::repository::Store;
use tracing::{info, instrument, warn};

use super::queries::SessionQueries;
use crate::assessment::{AssessmentService, Graded};
use crate::cache::RecencyCache;
use crate::error::SessionError;
use crate::events::EventSink;
use crate::progression_service::ProgressionService;
use crate::review_service::ReviewService;
use crate::selection_service::{Selection, SelectionService};

//
// ─── OUTCOMES ───────────────────────────────────────────────────────────────
//

/// Everything one resolved submission produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub session: SessionState,
    pub attempt: AttemptRecord,
    pub score: f64,
    /// Canonical correctness driving the session counters: the answer earned
    /// at least half the item's points. The assessment result carries its own
    /// stricter flags, which may disagree.
    pub is_correct: bool,
    /// Present for free-text kinds graded by the pipeline.
    pub assessment: Option<Graded>,
    /// Present when this answer pushed the learner over an unlock threshold.
    pub unlocked: Option<TierUnlock>,
}

/// The finalized session and how `complete` resolved it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub session: SessionState,
    pub kind: CompletionKind,
}

//
// ─── SESSION SERVICE ────────────────────────────────────────────────────────
//

/// Owns the per-learner session lifecycle.
///
/// Selection, grading, tier progression, and review scheduling all hang off
/// the answer workflow here; completion folds the finished session into the
/// learner's lifetime profile and the daily aggregate.
pub struct SessionService {
    clock: Clock,
    store: Store,
    cache: Arc<RecencyCache>,
    selection: SelectionService,
    assessment: AssessmentService,
    progression: ProgressionService,
    reviews: ReviewService,
}

impl SessionService {
    /// Wires the selection, assessment, progression, and review services
    /// onto one store. `events` receives both progression and assessment
    /// events.
    #[must_use]
    pub fn new(store: Store, assessment: AssessmentService, events: Arc<dyn EventSink>) -> Self {
        let cache = Arc::new(RecencyCache::new());
        let selection = SelectionService::new(
            store.items.clone(),
            store.attempts.clone(),
            store.markers.clone(),
            cache.clone(),
        );
        let progression = ProgressionService::new(store.profiles.clone(), events.clone());
        let reviews = ReviewService::new(store.schedules.clone());
        Self {
            clock: Clock::default(),
            store,
            cache,
            selection,
            assessment: assessment.with_events(events),
            progression,
            reviews,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.selection = self.selection.with_clock(clock);
        self.assessment = self.assessment.with_clock(clock);
        self.progression = self.progression.with_clock(clock);
        self.reviews = self.reviews.with_clock(clock);
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: UnlockThresholds) -> Self {
        self.progression = self.progression.with_thresholds(thresholds);
        self
    }

    /// Disables the random draw in selection so tests are deterministic.
    #[must_use]
    pub fn with_randomized_pick(mut self, randomize: bool) -> Self {
        self.selection = self.selection.with_randomized_pick(randomize);
        self
    }

    //
    // ─── LIFECYCLE ──────────────────────────────────────────────────────────
    //

    /// Starts a practice session for the learner.
    ///
    /// The learner's most recently active open session is resumed if it has
    /// at least one answered item; its stored exclusion sets keep working
    /// because they live on the session row itself. An open session with no
    /// answers is stale: it is discarded as if it never existed, its view
    /// markers purged, and a fresh session created.
    ///
    /// `filter` seeds a newly created session; a resumed session keeps the
    /// filter it already had (use [`Self::set_filters`] to change it).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the store fails.
    #[instrument(skip(self, filter), fields(learner_id = %learner_id))]
    pub async fn start(
        &self,
        learner_id: LearnerId,
        filter: ItemFilter,
    ) -> Result<SessionState, SessionError> {
        let now = self.clock.now();
        if let Some(mut open) = self.store.sessions.find_open_session(learner_id).await? {
            if open.has_answers() {
                open.resume(now)?;
                self.store.sessions.upsert_session(&open).await?;
                info!(session_id = %open.id(), "resumed open session");
                return Ok(open);
            }
            open.complete(now)?;
            self.store.sessions.upsert_session(&open).await?;
            self.store.markers.purge_session_markers(open.id()).await?;
            info!(session_id = %open.id(), "discarded stale empty session");
        }

        let session = SessionState::open(SessionId::fresh(), learner_id, filter, now);
        self.store.sessions.upsert_session(&session).await?;
        info!(session_id = %session.id(), "started session");
        Ok(session)
    }

    /// Replaces the active filter set on a live session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` when the session is already finalized,
    /// or `SessionError::Storage` when the store fails.
    pub async fn set_filters(
        &self,
        session_id: SessionId,
        filter: ItemFilter,
    ) -> Result<SessionState, SessionError> {
        let mut session = self.store.sessions.get_session(session_id).await?;
        session.set_filter(filter, self.clock.now())?;
        self.store.sessions.upsert_session(&session).await?;
        Ok(session)
    }

    /// Pauses an in-progress session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` unless the session is in progress, or
    /// `SessionError::Storage` when the store fails.
    pub async fn pause(&self, session_id: SessionId) -> Result<SessionState, SessionError> {
        let mut session = self.store.sessions.get_session(session_id).await?;
        session.pause(self.clock.now())?;
        self.store.sessions.upsert_session(&session).await?;
        Ok(session)
    }

    /// Checkpoints a live session without ending it, optionally updating the
    /// tracked time spent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` when the session is already finalized,
    /// or `SessionError::Storage` when the store fails.
    pub async fn save_state(
        &self,
        session_id: SessionId,
        time_spent_secs: Option<u32>,
    ) -> Result<SessionState, SessionError> {
        let now = self.clock.now();
        let mut session = self.store.sessions.get_session(session_id).await?;
        match time_spent_secs {
            Some(secs) => session.set_time_spent(secs, now)?,
            None => session.touch(now)?,
        }
        self.store.sessions.upsert_session(&session).await?;
        Ok(session)
    }

    //
    // ─── ANSWER WORKFLOW ────────────────────────────────────────────────────
    //

    /// Picks the next exercise for the session and records the exposure.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoContentAvailable` when nothing in the store
    /// matches even the relaxed kind/category filters,
    /// `SessionError::State` when the session is already finalized, and
    /// `SessionError::Storage` when the store fails.
    pub async fn next_item(&self, session_id: SessionId) -> Result<PracticeItem, SessionError> {
        let mut session = self.store.sessions.get_session(session_id).await?;
        session.touch(self.clock.now())?;
        match self.selection.select_next(&session).await? {
            Selection::Item(item) => {
                self.store.sessions.upsert_session(&session).await?;
                Ok(item)
            }
            Selection::Exhausted => Err(SessionError::NoContentAvailable),
        }
    }

    /// Adds an item to the session skip set without scoring it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` when the session is already finalized,
    /// or `SessionError::Storage` when the store fails.
    pub async fn skip(
        &self,
        session_id: SessionId,
        item_id: ItemId,
    ) -> Result<SessionState, SessionError> {
        let mut session = self.store.sessions.get_session(session_id).await?;
        session.record_skip(item_id, self.clock.now())?;
        self.store.sessions.upsert_session(&session).await?;
        Ok(session)
    }

    /// Resolves one submission end to end.
    ///
    /// Closed kinds are scored locally against the answer key; free-text
    /// kinds go through the assessment pipeline, which consults the quota
    /// oracle first. A rejected submission (finalized session, duplicate
    /// item, mismatched answer shape, insufficient quota) leaves no side
    /// effects. A resolved one appends the attempt, moves the counters,
    /// upgrades the exposure marker, credits tier progression, and refreshes
    /// the review schedule.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` for finalized sessions and duplicate
    /// completions, `SessionError::AnswerMismatch` when the answer shape does
    /// not fit the item kind, `SessionError::Assessment` when the pipeline
    /// rejects the request, and `SessionError::Storage` when the store fails.
    #[instrument(skip(self, answer), fields(session_id = %session_id, item_id = %item_id))]
    pub async fn submit_answer(
        &self,
        session_id: SessionId,
        item_id: ItemId,
        answer: SubmittedAnswer,
    ) -> Result<AnswerOutcome, SessionError> {
        let mut session = self.store.sessions.get_session(session_id).await?;
        if !session.status().is_open() {
            return Err(SessionStateError::Finalized {
                status: session.status(),
            }
            .into());
        }
        if session.has_answered(item_id) {
            return Err(SessionStateError::DuplicateCompletion { item_id }.into());
        }

        let item = self.store.items.get_item(item_id).await?;
        let learner_id = session.learner_id();
        let now = self.clock.now();

        let (score, assessed_by, assessment) = if item.kind().is_free_text() {
            let text = answer.text().ok_or(SessionError::AnswerMismatch)?;
            let graded = self.assessment.assess(learner_id, &item, text).await?;
            (graded.result.score, AssessedBy::Ai, Some(graded))
        } else {
            (score_closed(&item, &answer)?, AssessedBy::System, None)
        };

        let attempt = AttemptRecord::pending(
            AttemptId::fresh(),
            learner_id,
            item_id,
            answer,
            assessed_by,
            now,
        )
        .resolved(score);
        self.store.attempts.record_attempt(&attempt).await?;

        let is_correct = counts_as_correct(score, item.point_value());
        session.record_answer(item_id, score, item.point_value(), is_correct, now)?;
        self.store.sessions.upsert_session(&session).await?;
        self.mark_answered(learner_id, item_id, session_id).await?;

        let unlocked = self
            .progression
            .record_earned_score(learner_id, item.tier(), score)
            .await?;

        // A schedule that fails to refresh costs one future review hint, not
        // the submission.
        let percent = (score / item.point_value() * 100.0).clamp(0.0, 100.0);
        if let Err(error) = self.reviews.record_score(learner_id, item_id, percent).await {
            warn!(error = %error, "review schedule refresh failed");
        }

        Ok(AnswerOutcome {
            session,
            attempt,
            score,
            is_correct,
            assessment,
            unlocked,
        })
    }

    /// Finalizes the session. At most once per session id: a second call
    /// fails on the already-terminal status before anything propagates.
    ///
    /// A session with zero answered items is discarded as if it never
    /// existed, taking its view markers with it. Otherwise the session is
    /// marked completed and folded into the learner's profile and the
    /// completion day's aggregate. Per-item scheduling and tier progression
    /// already happened when each answer resolved.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` when the session is already finalized,
    /// or `SessionError::Storage` when the store fails.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn complete(
        &self,
        session_id: SessionId,
        time_spent_secs: Option<u32>,
    ) -> Result<CompletionReport, SessionError> {
        let now = self.clock.now();
        let mut session = self.store.sessions.get_session(session_id).await?;
        if let Some(secs) = time_spent_secs {
            session.set_time_spent(secs, now)?;
        }
        let kind = session.complete(now)?;
        // Finalizing first makes a retried completion fail fast instead of
        // propagating twice.
        self.store.sessions.upsert_session(&session).await?;

        let learner_id = session.learner_id();
        match kind {
            CompletionKind::Discarded => {
                self.store.markers.purge_session_markers(session_id).await?;
                self.cache.forget(learner_id);
                info!("discarded empty session");
            }
            CompletionKind::Completed { average_percent } => {
                let counters = *session.counters();
                let mut profile = self.store.profiles.get_or_create_profile(learner_id).await?;
                profile.apply_completed_session(
                    average_percent,
                    counters.completed,
                    counters.points,
                );
                self.store.profiles.upsert_profile(&profile).await?;

                let day = now.date_naive();
                let mut bucket = self
                    .store
                    .daily
                    .find_daily(learner_id, day)
                    .await?
                    .unwrap_or_else(|| DailyProgress::empty(learner_id, day));
                bucket.merge_session(
                    counters.completed,
                    counters.time_spent_secs,
                    average_percent,
                );
                self.store.daily.upsert_daily(&bucket).await?;

                self.cache.forget(learner_id);
                info!(
                    completed = counters.completed,
                    average_percent, "completed session"
                );
            }
        }

        Ok(CompletionReport { session, kind })
    }

    //
    // ─── QUERIES ────────────────────────────────────────────────────────────
    //

    /// How many filter-matching items the session can still serve.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the store fails.
    pub async fn count_available(&self, session_id: SessionId) -> Result<usize, SessionError> {
        let session = self.store.sessions.get_session(session_id).await?;
        Ok(self.selection.count_available(&session).await?)
    }

    /// The learner's completed sessions, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the store fails.
    pub async fn history(&self, learner_id: LearnerId) -> Result<Vec<SessionState>, SessionError> {
        SessionQueries::completed_history(learner_id, self.store.sessions.as_ref()).await
    }

    /// One session by id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` wrapping `NotFound` when the session
    /// does not exist.
    pub async fn session_details(
        &self,
        session_id: SessionId,
    ) -> Result<SessionState, SessionError> {
        SessionQueries::session_details(session_id, self.store.sessions.as_ref()).await
    }

    /// The learner's per-day practice totals, oldest day first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the store fails.
    pub async fn daily_history(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<DailyProgress>, SessionError> {
        SessionQueries::daily_history(learner_id, self.store.daily.as_ref()).await
    }

    async fn mark_answered(
        &self,
        learner_id: LearnerId,
        item_id: ItemId,
        session_id: SessionId,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut marker = match self
            .store
            .markers
            .find_marker(learner_id, item_id, session_id)
            .await?
        {
            Some(marker) => marker,
            // Direct submission without a prior view still leaves a record.
            None => ExposureMarker::viewed(learner_id, item_id, session_id, now),
        };
        marker.upgrade_to(ExposureState::Answered, now);
        self.store.markers.upsert_marker(&marker).await?;
        Ok(())
    }
}

/// Canonical correctness for counters and streaks: at least half the points.
fn counts_as_correct(score: f64, point_value: f64) -> bool {
    point_value > 0.0 && score >= 0.5 * point_value
}

/// Scores a closed-form answer against the item's key. A match earns the
/// full point value, anything else earns zero.
fn score_closed(item: &PracticeItem, answer: &SubmittedAnswer) -> Result<f64, SessionError> {
    match (item.answer_key(), answer) {
        (AnswerKey::SingleIndex(expected), SubmittedAnswer::Choice(given)) => {
            Ok(if given == expected { item.point_value() } else { 0.0 })
        }
        (AnswerKey::MultipleIndices(expected), SubmittedAnswer::Choices(given)) => {
            let expected: HashSet<u32> = expected.iter().copied().collect();
            let given: HashSet<u32> = given.iter().copied().collect();
            Ok(if expected == given { item.point_value() } else { 0.0 })
        }
        _ => Err(SessionError::AnswerMismatch),
    }
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//
