//! Grading pipeline for free-text answers.
//!
//! The pipeline gates on the learner's quota, grades either with web
//! research (long-form kinds) or directly against the oracle, and charges
//! the quota only for outcomes that reflect a real scoring attempt. A
//! submitted answer always comes back with a result; total failure of
//! every provider yields the deterministic degraded result rather than an
//! error.

pub mod aggregate;
pub mod oracle;
pub mod parse;
pub mod quota;
pub mod research;
pub mod scrape;
pub mod search;

pub use aggregate::{
    AggregatedContext, CONTEXT_BUDGET_CHARS, SOURCE_CAP_CHARS, aggregate_sources,
    clean_source_text,
};
pub use oracle::{HttpScoringOracle, OracleConfig, ScoringOracle};
pub use quota::{FixedQuota, QuotaOracle};
pub use research::{AssessmentOutcome, Graded, MAX_RESEARCH_RESULTS, MIN_CONTEXT_CHARS};
pub use scrape::{
    HttpScrapeProvider, SCRAPE_BATCH_SIZE, ScrapeConfig, ScrapeProvider, ScrapedSource,
    scrape_many,
};
pub use search::{HttpSearchProvider, MAX_RESULTS_PER_QUERY, SearchConfig, SearchProvider, SearchResult};

use std::sync::Arc;

use practice_core::Clock;
use practice_core::model::{ItemKind, LearnerId, PracticeItem};
use tracing::{info, instrument};

use crate::error::AssessmentError;
use crate::events::{DomainEvent, EventSink, NullSink};

/// Grades free-text answers through the research and degrade chain.
pub struct AssessmentService {
    clock: Clock,
    oracle: Arc<dyn ScoringOracle>,
    search: Arc<dyn SearchProvider>,
    scrape: Arc<dyn ScrapeProvider>,
    quota: Arc<dyn QuotaOracle>,
    events: Arc<dyn EventSink>,
    budget_chars: usize,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        oracle: Arc<dyn ScoringOracle>,
        search: Arc<dyn SearchProvider>,
        scrape: Arc<dyn ScrapeProvider>,
        quota: Arc<dyn QuotaOracle>,
    ) -> Self {
        Self {
            clock: Clock::default(),
            oracle,
            search,
            scrape,
            quota,
            events: Arc::new(NullSink),
            budget_chars: CONTEXT_BUDGET_CHARS,
        }
    }

    /// Service with every HTTP provider configured from the environment.
    #[must_use]
    pub fn from_env(quota: Arc<dyn QuotaOracle>) -> Self {
        Self::new(
            Arc::new(HttpScoringOracle::from_env()),
            Arc::new(HttpSearchProvider::from_env()),
            Arc::new(HttpScrapeProvider::from_env()),
            quota,
        )
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Overrides the aggregated-context budget. Mainly for tests.
    #[must_use]
    pub fn with_context_budget(mut self, budget_chars: usize) -> Self {
        self.budget_chars = budget_chars;
        self
    }

    /// Grades one free-text answer.
    ///
    /// The quota is checked before any provider call; a rejected request
    /// has no side effects. It is debited afterwards unless the pipeline
    /// hard-fell back to the degraded result.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFreeText` for answer-key items,
    /// `AssessmentError::QuotaExceeded` when the budget cannot cover the
    /// item kind, and `AssessmentError::Quota` when the quota oracle itself
    /// cannot be reached.
    #[instrument(skip(self, item, answer), fields(item_id = %item.id(), kind = ?item.kind()))]
    pub async fn assess(
        &self,
        learner_id: LearnerId,
        item: &PracticeItem,
        answer: &str,
    ) -> Result<Graded, AssessmentError> {
        if !item.kind().is_free_text() {
            return Err(AssessmentError::NotFreeText { kind: item.kind() });
        }
        let units = item.kind().quota_units();
        if !self.quota.has_budget(learner_id, units).await? {
            return Err(AssessmentError::QuotaExceeded { needed: units });
        }

        let graded = if item.kind().supports_research() {
            research::grade_with_research(
                self.oracle.as_ref(),
                self.search.as_ref(),
                self.scrape.as_ref(),
                item,
                answer,
                self.budget_chars,
            )
            .await
        } else {
            research::grade_direct(self.oracle.as_ref(), item, answer).await
        };

        if graded.outcome.is_billable() {
            self.quota
                .debit(learner_id, units, debit_reason(item.kind()))
                .await?;
        }

        info!(
            outcome = ?graded.outcome,
            score = graded.result.score,
            "assessment completed"
        );
        self.events
            .publish(DomainEvent::AssessmentCompleted {
                learner_id,
                item_id: item.id(),
                score: graded.result.score,
                max_score: graded.result.max_score,
                at: self.clock.now(),
            })
            .await;

        Ok(graded)
    }
}

fn debit_reason(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Essay => "essay assessment",
        ItemKind::SynthesisNote => "synthesis note assessment",
        _ => "short answer assessment",
    }
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//
