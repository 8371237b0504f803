//! Research-grounded grading and its degrade chain.
//!
//! Long-form answers are graded against reference material when the whole
//! research flow (query, search, scrape, aggregate) yields a usable
//! context. Every failure along that flow funnels through one degrade
//! function into a plain direct assessment, and a direct assessment that
//! itself fails collapses into the deterministic degraded result. The
//! outcome tag records which of those paths actually produced the result.

use practice_core::model::{AnswerKey, AssessmentResult, Citation, ItemKind, PracticeItem};
use thiserror::Error;
use tracing::{debug, warn};

use super::aggregate::{AggregatedContext, aggregate_sources};
use super::oracle::ScoringOracle;
use super::parse;
use super::scrape::{SCRAPE_BATCH_SIZE, ScrapeProvider, scrape_many};
use super::search::{SearchProvider, SearchResult};
use crate::error::ProviderError;

/// How many search hits are considered per research pass.
pub const MAX_RESEARCH_RESULTS: u32 = 5;

/// Smallest aggregated context worth grading against.
pub const MIN_CONTEXT_CHARS: usize = 100;

/// Which grading path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentOutcome {
    /// Reference material was assembled and grading used it.
    ResearchSuccess,
    /// Research failed somewhere; grading ran without context.
    DegradedToDirect,
    /// The item kind skips research; grading ran without context.
    Direct,
    /// Every grading path failed; the deterministic fallback was returned.
    HardFallback,
}

impl AssessmentOutcome {
    /// Whether the result reflects a real scoring attempt. Only billable
    /// outcomes are charged against the learner's quota.
    #[must_use]
    pub fn is_billable(self) -> bool {
        !matches!(self, AssessmentOutcome::HardFallback)
    }
}

/// A pipeline result tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Graded {
    pub result: AssessmentResult,
    pub outcome: AssessmentOutcome,
}

#[derive(Debug, Error)]
enum ResearchFailure {
    #[error("search returned no results")]
    NoResults,
    #[error("aggregated context is below {MIN_CONTEXT_CHARS} characters")]
    ThinContext,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Grades `answer` with web research, degrading to a direct assessment when
/// any step of the research flow fails.
pub(crate) async fn grade_with_research(
    oracle: &dyn ScoringOracle,
    search: &dyn SearchProvider,
    scrape: &dyn ScrapeProvider,
    item: &PracticeItem,
    answer: &str,
    budget_chars: usize,
) -> Graded {
    match research_context(oracle, search, scrape, item, budget_chars).await {
        Ok((context, citations)) => {
            match grade_once(oracle, item, answer, Some(&context.text)).await {
                Ok(result) => Graded {
                    result: result.with_citations(citations),
                    outcome: AssessmentOutcome::ResearchSuccess,
                },
                Err(err) => degrade(oracle, item, answer, &ResearchFailure::Provider(err)).await,
            }
        }
        Err(failure) => degrade(oracle, item, answer, &failure).await,
    }
}

/// Grades `answer` without any reference material.
pub(crate) async fn grade_direct(
    oracle: &dyn ScoringOracle,
    item: &PracticeItem,
    answer: &str,
) -> Graded {
    let (result, hard) = attempt_direct(oracle, item, answer).await;
    let outcome = if hard {
        AssessmentOutcome::HardFallback
    } else {
        AssessmentOutcome::Direct
    };
    Graded { result, outcome }
}

// The single funnel out of the research flow.
async fn degrade(
    oracle: &dyn ScoringOracle,
    item: &PracticeItem,
    answer: &str,
    cause: &ResearchFailure,
) -> Graded {
    warn!(item_id = %item.id(), cause = %cause, "research unavailable, grading directly");
    let (result, hard) = attempt_direct(oracle, item, answer).await;
    let outcome = if hard {
        AssessmentOutcome::HardFallback
    } else {
        AssessmentOutcome::DegradedToDirect
    };
    Graded { result, outcome }
}

async fn attempt_direct(
    oracle: &dyn ScoringOracle,
    item: &PracticeItem,
    answer: &str,
) -> (AssessmentResult, bool) {
    match grade_once(oracle, item, answer, None).await {
        Ok(result) => (result, false),
        Err(err) => {
            warn!(item_id = %item.id(), error = %err, "grading failed, returning degraded result");
            (AssessmentResult::degraded(item.point_value()), true)
        }
    }
}

async fn grade_once(
    oracle: &dyn ScoringOracle,
    item: &PracticeItem,
    answer: &str,
    context: Option<&str>,
) -> Result<AssessmentResult, ProviderError> {
    match item.kind() {
        ItemKind::Essay => {
            let raw = oracle.complete(&essay_prompt(item, answer, context)).await?;
            parse::parse_essay(&raw, item.point_value(), word_count(answer))
        }
        _ => {
            let raw = oracle
                .complete(&short_answer_prompt(item, answer, context))
                .await?;
            parse::parse_short_answer(&raw, item.point_value())
        }
    }
}

async fn research_context(
    oracle: &dyn ScoringOracle,
    search: &dyn SearchProvider,
    scrape: &dyn ScrapeProvider,
    item: &PracticeItem,
    budget_chars: usize,
) -> Result<(AggregatedContext, Vec<Citation>), ResearchFailure> {
    let query = research_query(oracle, item).await;
    debug!(item_id = %item.id(), query = %query, "searching for reference material");

    let results = search.search(&query, MAX_RESEARCH_RESULTS).await?;
    if results.is_empty() {
        return Err(ResearchFailure::NoResults);
    }

    let urls: Vec<String> = results.iter().map(|r| r.link.clone()).collect();
    let sources = scrape_many(scrape, &urls, SCRAPE_BATCH_SIZE).await;
    let context = aggregate_sources(&sources, budget_chars);
    if context.chars() < MIN_CONTEXT_CHARS {
        return Err(ResearchFailure::ThinContext);
    }

    let citations = citations_for(&results, &context);
    Ok((context, citations))
}

fn citations_for(results: &[SearchResult], context: &AggregatedContext) -> Vec<Citation> {
    results
        .iter()
        .filter(|result| context.source_urls.contains(&result.link))
        .filter_map(|result| {
            Citation::new(
                result.title.clone(),
                result.link.clone(),
                result.snippet.clone(),
            )
        })
        .collect()
}

// Prefers an oracle-written query; any failure falls back to the
// deterministic one so research can still proceed.
async fn research_query(oracle: &dyn ScoringOracle, item: &PracticeItem) -> String {
    match oracle.complete(&query_prompt(item)).await {
        Ok(raw) => {
            let query = sanitize_query(&raw);
            if query.is_empty() {
                fallback_query(item)
            } else {
                query
            }
        }
        Err(err) => {
            debug!(error = %err, "query generation failed, using deterministic query");
            fallback_query(item)
        }
    }
}

fn sanitize_query(raw: &str) -> String {
    let first_line = raw.lines().next().unwrap_or_default();
    let cleaned: String = first_line.trim().trim_matches('"').chars().take(120).collect();
    cleaned.trim().to_string()
}

/// Deterministic query: the work title plus the first words of the question.
fn fallback_query(item: &PracticeItem) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = item.work_title() {
        if !title.trim().is_empty() {
            parts.push(title.trim().to_string());
        }
    }
    let head: Vec<&str> = item.question().split_whitespace().take(5).collect();
    if !head.is_empty() {
        parts.push(head.join(" "));
    }
    parts.join(" ")
}

fn word_count(answer: &str) -> u32 {
    u32::try_from(answer.split_whitespace().count()).unwrap_or(u32::MAX)
}

fn expected_concepts(item: &PracticeItem) -> &[String] {
    match item.answer_key() {
        AnswerKey::FreeText {
            expected_concepts, ..
        } => expected_concepts,
        _ => &[],
    }
}

fn model_answer(item: &PracticeItem) -> Option<&str> {
    match item.answer_key() {
        AnswerKey::FreeText { model_answer, .. } => model_answer.as_deref(),
        _ => None,
    }
}

//
// ─── PROMPTS ────────────────────────────────────────────────────────────────
//

fn short_answer_prompt(item: &PracticeItem, answer: &str, context: Option<&str>) -> String {
    let mut prompt = String::from("You are grading an exam practice answer.\n\n");
    prompt.push_str(&format!("Question: {}\n", item.question()));
    if let Some(title) = item.work_title() {
        prompt.push_str(&format!("Discussed work: {title}\n"));
    }
    prompt.push_str(&format!("Maximum points: {}\n", item.point_value()));
    let concepts = expected_concepts(item);
    if !concepts.is_empty() {
        prompt.push_str(&format!("Expected concepts: {}\n", concepts.join(", ")));
    }
    if let Some(model) = model_answer(item) {
        prompt.push_str(&format!("Model answer: {model}\n"));
    }
    prompt.push_str(&format!("\nStudent answer:\n{answer}\n"));
    if let Some(context) = context {
        prompt.push_str(&format!("\nReference material:\n{context}\n"));
    }
    prompt.push_str(
        "\nRespond with only a JSON object of this shape:\n\
         {\"score\": 0.0, \"isCorrect\": false, \"overallAssessment\": \"\", \
         \"feedback\": \"\", \"correctAnswer\": \"\", \"missingElements\": [], \
         \"correctElements\": [], \"suggestions\": []}\n",
    );
    prompt.push_str(&format!(
        "score must be between 0 and {}.\n",
        item.point_value()
    ));
    prompt
}

fn essay_prompt(item: &PracticeItem, answer: &str, context: Option<&str>) -> String {
    let mut prompt =
        String::from("You are grading an exam practice essay against four criteria.\n\n");
    prompt.push_str(&format!("Assignment: {}\n", item.question()));
    if let Some(title) = item.work_title() {
        prompt.push_str(&format!("Discussed work: {title}\n"));
    }
    prompt.push_str(
        "Criteria maxima: formal requirements 1, literary content 16, \
         composition 7, language 11 (35 in total).\n",
    );
    prompt.push_str(&format!("\nStudent essay:\n{answer}\n"));
    if let Some(context) = context {
        prompt.push_str(&format!("\nReference material:\n{context}\n"));
    }
    prompt.push_str(
        "\nRespond with only a JSON object of this shape:\n\
         {\"formalScore\": 0, \"literaryScore\": 0, \"compositionScore\": 0, \
         \"languageScore\": 0, \"overallAssessment\": \"\", \
         \"detailedFeedback\": {\"strengths\": [], \"weaknesses\": [], \
         \"suggestions\": []}, \"improvements\": [], \"wordCount\": 0}\n",
    );
    prompt
}

fn query_prompt(item: &PracticeItem) -> String {
    let mut prompt = String::from(
        "Suggest one short web search query (at most ten words) for reference \
         material on this exam question. Reply with only the query.\n",
    );
    prompt.push_str(&format!("Question: {}\n", item.question()));
    if let Some(title) = item.work_title() {
        prompt.push_str(&format!("Discussed work: {title}\n"));
    }
    prompt
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use practice_core::model::{DifficultyTier, ItemId};
    use practice_core::time::fixed_now;

    use super::*;
    use crate::error::ProviderError;

    fn synthesis_item() -> PracticeItem {
        PracticeItem::new(
            ItemId::new(7),
            ItemKind::SynthesisNote,
            "romanticism",
            DifficultyTier::new(3).unwrap(),
            10.0,
            "Compare the two poems' treatment of exile.",
            Some("Pan Tadeusz".to_string()),
            AnswerKey::FreeText {
                expected_concepts: vec!["exile".into(), "longing".into()],
                model_answer: None,
            },
            fixed_now(),
        )
        .unwrap()
    }

    /// Oracle that answers query prompts with a query and grading prompts
    /// with a canned payload, recording every prompt it sees.
    struct StubOracle {
        grading: String,
        prompts: Mutex<Vec<String>>,
        fail_queries: bool,
    }

    impl StubOracle {
        fn grading(payload: &str) -> Self {
            Self {
                grading: payload.to_string(),
                prompts: Mutex::new(Vec::new()),
                fail_queries: false,
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScoringOracle for StubOracle {
        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.contains("web search query") {
                if self.fail_queries {
                    return Err(ProviderError::Timeout);
                }
                return Ok("\"exile motif analysis\"".to_string());
            }
            Ok(self.grading.clone())
        }
    }

    struct DeadOracle;

    #[async_trait]
    impl ScoringOracle for DeadOracle {
        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            Err(ProviderError::Timeout)
        }
    }

    struct StubSearch {
        results: Result<Vec<SearchResult>, ()>,
        queries: Mutex<Vec<String>>,
    }

    impl StubSearch {
        fn with_results(results: Vec<SearchResult>) -> Self {
            Self {
                results: Ok(results),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                results: Err(()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchProvider for StubSearch {
        async fn search(
            &self,
            query: &str,
            _max_results: u32,
        ) -> Result<Vec<SearchResult>, ProviderError> {
            self.queries.lock().unwrap().push(query.to_string());
            match &self.results {
                Ok(results) => Ok(results.clone()),
                Err(()) => Err(ProviderError::EmptyResponse),
            }
        }
    }

    struct StubScrape;

    #[async_trait]
    impl ScrapeProvider for StubScrape {
        async fn scrape(&self, url: &str) -> Result<String, ProviderError> {
            Ok(format!("Scholarly commentary on the poem from {url}. ").repeat(10))
        }
    }

    fn hits() -> Vec<SearchResult> {
        vec![
            SearchResult {
                title: "Analysis".to_string(),
                link: "https://a.example/analysis".to_string(),
                snippet: "On exile".to_string(),
            },
            SearchResult {
                title: "Commentary".to_string(),
                link: "https://b.example/commentary".to_string(),
                snippet: "On longing".to_string(),
            },
        ]
    }

    const GOOD_PAYLOAD: &str = r#"{"score": 8.5, "isCorrect": true, "feedback": "Strong."}"#;

    #[tokio::test]
    async fn research_success_attaches_citations() {
        let oracle = StubOracle::grading(GOOD_PAYLOAD);
        let search = StubSearch::with_results(hits());

        let graded = grade_with_research(
            &oracle,
            &search,
            &StubScrape,
            &synthesis_item(),
            "The poems frame exile as longing.",
            20_000,
        )
        .await;

        assert_eq!(graded.outcome, AssessmentOutcome::ResearchSuccess);
        assert_eq!(graded.result.score, 8.5);
        assert_eq!(graded.result.citations.len(), 2);
        assert_eq!(graded.result.citations[0].url(), "https://a.example/analysis");
        // The grading prompt carries the aggregated reference material.
        let grading_prompt = oracle.prompts().pop().unwrap();
        assert!(grading_prompt.contains("Reference material"));
        assert!(grading_prompt.contains("=== SOURCE: https://a.example/analysis ==="));
    }

    #[tokio::test]
    async fn zero_results_degrades_to_the_direct_result() {
        let item = synthesis_item();
        let answer = "The poems frame exile as longing.";

        let degraded_path = grade_with_research(
            &StubOracle::grading(GOOD_PAYLOAD),
            &StubSearch::with_results(Vec::new()),
            &StubScrape,
            &item,
            answer,
            20_000,
        )
        .await;
        let direct_path =
            grade_direct(&StubOracle::grading(GOOD_PAYLOAD), &item, answer).await;

        assert_eq!(degraded_path.outcome, AssessmentOutcome::DegradedToDirect);
        assert_eq!(direct_path.outcome, AssessmentOutcome::Direct);
        assert_eq!(degraded_path.result, direct_path.result);
    }

    #[tokio::test]
    async fn search_failure_degrades_to_direct() {
        let graded = grade_with_research(
            &StubOracle::grading(GOOD_PAYLOAD),
            &StubSearch::failing(),
            &StubScrape,
            &synthesis_item(),
            "answer",
            20_000,
        )
        .await;

        assert_eq!(graded.outcome, AssessmentOutcome::DegradedToDirect);
        assert_eq!(graded.result.score, 8.5);
    }

    #[tokio::test]
    async fn dead_oracle_hard_falls_back_to_the_degraded_result() {
        let item = synthesis_item();
        let graded = grade_with_research(
            &DeadOracle,
            &StubSearch::with_results(hits()),
            &StubScrape,
            &item,
            "answer",
            20_000,
        )
        .await;

        assert_eq!(graded.outcome, AssessmentOutcome::HardFallback);
        assert_eq!(graded.result, AssessmentResult::degraded(item.point_value()));
        assert!(!graded.outcome.is_billable());
    }

    #[tokio::test]
    async fn failed_query_generation_uses_the_deterministic_query() {
        let oracle = StubOracle {
            grading: GOOD_PAYLOAD.to_string(),
            prompts: Mutex::new(Vec::new()),
            fail_queries: true,
        };
        let search = StubSearch::with_results(hits());

        let graded = grade_with_research(
            &oracle,
            &search,
            &StubScrape,
            &synthesis_item(),
            "answer",
            20_000,
        )
        .await;

        assert_eq!(graded.outcome, AssessmentOutcome::ResearchSuccess);
        assert_eq!(
            search.queries(),
            vec!["Pan Tadeusz Compare the two poems' treatment".to_string()]
        );
    }

    #[tokio::test]
    async fn generated_query_is_unquoted_and_trimmed() {
        let search = StubSearch::with_results(hits());

        grade_with_research(
            &StubOracle::grading(GOOD_PAYLOAD),
            &search,
            &StubScrape,
            &synthesis_item(),
            "answer",
            20_000,
        )
        .await;

        assert_eq!(search.queries(), vec!["exile motif analysis".to_string()]);
    }

    #[tokio::test]
    async fn unparseable_grading_with_context_retries_without_it() {
        // Returns prose when reference material is present, valid JSON when
        // it is not.
        struct ContextAllergicOracle;

        #[async_trait]
        impl ScoringOracle for ContextAllergicOracle {
            async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
                if prompt.contains("web search query") {
                    Ok("query".to_string())
                } else if prompt.contains("Reference material") {
                    Ok("I would give this answer full marks.".to_string())
                } else {
                    Ok(GOOD_PAYLOAD.to_string())
                }
            }
        }

        let graded = grade_with_research(
            &ContextAllergicOracle,
            &StubSearch::with_results(hits()),
            &StubScrape,
            &synthesis_item(),
            "answer",
            20_000,
        )
        .await;

        assert_eq!(graded.outcome, AssessmentOutcome::DegradedToDirect);
        assert_eq!(graded.result.score, 8.5);
    }
}
