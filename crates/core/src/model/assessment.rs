use serde::{Deserialize, Serialize};
use url::Url;

//
// ─── CITATIONS ─────────────────────────────────────────────────────────────────
//

/// A reference source attached to a research-grounded assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    title: String,
    url: String,
    snippet: String,
}

impl Citation {
    /// Builds a citation, rejecting links that are not valid absolute URLs.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Option<Self> {
        let url = url.into();
        Url::parse(&url).ok()?;
        Some(Self {
            title: title.into(),
            url,
            snippet: snippet.into(),
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn snippet(&self) -> &str {
        &self.snippet
    }
}

//
// ─── ESSAY BREAKDOWN ───────────────────────────────────────────────────────────
//

/// Sub-scores of an essay assessment.
///
/// The four criteria have fixed maxima summing to 35. Construction clamps each
/// sub-score into range and recomputes the total from the clamped parts, so an
/// overreaching oracle response can never inflate the stored result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayBreakdown {
    pub formal: f64,
    pub literary: f64,
    pub composition: f64,
    pub language: f64,
    pub total: f64,
    pub word_count: u32,
    pub percentage: u32,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
}

impl EssayBreakdown {
    pub const FORMAL_MAX: f64 = 1.0;
    pub const LITERARY_MAX: f64 = 16.0;
    pub const COMPOSITION_MAX: f64 = 7.0;
    pub const LANGUAGE_MAX: f64 = 11.0;
    pub const TOTAL_MAX: f64 = 35.0;

    /// Builds a breakdown from raw oracle sub-scores, clamping everything.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn clamped(
        formal: f64,
        literary: f64,
        composition: f64,
        language: f64,
        word_count: u32,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        improvements: Vec<String>,
    ) -> Self {
        let formal = clamp_sub(formal, Self::FORMAL_MAX);
        let literary = clamp_sub(literary, Self::LITERARY_MAX);
        let composition = clamp_sub(composition, Self::COMPOSITION_MAX);
        let language = clamp_sub(language, Self::LANGUAGE_MAX);
        let total = (formal + literary + composition + language).min(Self::TOTAL_MAX);
        let percentage = (total / Self::TOTAL_MAX * 100.0).round() as u32;

        Self {
            formal,
            literary,
            composition,
            language,
            total,
            word_count,
            percentage,
            strengths,
            weaknesses,
            improvements,
        }
    }
}

fn clamp_sub(value: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, max)
    } else {
        0.0
    }
}

//
// ─── ASSESSMENT RESULT ─────────────────────────────────────────────────────────
//

/// The graded outcome of one free-text submission.
///
/// A result always exists once an answer is submitted; the degraded
/// constructor covers the case where every grading path failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub score: f64,
    pub max_score: f64,
    pub is_correct: bool,
    pub is_partially_correct: bool,
    pub overall_assessment: String,
    pub feedback: String,
    pub correct_answer: Option<String>,
    pub missing_elements: Vec<String>,
    pub correct_elements: Vec<String>,
    pub suggestions: Vec<String>,
    pub essay: Option<EssayBreakdown>,
    pub citations: Vec<Citation>,
}

impl AssessmentResult {
    /// Fraction of the maximum score at which an answer counts as correct.
    pub const CORRECT_RATIO: f64 = 0.6;

    /// The deterministic fallback result: score zero, generic feedback.
    #[must_use]
    pub fn degraded(max_score: f64) -> Self {
        Self {
            score: 0.0,
            max_score,
            is_correct: false,
            is_partially_correct: false,
            overall_assessment: "The answer could not be graded automatically.".to_string(),
            feedback: "Automatic grading was unavailable for this answer. \
                       Please try again later."
                .to_string(),
            correct_answer: None,
            missing_elements: Vec::new(),
            correct_elements: Vec::new(),
            suggestions: Vec::new(),
            essay: None,
            citations: Vec::new(),
        }
    }

    /// Attaches the sources a research-grounded grading consulted.
    #[must_use]
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// Rounds an oracle score to one decimal place and clamps it to
/// `[0, max_score]`. Non-finite input becomes zero.
#[must_use]
pub fn normalize_score(raw: f64, max_score: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let rounded = (raw * 10.0).round() / 10.0;
    rounded.clamp(0.0, max_score.max(0.0))
}

/// Derives the two correctness flags for a graded answer.
///
/// An answer is correct when the oracle says so or the score reaches
/// `CORRECT_RATIO` of the maximum; partially correct when it is not correct
/// but earned something below that bar.
#[must_use]
pub fn correctness_flags(score: f64, max_score: f64, oracle_correct: bool) -> (bool, bool) {
    let bar = AssessmentResult::CORRECT_RATIO * max_score;
    let is_correct = oracle_correct || score >= bar;
    let is_partially_correct = !is_correct && score > 0.0 && score < bar;
    (is_correct, is_partially_correct)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
