//! Strict decoding of oracle output into assessment results.
//!
//! Every grading response goes through the same two steps: extract the JSON
//! object from the raw completion, then deserialize it into a typed wire
//! struct. Anything that fails either step is a [`ProviderError`] and the
//! caller falls back to the deterministic degraded result. Scores that do
//! decode are still normalized and clamped before they reach a learner.

use practice_core::model::{
    AssessmentResult, EssayBreakdown, correctness_flags, normalize_score,
};
use serde::Deserialize;

use crate::error::ProviderError;

/// Decodes a short-answer or synthesis-note grading response.
///
/// # Errors
///
/// Returns [`ProviderError::MalformedResponse`] when the completion holds no
/// JSON object or the object is missing the required `score` field.
pub fn parse_short_answer(raw: &str, max_points: f64) -> Result<AssessmentResult, ProviderError> {
    let wire: ShortAnswerWire = decode(raw)?;

    let score = normalize_score(wire.score, max_points);
    let (is_correct, is_partially_correct) =
        correctness_flags(score, max_points, wire.is_correct);
    let correct_answer = wire
        .correct_answer
        .filter(|answer| !answer.trim().is_empty());

    Ok(AssessmentResult {
        score,
        max_score: max_points,
        is_correct,
        is_partially_correct,
        overall_assessment: wire.overall_assessment.unwrap_or_default(),
        feedback: wire.feedback.unwrap_or_default(),
        correct_answer,
        missing_elements: wire.missing_elements,
        correct_elements: wire.correct_elements,
        suggestions: wire.suggestions,
        essay: None,
        citations: Vec::new(),
    })
}

/// Decodes an essay grading response into a criterion breakdown.
///
/// `answer_word_count` is used when the oracle omits its own count.
///
/// # Errors
///
/// Returns [`ProviderError::MalformedResponse`] when the completion holds no
/// JSON object or any criterion score is missing.
pub fn parse_essay(
    raw: &str,
    max_points: f64,
    answer_word_count: u32,
) -> Result<AssessmentResult, ProviderError> {
    let wire: EssayWire = decode(raw)?;

    let feedback = wire.detailed_feedback.unwrap_or_default();
    let breakdown = EssayBreakdown::clamped(
        wire.formal_score,
        wire.literary_score,
        wire.composition_score,
        wire.language_score,
        wire.word_count.unwrap_or(answer_word_count),
        feedback.strengths,
        feedback.weaknesses,
        wire.improvements,
    );

    // The total is rebuilt from the clamped criteria; the item's point value
    // caps what the learner can actually earn.
    let score = breakdown.total.min(max_points.max(0.0));
    let (is_correct, is_partially_correct) = correctness_flags(score, max_points, false);

    Ok(AssessmentResult {
        score,
        max_score: max_points,
        is_correct,
        is_partially_correct,
        overall_assessment: wire.overall_assessment.unwrap_or_default(),
        feedback: String::new(),
        correct_answer: None,
        missing_elements: Vec::new(),
        correct_elements: Vec::new(),
        suggestions: feedback.suggestions,
        essay: Some(breakdown),
        citations: Vec::new(),
    })
}

fn decode<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T, ProviderError> {
    let block = extract_json(raw).ok_or_else(|| {
        ProviderError::MalformedResponse("completion contains no JSON object".to_string())
    })?;
    serde_json::from_str(block).map_err(|err| ProviderError::MalformedResponse(err.to_string()))
}

// Models wrap their JSON in prose or code fences often enough that we slice
// from the first `{` to the last `}` before deserializing.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShortAnswerWire {
    score: f64,
    #[serde(default)]
    is_correct: bool,
    #[serde(default)]
    overall_assessment: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    correct_answer: Option<String>,
    #[serde(default)]
    missing_elements: Vec<String>,
    #[serde(default)]
    correct_elements: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EssayWire {
    formal_score: f64,
    literary_score: f64,
    composition_score: f64,
    language_score: f64,
    #[serde(default)]
    overall_assessment: Option<String>,
    #[serde(default)]
    detailed_feedback: Option<EssayFeedbackWire>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    word_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EssayFeedbackWire {
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//
