use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ItemId;

//
// ─── ITEM KIND ─────────────────────────────────────────────────────────────────
//

/// The answer format of a practice item, which decides how it is graded.
///
/// Closed kinds are scored locally against the answer key. Free-text kinds go
/// through the assessment pipeline, and the two long-form kinds may ground the
/// grading in retrieved reference material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    ClosedSingle,
    ClosedMultiple,
    ShortAnswer,
    SynthesisNote,
    Essay,
}

impl ItemKind {
    /// Returns true when grading requires the scoring oracle.
    #[must_use]
    pub fn is_free_text(&self) -> bool {
        matches!(
            self,
            ItemKind::ShortAnswer | ItemKind::SynthesisNote | ItemKind::Essay
        )
    }

    /// Returns true when grading may pull in external reference material.
    #[must_use]
    pub fn supports_research(&self) -> bool {
        matches!(self, ItemKind::SynthesisNote | ItemKind::Essay)
    }

    /// Quota cost in units for one assessment of this kind.
    ///
    /// Closed kinds are free; essays cost three units, other free-text kinds
    /// one.
    #[must_use]
    pub fn quota_units(&self) -> u32 {
        match self {
            ItemKind::ClosedSingle | ItemKind::ClosedMultiple => 0,
            ItemKind::ShortAnswer | ItemKind::SynthesisNote => 1,
            ItemKind::Essay => 3,
        }
    }
}

//
// ─── DIFFICULTY TIER ───────────────────────────────────────────────────────────
//

/// One of five ascending difficulty levels, validated on construction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DifficultyTier(u8);

impl DifficultyTier {
    pub const MIN: DifficultyTier = DifficultyTier(1);
    pub const MAX: DifficultyTier = DifficultyTier(5);

    /// Creates a tier from its numeric level.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::InvalidTier` when `level` is outside `1..=5`.
    pub fn new(level: u8) -> Result<Self, ItemError> {
        if !(1..=5).contains(&level) {
            return Err(ItemError::InvalidTier { provided: level });
        }
        Ok(Self(level))
    }

    /// Returns the numeric level (1 through 5).
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Returns the next tier up, or `None` at the top.
    #[must_use]
    pub fn next(&self) -> Option<DifficultyTier> {
        if self.0 < 5 { Some(Self(self.0 + 1)) } else { None }
    }
}

impl std::fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// The grading key stored alongside an item.
///
/// Closed kinds carry option indices checked locally. Free-text kinds carry
/// material the scoring oracle is prompted with; it is otherwise opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnswerKey {
    SingleIndex(u32),
    MultipleIndices(Vec<u32>),
    FreeText {
        expected_concepts: Vec<String>,
        model_answer: Option<String>,
    },
}

impl AnswerKey {
    fn fits(&self, kind: ItemKind) -> bool {
        match self {
            AnswerKey::SingleIndex(_) => kind == ItemKind::ClosedSingle,
            AnswerKey::MultipleIndices(_) => kind == ItemKind::ClosedMultiple,
            AnswerKey::FreeText { .. } => kind.is_free_text(),
        }
    }
}

//
// ─── PRACTICE ITEM ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ItemError {
    #[error("question text must not be empty")]
    EmptyQuestion,

    #[error("point value must be finite and positive, got {provided}")]
    InvalidPointValue { provided: f64 },

    #[error("difficulty tier must be in 1..=5, got {provided}")]
    InvalidTier { provided: u8 },

    #[error("answer key does not fit item kind {kind:?}")]
    AnswerKeyMismatch { kind: ItemKind },
}

/// One gradable exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeItem {
    id: ItemId,
    kind: ItemKind,
    category: String,
    tier: DifficultyTier,
    point_value: f64,
    question: String,
    work_title: Option<String>,
    answer_key: AnswerKey,
    created_at: DateTime<Utc>,
}

impl PracticeItem {
    /// Builds a validated item.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::EmptyQuestion` if the question is blank,
    /// `ItemError::InvalidPointValue` if the point value is non-positive or
    /// non-finite, and `ItemError::AnswerKeyMismatch` if the key shape does
    /// not match the kind.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ItemId,
        kind: ItemKind,
        category: impl Into<String>,
        tier: DifficultyTier,
        point_value: f64,
        question: impl Into<String>,
        work_title: Option<String>,
        answer_key: AnswerKey,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ItemError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(ItemError::EmptyQuestion);
        }
        if !point_value.is_finite() || point_value <= 0.0 {
            return Err(ItemError::InvalidPointValue {
                provided: point_value,
            });
        }
        if !answer_key.fits(kind) {
            return Err(ItemError::AnswerKeyMismatch { kind });
        }

        Ok(Self {
            id,
            kind,
            category: category.into(),
            tier,
            point_value,
            question,
            work_title,
            answer_key,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn tier(&self) -> DifficultyTier {
        self.tier
    }

    #[must_use]
    pub fn point_value(&self) -> f64 {
        self.point_value
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn work_title(&self) -> Option<&str> {
        self.work_title.as_deref()
    }

    #[must_use]
    pub fn answer_key(&self) -> &AnswerKey {
        &self.answer_key
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── ITEM FILTER ───────────────────────────────────────────────────────────────
//

/// The active selection constraints of a session.
///
/// `None` on a field means "no constraint". The base form (kind and category
/// only) is what the most relaxed selection pass and the exhaustion check use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub kinds: Option<Vec<ItemKind>>,
    pub categories: Option<Vec<String>>,
    pub tiers: Option<Vec<u8>>,
}

impl ItemFilter {
    /// Returns true when the item satisfies every constraint.
    #[must_use]
    pub fn matches(&self, item: &PracticeItem) -> bool {
        if !self.matches_base(item) {
            return false;
        }
        match &self.tiers {
            Some(tiers) => tiers.contains(&item.tier().value()),
            None => true,
        }
    }

    /// Returns true when the item satisfies the kind/category constraints,
    /// ignoring difficulty.
    #[must_use]
    pub fn matches_base(&self, item: &PracticeItem) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&item.kind()) {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.iter().any(|c| c == item.category()) {
                return false;
            }
        }
        true
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
