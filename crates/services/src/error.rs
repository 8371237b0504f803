//! Shared error types for the services crate.

use thiserror::Error;

use practice_core::model::{ItemError, ItemKind, SessionStateError};
use storage::repository::StorageError;

/// Errors talking to an external provider (scoring oracle, web search,
/// page scraper, quota oracle).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider is not configured")]
    Disabled,
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("provider request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("provider request timed out")]
    Timeout,
    #[error("provider response could not be parsed: {0}")]
    MalformedResponse(String),
    #[error("provider transport error: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(err)
        }
    }
}

/// Errors emitted by `SelectionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AssessmentService`.
///
/// Grading-path failures (oracle unreachable, malformed output) never
/// surface here; those collapse into a degraded
/// [`practice_core::model::AssessmentResult`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment quota exceeded: {needed} unit(s) required")]
    QuotaExceeded { needed: u32 },
    #[error("items of kind {kind:?} are not assessed by the pipeline")]
    NotFreeText { kind: ItemKind },
    #[error(transparent)]
    Quota(#[from] ProviderError),
}

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no content available for the requested filters")]
    NoContentAvailable,
    #[error("submitted answer does not match the item kind")]
    AnswerMismatch,
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Progression(#[from] ProgressionServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<SelectionError> for SessionError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::Storage(inner) => SessionError::Storage(inner),
        }
    }
}
