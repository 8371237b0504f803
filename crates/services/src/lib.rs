#![forbid(unsafe_code)]

pub mod assessment;
pub mod cache;
pub mod error;
pub mod events;
pub mod progression_service;
pub mod review_service;
pub mod selection_service;
pub mod sessions;

pub use practice_core::Clock;

pub use assessment::AssessmentService;
pub use error::{
    AssessmentError, ProgressionServiceError, ProviderError, ReviewServiceError, SelectionError,
    SessionError,
};
pub use events::{DomainEvent, EventSink, NullSink, RecordingSink};
pub use progression_service::ProgressionService;
pub use review_service::{RepetitionStats, ReviewService};
pub use selection_service::{Selection, SelectionService};
pub use sessions::{AnswerOutcome, CompletionReport, SessionService};
