mod assessment;
mod attempt;
mod ids;
mod item;
mod marker;
mod profile;
mod progress;
mod schedule;
mod session;

pub use ids::{AttemptId, ItemId, LearnerId, ParseIdError, SessionId};

pub use assessment::{
    AssessmentResult, Citation, EssayBreakdown, correctness_flags, normalize_score,
};
pub use attempt::{AssessedBy, AttemptRecord, SubmittedAnswer};
pub use item::{AnswerKey, DifficultyTier, ItemError, ItemFilter, ItemKind, PracticeItem};
pub use marker::{ExposureMarker, ExposureState};
pub use profile::LearnerProfile;
pub use progress::DailyProgress;
pub use schedule::ReviewSchedule;
pub use session::{
    AnsweredItem, CompletionKind, SessionCounters, SessionState, SessionStateError,
    SessionStatus,
};
