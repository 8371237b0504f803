//! Session lifecycle and the answer workflow built on top of it.

mod queries;
mod service;

pub use crate::error::SessionError;
pub use service::{AnswerOutcome, CompletionReport, SessionService};
