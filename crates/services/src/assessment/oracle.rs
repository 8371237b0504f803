//! Scoring oracle backed by an OpenAI-compatible chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ProviderError;

/// Deadline for a single grading call.
const ORACLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Text-completion backend used for grading and search-query generation.
///
/// Implementations return the model's raw text; decoding into a structured
/// result happens downstream so that every response goes through the same
/// strict parse step.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Runs one completion for `prompt` and returns the trimmed output.
    ///
    /// # Errors
    ///
    /// Returns an error when no backend is configured, the request fails,
    /// or the response carries no content.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Configuration for the scoring oracle backend.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OracleConfig {
    /// Reads configuration from the environment.
    ///
    /// Returns `None` when `PRACTICE_AI_API_KEY` is unset or empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("PRACTICE_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = std::env::var("PRACTICE_AI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model =
            std::env::var("PRACTICE_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// [`ScoringOracle`] over an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct HttpScoringOracle {
    client: Client,
    config: Option<OracleConfig>,
}

impl HttpScoringOracle {
    #[must_use]
    pub fn new(config: Option<OracleConfig>) -> Self {
        let client = Client::builder()
            .timeout(ORACLE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// Oracle configured from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(OracleConfig::from_env())
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ScoringOracle for HttpScoringOracle {
    #[instrument(skip(self, prompt))]
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let config = self.config.as_ref().ok_or(ProviderError::Disabled)?;
        let request = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.2,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", config.base_url))
            .bearer_auth(&config.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }
        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}
