//! Web search provider used to locate reference material.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::error::ProviderError;

/// Deadline for one search call.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Hard cap on results per query, regardless of what the caller asks for.
pub const MAX_RESULTS_PER_QUERY: u32 = 10;

/// One hit returned by the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Backend that turns a query string into candidate reference pages.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Runs `query` and returns up to `max_results` hits.
    ///
    /// # Errors
    ///
    /// Returns an error when no backend is configured or the request fails.
    /// An empty result list is not an error.
    async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchResult>, ProviderError>;
}

/// Configuration for the Custom Search backend.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: String,
    pub engine_id: String,
    pub language: String,
}

impl SearchConfig {
    /// Reads configuration from the environment.
    ///
    /// Returns `None` when `PRACTICE_SEARCH_API_KEY` or
    /// `PRACTICE_SEARCH_ENGINE_ID` is unset or empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("PRACTICE_SEARCH_API_KEY").ok()?;
        let engine_id = std::env::var("PRACTICE_SEARCH_ENGINE_ID").ok()?;
        if api_key.trim().is_empty() || engine_id.trim().is_empty() {
            return None;
        }
        let base_url = std::env::var("PRACTICE_SEARCH_BASE_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/customsearch/v1".to_string());
        let language =
            std::env::var("PRACTICE_SEARCH_LANGUAGE").unwrap_or_else(|_| "en".to_string());
        Some(Self {
            base_url,
            api_key,
            engine_id,
            language,
        })
    }
}

/// [`SearchProvider`] over a Google Custom Search compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpSearchProvider {
    client: Client,
    config: Option<SearchConfig>,
}

impl HttpSearchProvider {
    #[must_use]
    pub fn new(config: Option<SearchConfig>) -> Self {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// Provider configured from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(SearchConfig::from_env())
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    #[instrument(skip(self), fields(max_results))]
    async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let config = self.config.as_ref().ok_or(ProviderError::Disabled)?;
        let num = max_results.clamp(1, MAX_RESULTS_PER_QUERY).to_string();

        let response = self
            .client
            .get(&config.base_url)
            .query(&[
                ("key", config.api_key.as_str()),
                ("cx", config.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
                ("hl", config.language.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }

        let parsed: SearchResponse = response.json().await?;
        let results = parsed
            .items
            .into_iter()
            .map(|item| SearchResult {
                title: item.title,
                link: item.link,
                snippet: item.snippet.unwrap_or_default(),
            })
            .collect();
        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItemWire>,
}

#[derive(Debug, Deserialize)]
struct SearchItemWire {
    title: String,
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}
