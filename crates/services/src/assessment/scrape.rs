//! Page scraper that turns search hits into plain text.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::ProviderError;

/// Deadline for one scrape call. Scraping renders remote pages, so this is
/// far looser than the other provider deadlines.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(120);

/// How many pages are fetched concurrently.
pub const SCRAPE_BATCH_SIZE: usize = 2;

/// The extracted text of one successfully scraped page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedSource {
    pub url: String,
    pub text: String,
}

/// Backend that extracts the readable text of a web page.
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    /// Fetches `url` and returns its extracted text.
    ///
    /// # Errors
    ///
    /// Returns an error when no backend is configured, the request fails,
    /// or the page yields no text.
    async fn scrape(&self, url: &str) -> Result<String, ProviderError>;
}

/// Scrapes `urls` in batches of `batch_size`, keeping successes in input
/// order. Failures are logged and dropped; research degrades gracefully
/// when some pages cannot be read.
pub async fn scrape_many(
    provider: &dyn ScrapeProvider,
    urls: &[String],
    batch_size: usize,
) -> Vec<ScrapedSource> {
    let mut sources = Vec::new();
    for chunk in urls.chunks(batch_size.max(1)) {
        let fetches = chunk.iter().map(|url| provider.scrape(url));
        for (url, outcome) in chunk.iter().zip(join_all(fetches).await) {
            match outcome {
                Ok(text) => sources.push(ScrapedSource {
                    url: url.clone(),
                    text,
                }),
                Err(err) => warn!(url = %url, error = %err, "skipping unreadable source"),
            }
        }
    }
    sources
}

/// Configuration for the scraper backend.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
}

impl ScrapeConfig {
    /// Reads configuration from the environment.
    ///
    /// Returns `None` when `PRACTICE_SCRAPER_BASE_URL` is unset or empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PRACTICE_SCRAPER_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url })
    }
}

/// [`ScrapeProvider`] over an HTTP extraction service.
#[derive(Debug, Clone)]
pub struct HttpScrapeProvider {
    client: Client,
    config: Option<ScrapeConfig>,
}

impl HttpScrapeProvider {
    #[must_use]
    pub fn new(config: Option<ScrapeConfig>) -> Self {
        let client = Client::builder()
            .timeout(SCRAPE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// Provider configured from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ScrapeConfig::from_env())
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ScrapeProvider for HttpScrapeProvider {
    #[instrument(skip(self))]
    async fn scrape(&self, url: &str) -> Result<String, ProviderError> {
        let config = self.config.as_ref().ok_or(ProviderError::Disabled)?;
        let request = ScrapeRequest {
            url: url.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/scrape", config.base_url))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }

        let parsed: ScrapeResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(ProviderError::MalformedResponse(error));
        }
        let text = parsed.text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct ScrapeRequest {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
