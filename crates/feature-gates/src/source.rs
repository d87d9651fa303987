//! Upstream document sources
//!
//! The schedule wiki is fetched as raw markdown; the proposal directory is a
//! GitHub contents listing. Both sit behind [`DocumentSource`] so the engine
//! can run against in-memory fixtures.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("feature-gate-sync/", env!("CARGO_PKG_VERSION"));

/// Failure fetching an upstream document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response body from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    #[serde(rename = "html_url")]
    pub browsable_url: String,
}

/// Source of the schedule document and the proposal listing
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch `url` as text
    async fn text_document(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch a directory listing at `url`
    async fn listing(&self, url: &str) -> Result<Vec<ListingEntry>, FetchError>;
}

/// [`DocumentSource`] backed by plain HTTP GETs
#[derive(Clone)]
pub struct HttpDocumentSource {
    client: reqwest::Client,
}

impl HttpDocumentSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "Fetched upstream document");
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn text_document(&self, url: &str) -> Result<String, FetchError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })
    }

    async fn listing(&self, url: &str) -> Result<Vec<ListingEntry>, FetchError> {
        let body = self.text_document(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
