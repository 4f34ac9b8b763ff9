//! Plain HTTP GET access to the remote configuration endpoints.

use async_trait::async_trait;
use engine_core::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Fetches a remote document as text.
///
/// The resolver only sees this trait, so tests can serve canned documents.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// `reqwest`-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching remote configuration");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::config_fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::config_fetch(url, format!("status {}", status)));
        }

        response.text().await.map_err(|e| Error::config_fetch(url, e))
    }
}
