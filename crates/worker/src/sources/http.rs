//! Generic HTTP feed source.
//!
//! GETs the configured endpoint with the fetch parameters as query string
//! and yields the items of the returned JSON array, one per pull.

use crate::source::{ItemStream, Source, VecStream};
use async_trait::async_trait;
use engine_core::{Error, FetchParameters, Item, LanguageCapability, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One `[[sources]]` entry in the service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistration {
    pub id: String,
    pub endpoint: String,
    /// ISO codes, or `["all"]`
    #[serde(default)]
    pub languages: Vec<String>,
}

pub struct HttpFeedSource {
    id: String,
    endpoint: String,
    languages: LanguageCapability,
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(registration: &SourceRegistration, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        let languages = if registration.languages.is_empty() {
            LanguageCapability::All
        } else {
            LanguageCapability::from_codes(&registration.languages)
        };

        Ok(Self {
            id: registration.id.clone(),
            endpoint: registration.endpoint.clone(),
            languages,
            client,
        })
    }
}

#[async_trait]
impl Source for HttpFeedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn languages(&self) -> LanguageCapability {
        self.languages.clone()
    }

    async fn query(&self, parameters: FetchParameters) -> Result<Box<dyn ItemStream>> {
        let fault = |e: &dyn std::fmt::Display| Error::worker_fault(&self.id, e);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&parameters.query_pairs())
            .send()
            .await
            .map_err(|e| fault(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fault(&format!("feed returned status {}", status)));
        }

        let values: Vec<serde_json::Value> = response.json().await.map_err(|e| fault(&e))?;
        let total = values.len();
        let items: Vec<Item> = values
            .into_iter()
            .filter_map(|value| match Item::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(source = %self.id, error = %e, "Skipping malformed feed item");
                    None
                }
            })
            .collect();

        debug!(source = %self.id, total, valid = items.len(), "Feed queried");
        Ok(Box::new(VecStream::new(items)))
    }
}
