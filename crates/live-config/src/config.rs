//! Remote configuration settings.

use engine_core::limits::{
    FETCH_RETRY_ATTEMPTS, FLAT_KEYWORDS_TTL, KEYWORD_CATALOG_TTL, SOURCES_CONFIG_TTL,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the remote documents live and how long they stay fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfigSettings {
    /// Concurrency, fetch parameters, language map and keyword cursor
    #[serde(default = "default_sources_url")]
    pub sources_url: String,
    /// topic → language → keywords catalog
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// Comma-delimited flat keyword list
    #[serde(default = "default_keywords_url")]
    pub keywords_url: String,
    /// Local file persisting the last good flat keyword list
    #[serde(default = "default_keyword_store_path")]
    pub keyword_store_path: PathBuf,
    #[serde(default = "default_sources_ttl_secs")]
    pub sources_ttl_secs: u64,
    #[serde(default = "default_catalog_ttl_secs")]
    pub catalog_ttl_secs: u64,
    #[serde(default = "default_keywords_ttl_secs")]
    pub keywords_ttl_secs: u64,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts before falling back
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Attempt `i` (0-based) waits `i² × retry_unit_ms` first
    #[serde(default = "default_retry_unit_ms")]
    pub retry_unit_ms: u64,
}

fn default_sources_url() -> String {
    "https://raw.githubusercontent.com/exorde-labs/TestnetProtocol/main/targets/modules_configuration_v2.json".to_string()
}

fn default_catalog_url() -> String {
    "https://raw.githubusercontent.com/exorde-labs/TestnetProtocol/main/targets/topic_lang_keywords.json".to_string()
}

fn default_keywords_url() -> String {
    "https://raw.githubusercontent.com/exorde-labs/TestnetProtocol/main/targets/keywords.txt"
        .to_string()
}

fn default_keyword_store_path() -> PathBuf {
    PathBuf::from("keywords.json")
}

fn default_sources_ttl_secs() -> u64 {
    SOURCES_CONFIG_TTL.as_secs()
}

fn default_catalog_ttl_secs() -> u64 {
    KEYWORD_CATALOG_TTL.as_secs()
}

fn default_keywords_ttl_secs() -> u64 {
    FLAT_KEYWORDS_TTL.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    FETCH_RETRY_ATTEMPTS
}

fn default_retry_unit_ms() -> u64 {
    1000
}

impl Default for LiveConfigSettings {
    fn default() -> Self {
        Self {
            sources_url: default_sources_url(),
            catalog_url: default_catalog_url(),
            keywords_url: default_keywords_url(),
            keyword_store_path: default_keyword_store_path(),
            sources_ttl_secs: default_sources_ttl_secs(),
            catalog_ttl_secs: default_catalog_ttl_secs(),
            keywords_ttl_secs: default_keywords_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_unit_ms: default_retry_unit_ms(),
        }
    }
}

impl LiveConfigSettings {
    pub fn sources_ttl(&self) -> Duration {
        Duration::from_secs(self.sources_ttl_secs)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn keywords_ttl(&self) -> Duration {
        Duration::from_secs(self.keywords_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_unit(&self) -> Duration {
        Duration::from_millis(self.retry_unit_ms)
    }

    /// Names the first endpoint that is not an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("sources_url", &self.sources_url),
            ("catalog_url", &self.catalog_url),
            ("keywords_url", &self.keywords_url),
        ] {
            match url::Url::parse(value) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
                _ => return Err(format!("{} is not an http(s) URL: {}", name, value)),
            }
        }
        Ok(())
    }
}
