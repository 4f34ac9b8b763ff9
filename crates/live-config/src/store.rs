//! Local persistence of the last good flat keyword list.

use chrono::{DateTime, TimeZone, Utc};
use engine_core::{FlatKeywords, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// On-disk shape: `{"last_update_ts": <unix seconds>, "keywords": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredKeywords {
    last_update_ts: f64,
    keywords: Vec<String>,
}

/// JSON file holding the flat keyword list between restarts.
#[derive(Debug, Clone)]
pub struct KeywordStore {
    path: PathBuf,
}

impl KeywordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when the file is missing, unreadable or holds no keywords.
    pub fn load(&self) -> Option<(FlatKeywords, DateTime<Utc>)> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No stored keywords");
                return None;
            }
        };

        let stored: StoredKeywords = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt keyword store");
                return None;
            }
        };

        let keywords = FlatKeywords::new(stored.keywords);
        if keywords.is_empty() {
            return None;
        }

        let millis = (stored.last_update_ts * 1000.0) as i64;
        let updated_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Some((keywords, updated_at))
    }

    pub fn save(&self, keywords: &FlatKeywords, updated_at: DateTime<Utc>) -> Result<()> {
        let stored = StoredKeywords {
            last_update_ts: updated_at.timestamp_millis() as f64 / 1000.0,
            keywords: keywords.as_slice().to_vec(),
        };
        let body = serde_json::to_vec(&stored)?;

        // Write-then-rename keeps readers from seeing a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
