//! Source modules and the remote sources configuration document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Wildcard language capability.
pub const ALL_LANGUAGES: &str = "all";

/// Languages a source can fetch content in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageCapability {
    /// Matches every topic language.
    All,
    /// ISO 639-1 codes.
    Languages(Vec<String>),
}

impl LanguageCapability {
    pub fn from_codes(codes: &[String]) -> Self {
        if codes.iter().any(|c| c == ALL_LANGUAGES) {
            Self::All
        } else {
            Self::Languages(codes.to_vec())
        }
    }

    pub fn supports(&self, language: &str) -> bool {
        match self {
            Self::All => true,
            Self::Languages(codes) => codes.iter().any(|c| c == language),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Languages(codes) if codes.is_empty())
    }
}

impl Default for LanguageCapability {
    fn default() -> Self {
        Self::Languages(Vec::new())
    }
}

/// A content origin as seen by the scheduler on one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceModule {
    pub id: String,
    pub languages: LanguageCapability,
    pub desired_concurrency: u32,
}

/// Desired live workers per source.
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub desired: BTreeMap<String, u32>,
    pub fetched_at: DateTime<Utc>,
}

impl ConcurrencyConfig {
    /// Sources absent from the map want zero workers.
    pub fn desired_for(&self, source_id: &str) -> u32 {
        self.desired.get(source_id).copied().unwrap_or(0)
    }
}

/// The remotely served sources configuration.
///
/// Parameter and language maps may be keyed either by the bare source id or by
/// a module path whose last segment is the id (`https://host/owner/<id>`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfiguration {
    #[serde(default)]
    pub concurrency: HashMap<String, u32>,
    #[serde(default, rename = "generic_modules_parameters")]
    pub generic_parameters: Map<String, Value>,
    #[serde(default, rename = "specific_modules_parameters")]
    pub specific_parameters: HashMap<String, Map<String, Value>>,
    #[serde(default)]
    pub lang_map: HashMap<String, Vec<String>>,
    /// Probability (0-100) of taking the topic-language keyword path.
    #[serde(
        default,
        rename = "new_keyword_alg",
        deserialize_with = "deserialize_cursor"
    )]
    pub keyword_cursor: u8,
    #[serde(default)]
    pub enabled_modules: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

fn deserialize_cursor<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(0, 100) as u8)
}

fn lookup<'a, V>(map: &'a HashMap<String, V>, source_id: &str) -> Option<&'a V> {
    map.get(source_id).or_else(|| {
        let suffix = format!("/{}", source_id);
        map.iter()
            .find(|(key, _)| key.trim_end_matches('/').ends_with(&suffix))
            .map(|(_, v)| v)
    })
}

impl SourcesConfiguration {
    pub fn specific_parameters_for(&self, source_id: &str) -> Option<&Map<String, Value>> {
        lookup(&self.specific_parameters, source_id)
    }

    pub fn languages_for(&self, source_id: &str) -> LanguageCapability {
        lookup(&self.lang_map, source_id)
            .map(|codes| LanguageCapability::from_codes(codes))
            .unwrap_or_default()
    }

    pub fn concurrency_for(&self, source_id: &str) -> Option<u32> {
        lookup(&self.concurrency, source_id).copied()
    }
}

/// Parameters handed to a source's `query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchParameters(Map<String, Value>);

impl FetchParameters {
    /// Keyword first, then generic parameters, then source-specific ones.
    /// Later layers override earlier keys.
    pub fn assemble(
        keyword: &str,
        generic: &Map<String, Value>,
        specific: Option<&Map<String, Value>>,
    ) -> Self {
        let mut params = Map::new();
        params.insert(
            "url_parameters".into(),
            serde_json::json!({ "keyword": keyword }),
        );
        params.insert("keyword".into(), Value::String(keyword.to_string()));

        for (k, v) in generic {
            params.insert(k.clone(), v.clone());
        }
        if let Some(specific) = specific {
            for (k, v) in specific {
                params.insert(k.clone(), v.clone());
            }
        }
        Self(params)
    }

    pub fn keyword(&self) -> Option<&str> {
        self.0.get("keyword").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Scalar parameters rendered as query string pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k.clone(), s.clone())),
                Value::Number(n) => Some((k.clone(), n.to_string())),
                Value::Bool(b) => Some((k.clone(), b.to_string())),
                _ => None,
            })
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}
