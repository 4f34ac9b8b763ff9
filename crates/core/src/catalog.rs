//! Keyword catalog and the flat keyword list.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Used when neither the network nor the local store yields a list.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "bitcoin",
    "ethereum",
    "eth",
    "btc",
    "usdt",
    "usdc",
    "stablecoin",
    "defi",
    "finance",
    "liquidity",
    "token",
    "economy",
    "markets",
    "stocks",
    "crisis",
];

/// topic → language → ordered keywords. Some language lists may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordCatalog(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl KeywordCatalog {
    pub fn new(topics: BTreeMap<String, BTreeMap<String, Vec<String>>>) -> Self {
        Self(topics)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Topics whose language map has at least one entry.
    pub fn topics(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, langs)| !langs.is_empty())
            .map(|(topic, _)| topic.as_str())
            .collect()
    }

    /// Languages of `topic` that carry at least one keyword.
    pub fn translated_languages(&self, topic: &str) -> Vec<&str> {
        self.0
            .get(topic)
            .map(|langs| {
                langs
                    .iter()
                    .filter(|(_, kws)| !kws.is_empty())
                    .map(|(lang, _)| lang.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn keywords(&self, topic: &str, language: &str) -> &[String] {
        self.0
            .get(topic)
            .and_then(|langs| langs.get(language))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Flat keyword pool for the uniform strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatKeywords(Vec<String>);

static UNICODE_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\u[\da-fA-F]{4}").expect("valid regex"));

impl FlatKeywords {
    pub fn new(keywords: Vec<String>) -> Self {
        Self(keywords)
    }

    pub fn defaults() -> Self {
        Self(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }

    /// Parses the comma-delimited text served by the keywords endpoint.
    ///
    /// Newlines are dropped, entries trimmed, `\uXXXX` escapes stripped and
    /// empty entries discarded.
    pub fn parse(text: &str) -> Self {
        let keywords = text
            .replace(['\n', '\r'], "")
            .split(',')
            .map(|s| UNICODE_ESCAPE.replace_all(s.trim(), "").into_owned())
            .filter(|s| !s.is_empty())
            .collect();
        Self(keywords)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.iter().any(|k| k == keyword)
    }
}

/// Which selection strategy produced a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordStrategy {
    /// Translated keyword from a topic in a language the source supports.
    TopicLanguage,
    /// No shared language; the topic name itself.
    Topic,
    /// Uniform pick from the flat list.
    Uniform,
}

impl KeywordStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopicLanguage => "topic_language",
            Self::Topic => "topic",
            Self::Uniform => "uniform",
        }
    }
}

impl fmt::Display for KeywordStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selected keyword and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub value: String,
    pub strategy: KeywordStrategy,
}
