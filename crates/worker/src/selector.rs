//! Keyword selection.
//!
//! A roll `r` in `0..100` is compared with the remote cursor. When
//! `r < cursor` the topic-language path runs:
//!
//! 1. random topic with a non-empty language map
//! 2. its translated languages ∩ the source's languages
//! 3. random language from the intersection, then a random keyword
//!
//! An empty intersection yields the topic name itself. Otherwise, or when
//! the catalog has nothing to offer, a keyword is drawn uniformly from the
//! flat list.

use engine_core::{
    FlatKeywords, Keyword, KeywordCatalog, KeywordStrategy, LanguageCapability, DEFAULT_KEYWORDS,
};
use live_config::ConfigResolver;
use rand::seq::SliceRandom;
use rand::Rng;
use telemetry::metrics;
use tracing::debug;

#[derive(Clone)]
pub struct KeywordSelector {
    resolver: ConfigResolver,
}

impl KeywordSelector {
    pub fn new(resolver: ConfigResolver) -> Self {
        Self { resolver }
    }

    /// Always yields a keyword.
    pub async fn choose_keyword(&self, source_id: &str, languages: &LanguageCapability) -> Keyword {
        let cursor = self.resolver.sources_configuration().await.keyword_cursor;
        let roll = rand::thread_rng().gen_range(0..100u8);

        let mut keyword = None;
        if takes_topic_path(roll, cursor) {
            let catalog = self.resolver.keyword_catalog().await;
            keyword = topic_language(&mut rand::thread_rng(), &catalog, languages);
        }
        let keyword = match keyword {
            Some(keyword) => keyword,
            None => {
                let flat = self.resolver.flat_keywords().await;
                uniform(&mut rand::thread_rng(), &flat)
            }
        };

        metrics().keywords_by_strategy.inc(keyword.strategy.as_str());
        debug!(
            source = %source_id,
            keyword = %keyword.value,
            strategy = %keyword.strategy,
            roll,
            cursor,
            "Keyword chosen"
        );
        keyword
    }
}

fn takes_topic_path(roll: u8, cursor: u8) -> bool {
    roll < cursor
}

/// The whole algorithm over already-resolved inputs.
pub fn choose_from<R: Rng + ?Sized>(
    rng: &mut R,
    cursor: u8,
    languages: &LanguageCapability,
    catalog: &KeywordCatalog,
    flat: &FlatKeywords,
) -> Keyword {
    let roll = rng.gen_range(0..100u8);
    if takes_topic_path(roll, cursor) {
        if let Some(keyword) = topic_language(rng, catalog, languages) {
            return keyword;
        }
    }
    uniform(rng, flat)
}

/// `None` only when the catalog has no usable topic.
pub fn topic_language<R: Rng + ?Sized>(
    rng: &mut R,
    catalog: &KeywordCatalog,
    languages: &LanguageCapability,
) -> Option<Keyword> {
    let topic = *catalog.topics().choose(rng)?;

    let shared: Vec<&str> = catalog
        .translated_languages(topic)
        .into_iter()
        .filter(|lang| languages.supports(lang))
        .collect();

    let Some(language) = shared.choose(rng) else {
        return Some(Keyword {
            value: topic.to_string(),
            strategy: KeywordStrategy::Topic,
        });
    };

    let keyword = catalog.keywords(topic, language).choose(rng)?;
    Some(Keyword {
        value: keyword.clone(),
        strategy: KeywordStrategy::TopicLanguage,
    })
}

pub fn uniform<R: Rng + ?Sized>(rng: &mut R, flat: &FlatKeywords) -> Keyword {
    let value = flat
        .as_slice()
        .choose(rng)
        .cloned()
        .or_else(|| DEFAULT_KEYWORDS.choose(rng).map(|k| k.to_string()))
        .unwrap_or_else(|| "news".to_string());

    Keyword {
        value,
        strategy: KeywordStrategy::Uniform,
    }
}
