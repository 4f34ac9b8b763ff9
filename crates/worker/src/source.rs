//! The source capability and the static registry of implementations.

use async_trait::async_trait;
use engine_core::{Error, FetchParameters, Item, LanguageCapability, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::info;

/// Result of one pull from a source's item sequence.
#[derive(Debug)]
pub enum Pull {
    Item(Item),
    Exhausted,
    Error(Error),
}

/// A source-provided item sequence.
#[async_trait]
pub trait ItemStream: Send {
    async fn pull(&mut self) -> Pull;
}

/// An external content origin.
#[async_trait]
pub trait Source: Send + Sync {
    fn id(&self) -> &str;

    /// Languages the source can search in, used when the remote language
    /// map has no entry for it.
    fn languages(&self) -> LanguageCapability {
        LanguageCapability::All
    }

    async fn query(&self, parameters: FetchParameters) -> Result<Box<dyn ItemStream>>;
}

/// An already materialized sequence.
#[derive(Debug, Default)]
pub struct VecStream(VecDeque<Item>);

impl VecStream {
    pub fn new(items: impl IntoIterator<Item = Item>) -> Self {
        Self(items.into_iter().collect())
    }
}

#[async_trait]
impl ItemStream for VecStream {
    async fn pull(&mut self) -> Pull {
        match self.0.pop_front() {
            Some(item) => Pull::Item(item),
            None => Pull::Exhausted,
        }
    }
}

/// Source id → implementation, built once at startup.
#[derive(Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations replace earlier ones with the same id.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Source>> {
        self.sources.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Looks up every requested id; an empty request selects all sources.
    ///
    /// An unknown id is an error, never silently skipped.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<dyn Source>>> {
        if ids.is_empty() {
            return Ok(self.sources.values().cloned().collect());
        }

        let resolved = ids
            .iter()
            .map(|id| self.get(id).ok_or_else(|| Error::unknown_source(id)))
            .collect::<Result<Vec<_>>>()?;

        info!(count = resolved.len(), "Resolved enabled sources");
        Ok(resolved)
    }
}
