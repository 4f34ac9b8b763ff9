//! The configuration resolver.
//!
//! Three remote documents are served through one resolution path:
//!
//! | document | TTL | fallback |
//! |---|---|---|
//! | sources configuration | 60 s | empty configuration |
//! | keyword catalog | 1 h | empty catalog |
//! | flat keywords | 5 min | local store, then built-in list |
//!
//! A fallback is cached as already expired, so callers get it immediately
//! and the next read retries in the background.

use crate::cache::{CacheRead, Cached, TtlCell};
use crate::config::LiveConfigSettings;
use crate::fetcher::{HttpFetcher, RemoteFetcher};
use crate::overrides::ConcurrencyOverrides;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::store::KeywordStore;
use engine_core::{
    ConcurrencyConfig, Error, FetchParameters, FlatKeywords, KeywordCatalog, Result,
    SharedClock, SourceModule, SourcesConfiguration, SystemClock,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use telemetry::{health, metrics};
use tracing::{debug, info, warn};

type LoadFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// How one remote document is cached, loaded and replaced on failure.
struct Document<T: 'static> {
    name: &'static str,
    cell: fn(&Inner) -> &TtlCell<T>,
    load: for<'a> fn(&'a Inner) -> LoadFuture<'a, T>,
    fallback: fn(&Inner) -> T,
}

impl<T: 'static> Clone for Document<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Document<T> {}

const SOURCES: Document<SourcesConfiguration> = Document {
    name: "sources_configuration",
    cell: sources_cell,
    load: load_sources,
    fallback: |_| SourcesConfiguration::default(),
};

const CATALOG: Document<KeywordCatalog> = Document {
    name: "keyword_catalog",
    cell: catalog_cell,
    load: load_catalog,
    fallback: |_| KeywordCatalog::default(),
};

const KEYWORDS: Document<FlatKeywords> = Document {
    name: "flat_keywords",
    cell: keywords_cell,
    load: load_keywords,
    fallback: stored_or_default_keywords,
};

fn sources_cell(inner: &Inner) -> &TtlCell<SourcesConfiguration> {
    &inner.sources
}

fn catalog_cell(inner: &Inner) -> &TtlCell<KeywordCatalog> {
    &inner.catalog
}

fn keywords_cell(inner: &Inner) -> &TtlCell<FlatKeywords> {
    &inner.keywords
}

fn stored_or_default_keywords(inner: &Inner) -> FlatKeywords {
    inner
        .store
        .load()
        .map(|(keywords, _)| keywords)
        .unwrap_or_else(FlatKeywords::defaults)
}

fn load_sources(inner: &Inner) -> LoadFuture<'_, SourcesConfiguration> {
    Box::pin(async move {
        let body = inner.fetch(&inner.settings.sources_url).await?;
        Ok(serde_json::from_str(&body)?)
    })
}

fn load_catalog(inner: &Inner) -> LoadFuture<'_, KeywordCatalog> {
    Box::pin(async move {
        let body = inner.fetch(&inner.settings.catalog_url).await?;
        Ok(serde_json::from_str(&body)?)
    })
}

fn load_keywords(inner: &Inner) -> LoadFuture<'_, FlatKeywords> {
    Box::pin(async move {
        let url = &inner.settings.keywords_url;
        let keywords = FlatKeywords::parse(&inner.fetch(url).await?);
        if keywords.is_empty() {
            return Err(Error::config_fetch(url, "keyword list is empty"));
        }

        if let Err(e) = inner.store.save(&keywords, inner.clock.now()) {
            warn!(path = %inner.store.path().display(), error = %e, "Failed to persist keywords");
        }
        Ok(keywords)
    })
}

struct Inner {
    settings: LiveConfigSettings,
    fetcher: Arc<dyn RemoteFetcher>,
    clock: SharedClock,
    overrides: ConcurrencyOverrides,
    store: KeywordStore,
    retry: RetryPolicy,
    sources: TtlCell<SourcesConfiguration>,
    catalog: TtlCell<KeywordCatalog>,
    keywords: TtlCell<FlatKeywords>,
}

impl Inner {
    async fn fetch(&self, url: &str) -> Result<String> {
        fetch_with_retry(self.fetcher.as_ref(), url, self.retry).await
    }

    async fn resolve<T: Send + Sync + 'static>(self: &Arc<Self>, doc: Document<T>) -> Cached<T> {
        let cell = (doc.cell)(self);

        match cell.read(self.clock.now()) {
            CacheRead::Fresh(cached) => cached,
            CacheRead::Stale(cached) => {
                self.spawn_refresh(doc);
                cached
            }
            CacheRead::Empty => {
                let _guard = cell.lock_cold_load().await;
                // Another caller may have finished the cold load while we waited.
                if let CacheRead::Fresh(cached) | CacheRead::Stale(cached) =
                    cell.read(self.clock.now())
                {
                    return cached;
                }

                match self.load(doc).await {
                    Some(cached) => cached,
                    None => {
                        metrics().config_fallbacks.inc();
                        cell.store_expired((doc.fallback)(self), self.clock.now())
                    }
                }
            }
        }
    }

    async fn load<T: 'static>(&self, doc: Document<T>) -> Option<Cached<T>> {
        match (doc.load)(self).await {
            Ok(value) => {
                debug!(document = doc.name, "Remote document refreshed");
                health().remote_config.set_healthy();
                Some((doc.cell)(self).store(value, self.clock.now()))
            }
            Err(e) => {
                warn!(document = doc.name, error = %e, "Remote document unavailable");
                health()
                    .remote_config
                    .set_unhealthy(format!("{} unavailable: {}", doc.name, e));
                None
            }
        }
    }

    fn spawn_refresh<T: Send + Sync + 'static>(self: &Arc<Self>, doc: Document<T>) {
        if !(doc.cell)(self).begin_refresh() {
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.load(doc).await;
            (doc.cell)(&inner).end_refresh();
        });
    }
}

/// Memoizing facade over the remote configuration documents.
///
/// Cheap to clone; all clones share one set of caches.
#[derive(Clone)]
pub struct ConfigResolver {
    inner: Arc<Inner>,
}

impl ConfigResolver {
    /// Builds a resolver that talks HTTP and reads overrides from the environment.
    pub fn new<'a>(
        settings: LiveConfigSettings,
        known_sources: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let fetcher = HttpFetcher::new(settings.request_timeout())?;
        let overrides = ConcurrencyOverrides::from_env(known_sources);
        Ok(Self::with_parts(
            settings,
            Arc::new(fetcher),
            Arc::new(SystemClock),
            overrides,
        ))
    }

    /// Builds a resolver from explicit collaborators.
    ///
    /// The flat keyword cache is seeded from the local store, keeping the
    /// store's timestamp so an old file is treated as stale.
    pub fn with_parts(
        settings: LiveConfigSettings,
        fetcher: Arc<dyn RemoteFetcher>,
        clock: SharedClock,
        overrides: ConcurrencyOverrides,
    ) -> Self {
        let store = KeywordStore::new(settings.keyword_store_path.clone());
        let keywords = TtlCell::new(settings.keywords_ttl());
        if let Some((stored, updated_at)) = store.load() {
            info!(count = stored.len(), updated_at = %updated_at, "Seeded keywords from local store");
            keywords.store(stored, updated_at);
        }

        let inner = Inner {
            retry: RetryPolicy::new(settings.retry_attempts, settings.retry_unit()),
            sources: TtlCell::new(settings.sources_ttl()),
            catalog: TtlCell::new(settings.catalog_ttl()),
            keywords,
            store,
            settings,
            fetcher,
            clock,
            overrides,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn settings(&self) -> &LiveConfigSettings {
        &self.inner.settings
    }

    pub async fn sources_configuration(&self) -> Arc<SourcesConfiguration> {
        self.inner.resolve(SOURCES).await.value
    }

    /// Desired workers per source: remote values, then environment overrides.
    pub async fn concurrency_config(&self) -> ConcurrencyConfig {
        let cached = self.inner.resolve(SOURCES).await;

        let mut desired: BTreeMap<String, u32> = cached
            .value
            .concurrency
            .iter()
            .map(|(key, n)| (source_id_of(key).to_string(), *n))
            .collect();
        for (id, n) in self.inner.overrides.iter() {
            desired.insert(id.to_string(), n);
        }

        ConcurrencyConfig {
            desired,
            fetched_at: cached.fetched_at,
        }
    }

    pub async fn keyword_catalog(&self) -> Arc<KeywordCatalog> {
        self.inner.resolve(CATALOG).await.value
    }

    pub async fn flat_keywords(&self) -> Arc<FlatKeywords> {
        self.inner.resolve(KEYWORDS).await.value
    }

    /// The per-tick view of one source.
    pub async fn source_module(&self, source_id: &str) -> SourceModule {
        let sources = self.sources_configuration().await;
        let concurrency = self.concurrency_config().await;
        SourceModule {
            id: source_id.to_string(),
            languages: sources.languages_for(source_id),
            desired_concurrency: concurrency.desired_for(source_id),
        }
    }

    /// Keyword, then generic, then source-specific parameters.
    pub async fn fetch_parameters(&self, source_id: &str, keyword: &str) -> FetchParameters {
        let sources = self.sources_configuration().await;
        FetchParameters::assemble(
            keyword,
            &sources.generic_parameters,
            sources.specific_parameters_for(source_id),
        )
    }

    /// Probes the sources endpoint once, bypassing the cache.
    pub async fn probe(&self) -> Result<()> {
        self.inner
            .fetcher
            .fetch_text(&self.inner.settings.sources_url)
            .await
            .map(|_| ())
    }
}

/// `https://host/owner/<id>` and `<id>` both name source `<id>`.
fn source_id_of(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}
