//! Remote configuration for the harvest engine.
//!
//! Every getter is a memoizing facade over a remote document:
//! - fresh cache → returned as is
//! - stale cache → returned immediately, one background refresh started
//! - empty cache → fetched with bounded retries, falling back when that fails

pub mod cache;
pub mod config;
pub mod fetcher;
pub mod health;
pub mod overrides;
pub mod resolver;
pub mod retry;
pub mod store;

pub use config::LiveConfigSettings;
pub use fetcher::{HttpFetcher, RemoteFetcher};
pub use overrides::ConcurrencyOverrides;
pub use resolver::ConfigResolver;
pub use store::KeywordStore;
