//! Sizes, timeouts and TTLs shared across the engine.
//!
//! These are defaults; most of them can be overridden through configuration.

use std::time::Duration;

// === Ingress Limits ===

/// Maximum serialized size of a single item (256KB).
pub const MAX_ITEM_SIZE_BYTES: usize = 256 * 1024;

/// Maximum request body accepted by the ingress endpoint (4MB).
pub const MAX_PAYLOAD_SIZE_BYTES: usize = 4 * 1024 * 1024;

/// Maximum items in a single ingress request.
pub const MAX_ITEMS_PER_REQUEST: usize = 500;

// === Batching ===

/// Items per batch before a flush is triggered.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Hard timeout for one downstream dispatch call.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(150);

// === Worker Pool ===

/// Periodic reconciliation tick.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded wait for one pull from a source.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(120);

/// Pause between two pulls of the same worker.
pub const DEFAULT_PULL_PAUSE: Duration = Duration::from_secs(5);

// === Remote Configuration ===

/// Sources configuration (concurrency, parameters, language map, cursor).
pub const SOURCES_CONFIG_TTL: Duration = Duration::from_secs(60);

/// Topic → language → keyword catalog.
pub const KEYWORD_CATALOG_TTL: Duration = Duration::from_secs(3600);

/// Flat keyword list (also persisted locally).
pub const FLAT_KEYWORDS_TTL: Duration = Duration::from_secs(300);

/// Attempts before a remote fetch gives up to the next fallback tier.
pub const FETCH_RETRY_ATTEMPTS: u32 = 10;
