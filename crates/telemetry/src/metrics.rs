//! In-process metrics.
//!
//! Lock-free atomics for the hot paths, a small mutex-guarded map for
//! labelled counts (per source, per keyword strategy).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can go up or down. Never wraps below zero.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Counter split by a string label.
#[derive(Debug, Default)]
pub struct LabeledCounter(Mutex<BTreeMap<String, u64>>);

impl LabeledCounter {
    pub fn inc(&self, label: &str) {
        *self.0.lock().entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, label: &str) -> u64 {
        self.0.lock().get(label).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.0.lock().clone()
    }
}

/// Latency histogram in milliseconds.
///
/// Buckets are sized for downstream calls that may take minutes.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; 10],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 10] = [
        10, 50, 100, 500, 1_000, 5_000, 15_000, 30_000, 60_000, 150_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum.load(Ordering::Relaxed) as f64 / n as f64,
        }
    }

    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the harvest engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingress
    pub items_received: Counter,
    pub items_rejected: Counter,
    pub items_queued: Counter,
    pub items_by_source: LabeledCounter,

    // Batching
    pub batches_formed: Counter,
    pub batches_dispatched: Counter,
    pub batch_dispatch_errors: Counter,
    pub batches_dropped: Counter,
    pub dispatch_latency_ms: Histogram,
    pub queue_depth: Gauge,
    pub batch_buffer_depth: Gauge,
    pub pending_items: Gauge,

    // Worker pool
    pub workers_spawned: Counter,
    pub workers_completed: Counter,
    pub workers_failed: Counter,
    pub live_workers: Gauge,
    pub keywords_by_strategy: LabeledCounter,

    // Remote configuration
    pub config_fetches: Counter,
    pub config_fetch_failures: Counter,
    pub config_fallbacks: Counter,

    // Supervision
    pub supervisor_restarts: LabeledCounter,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            items_received: self.items_received.get(),
            items_rejected: self.items_rejected.get(),
            items_queued: self.items_queued.get(),
            items_by_source: self.items_by_source.snapshot(),
            batches_formed: self.batches_formed.get(),
            batches_dispatched: self.batches_dispatched.get(),
            batch_dispatch_errors: self.batch_dispatch_errors.get(),
            batches_dropped: self.batches_dropped.get(),
            dispatch_latency_mean_ms: self.dispatch_latency_ms.mean(),
            queue_depth: self.queue_depth.get(),
            batch_buffer_depth: self.batch_buffer_depth.get(),
            pending_items: self.pending_items.get(),
            workers_spawned: self.workers_spawned.get(),
            workers_completed: self.workers_completed.get(),
            workers_failed: self.workers_failed.get(),
            live_workers: self.live_workers.get(),
            keywords_by_strategy: self.keywords_by_strategy.snapshot(),
            config_fetches: self.config_fetches.get(),
            config_fetch_failures: self.config_fetch_failures.get(),
            config_fallbacks: self.config_fallbacks.get(),
            supervisor_restarts: self.supervisor_restarts.snapshot(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub items_received: u64,
    pub items_rejected: u64,
    pub items_queued: u64,
    pub items_by_source: BTreeMap<String, u64>,
    pub batches_formed: u64,
    pub batches_dispatched: u64,
    pub batch_dispatch_errors: u64,
    pub batches_dropped: u64,
    pub dispatch_latency_mean_ms: f64,
    pub queue_depth: u64,
    pub batch_buffer_depth: u64,
    pub pending_items: u64,
    pub workers_spawned: u64,
    pub workers_completed: u64,
    pub workers_failed: u64,
    pub live_workers: u64,
    pub keywords_by_strategy: BTreeMap<String, u64>,
    pub config_fetches: u64,
    pub config_fetch_failures: u64,
    pub config_fallbacks: u64,
    pub supervisor_restarts: BTreeMap<String, u64>,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
