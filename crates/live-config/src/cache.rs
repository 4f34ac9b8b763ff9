//! Single-value TTL cache with stale-while-revalidate reads.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A cached value and the moment it was fetched.
#[derive(Debug)]
pub struct Cached<T> {
    pub value: Arc<T>,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
        }
    }
}

/// Outcome of a cache read at a given instant.
#[derive(Debug)]
pub enum CacheRead<T> {
    Fresh(Cached<T>),
    Stale(Cached<T>),
    Empty,
}

/// Holds at most one value per remote document.
///
/// Cold loads are serialized through `load_lock`; background refreshes are
/// deduplicated through the `refreshing` flag.
pub struct TtlCell<T> {
    ttl: ChronoDuration,
    slot: RwLock<Option<Cached<T>>>,
    refreshing: AtomicBool,
    load_lock: tokio::sync::Mutex<()>,
}

impl<T> TtlCell<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ChronoDuration::milliseconds(ttl.as_millis().min(i64::MAX as u128) as i64),
            slot: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Fresh while `now - fetched_at < ttl`.
    pub fn read(&self, now: DateTime<Utc>) -> CacheRead<T> {
        match self.slot.read().as_ref() {
            None => CacheRead::Empty,
            Some(cached) if now - cached.fetched_at < self.ttl => CacheRead::Fresh(cached.clone()),
            Some(cached) => CacheRead::Stale(cached.clone()),
        }
    }

    pub fn store(&self, value: T, fetched_at: DateTime<Utc>) -> Cached<T> {
        let cached = Cached {
            value: Arc::new(value),
            fetched_at,
        };
        *self.slot.write() = Some(cached.clone());
        cached
    }

    /// Stores a fallback that is already past its TTL, so the next read
    /// serves it and kicks off a refresh.
    pub fn store_expired(&self, value: T, now: DateTime<Utc>) -> Cached<T> {
        self.store(value, now - self.ttl)
    }

    /// Claims the single background refresh slot.
    pub fn begin_refresh(&self) -> bool {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_refresh(&self) {
        self.refreshing.store(false, Ordering::Release);
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub(crate) async fn lock_cold_load(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.load_lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_then_stale() {
        let cell = TtlCell::new(Duration::from_secs(60));
        let t0 = Utc::now();
        assert!(matches!(cell.read(t0), CacheRead::Empty));

        cell.store(7u32, t0);
        match cell.read(t0 + ChronoDuration::seconds(59)) {
            CacheRead::Fresh(c) => assert_eq!(*c.value, 7),
            other => panic!("expected fresh, got {:?}", other),
        }
        assert!(matches!(
            cell.read(t0 + ChronoDuration::seconds(60)),
            CacheRead::Stale(_)
        ));
    }

    #[test]
    fn test_expired_store_reads_stale() {
        let cell = TtlCell::new(Duration::from_secs(60));
        let now = Utc::now();
        cell.store_expired("fallback", now);
        assert!(matches!(cell.read(now), CacheRead::Stale(_)));
    }

    #[test]
    fn test_single_refresh_claim() {
        let cell: TtlCell<u8> = TtlCell::new(Duration::from_secs(1));
        assert!(cell.begin_refresh());
        assert!(!cell.begin_refresh());
        cell.end_refresh();
        assert!(cell.begin_refresh());
    }
}
