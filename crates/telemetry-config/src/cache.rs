//! Generic TTL-refreshed cache cell (spec §9 "Global caches → owned
//! singletons with lifecycle"): initialize-on-first-use, refresh when stale,
//! explicit `invalidate` for post-config-change reloads. No hidden
//! reinitialization on tick boundaries — a cache only refreshes when a
//! caller asks for its value and the TTL has elapsed.

use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Slot<T> {
    value: T,
    fetched_at: Instant,
}

pub struct TtlCache<T: Clone> {
    ttl: Duration,
    slot: RwLock<Option<Slot<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: RwLock::new(None) }
    }

    /// Current value if present and not yet stale.
    pub async fn get(&self) -> Option<T> {
        let guard = self.slot.read().await;
        guard
            .as_ref()
            .filter(|s| s.fetched_at.elapsed() < self.ttl)
            .map(|s| s.value.clone())
    }

    /// Return the cached value if fresh, otherwise call `refresh` and cache
    /// the result. `refresh` may run more than once under concurrent misses;
    /// that's acceptable since refreshes are idempotent reads.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if let Some(v) = self.get().await {
            return v;
        }
        let fresh = refresh().await;
        let mut guard = self.slot.write().await;
        *guard = Some(Slot { value: fresh.clone(), fetched_at: Instant::now() });
        fresh
    }

    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn refreshes_only_after_ttl_elapses() {
        let cache = TtlCache::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let v = cache.get_or_refresh(|| async move {
            c.fetch_add(1, Ordering::SeqCst);
            42
        }).await;
        assert_eq!(v, 42);
        let c = calls.clone();
        let v2 = cache.get_or_refresh(|| async move {
            c.fetch_add(1, Ordering::SeqCst);
            99
        }).await;
        assert_eq!(v2, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_next_refresh() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.get_or_refresh(|| async { 1 }).await;
        cache.invalidate().await;
        let v = cache.get_or_refresh(|| async { 2 }).await;
        assert_eq!(v, 2);
    }
}
