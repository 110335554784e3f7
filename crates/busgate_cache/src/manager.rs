use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::{entry::CacheEntry, key::CacheKey, store::MemoryCacheStore};

/// Response cache seam used by the dispatcher.
///
/// Implementations must be safe to share between concurrent requests and must
/// never hand out an expired body.
pub trait Cache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Bytes>;

    /// Stores or replaces `key`. A zero `ttl` stores nothing.
    fn put(&self, key: CacheKey, body: Bytes, ttl: Duration);
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    store: MemoryCacheStore,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            store: MemoryCacheStore::new(),
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Cache for ResponseCache {
    fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let entry = self.store.get(key)?;
        trace!(target: "busgate::cache", %key, "cache hit");
        Some(entry.body)
    }

    fn put(&self, key: CacheKey, body: Bytes, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        trace!(
            target: "busgate::cache",
            %key,
            ttl_secs = ttl.as_secs(),
            bytes = body.len(),
            "cache store"
        );
        self.store.insert(key, CacheEntry::new(body, ttl));
    }
}

/// Periodically drops expired entries so unused keys do not linger.
pub fn spawn_reaper(cache: Arc<ResponseCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(
                    target: "busgate::cache",
                    removed,
                    remaining = cache.len(),
                    "Reaped expired cache entries"
                );
            }
        }
    })
}
