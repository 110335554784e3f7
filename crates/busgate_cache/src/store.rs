use dashmap::DashMap;
use tokio::time::Instant;

use crate::entry::CacheEntry;
use crate::key::CacheKey;

/// Sharded map of live entries. Inserts replace the whole entry.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Returns the entry only if it has not expired; expired entries are dropped.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Instant::now();
        let entry = self.inner.get(key)?;
        if !entry.is_expired_at(now) {
            return Some(entry.clone());
        }
        drop(entry);
        // Re-check under the shard lock so a concurrent fresh put survives.
        self.inner.remove_if(key, |_, e| e.is_expired_at(now));
        None
    }

    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        self.inner.insert(key, entry);
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.inner.retain(|_, e| {
            let keep = !e.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Physical entry count, expired-but-unreaped entries included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
