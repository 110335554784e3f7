use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub body: Bytes,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(body: Bytes, ttl: Duration) -> Self {
        Self {
            body,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Valid only while `now < stored_at + ttl`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.stored_at + self.ttl
    }
}
