use std::time::Duration;

use serde::Deserialize;

// =======================================================
// RESPONSE CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied to every cached route. `0` disables caching.
    pub ttl_secs: i64,
    /// How often expired entries are purged. `0` disables the reaper.
    pub reap_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 120,
            reap_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn reap_interval(&self) -> Option<Duration> {
        (self.reap_interval_secs > 0).then(|| Duration::from_secs(self.reap_interval_secs))
    }
}
