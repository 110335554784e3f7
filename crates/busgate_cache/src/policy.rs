use std::time::Duration;

use http::Method;

pub struct CachePolicy;

impl CachePolicy {
    pub fn is_cacheable(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD)
    }

    /// Converts a per-route TTL in whole seconds. `None` means "do not cache".
    pub fn ttl_from_secs(secs: i64) -> Option<Duration> {
        if secs <= 0 {
            None
        } else {
            Some(Duration::from_secs(secs as u64))
        }
    }
}
