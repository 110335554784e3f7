//! In-memory response cache with per-entry TTL.
//!
//! Entries are keyed by the raw request target under a fixed namespace and
//! expire purely by time; there is no capacity bound. Expired entries are never
//! returned, are removed lazily on read and periodically by [`spawn_reaper`].

mod entry;
mod key;
mod manager;
mod policy;
mod store;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use manager::{Cache, ResponseCache, spawn_reaper};
pub use policy::CachePolicy;
pub use store::MemoryCacheStore;
