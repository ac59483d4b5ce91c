//! Response cache.
//!
//! - [`ResponseCache`]: TTL cache with per-class LRU and single-flight fills
//! - [`TtlClass`] / [`CachePolicy`]: freshness rules
//! - [`CacheBackend`]: optional external store (Redis with the `redis` feature)

mod backend;
mod key;
mod store;
mod ttl;

pub use backend::{CacheBackend, StoredResponse};
#[cfg(feature = "redis")]
pub use backend::RedisBackend;
pub use key::CacheKey;
pub use store::{CacheStats, CacheStatus, CachedResponse, ResponseCache};
pub use ttl::{CachePolicy, TtlClass, DEFAULT_CAPACITY_PER_CLASS, DEFAULT_SWEEP_INTERVAL};
