//! Optional external store behind the in-process cache.
//!
//! The in-process cache stays authoritative for single-flight and LRU; the
//! backend only lets several gateway processes share fetched responses.
//! Every backend error is logged by the cache and treated as a miss.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CacheError;
use crate::models::NormalizedResponse;

/// A response as it is kept in the cache, in process or externally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub response: NormalizedResponse,
}

impl StoredResponse {
    /// Stamp a freshly fetched response.
    pub fn new(provider: impl Into<String>, response: NormalizedResponse) -> Self {
        Self {
            provider: provider.into(),
            fetched_at: Utc::now(),
            response,
        }
    }

    /// Time left before this response goes stale under `ttl`, if any.
    pub fn remaining_ttl(&self, ttl: Duration) -> Option<Duration> {
        let age = (Utc::now() - self.fetched_at).to_std().unwrap_or_default();
        ttl.checked_sub(age).filter(|left| !left.is_zero())
    }
}

/// Key-value store shared between gateway instances.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredResponse>, CacheError>;

    async fn set(&self, key: &str, value: &StoredResponse, ttl: Duration)
        -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[cfg(feature = "redis")]
pub use self::redis_backend::RedisBackend;

#[cfg(feature = "redis")]
mod redis_backend {
    use std::time::Duration;

    use async_trait::async_trait;
    use log::info;
    use redis::aio::ConnectionManager;
    use redis::{AsyncCommands, Client};

    use super::{CacheBackend, StoredResponse};
    use crate::errors::CacheError;

    /// Redis-backed store. Values are JSON, expiry is delegated to Redis.
    #[derive(Clone)]
    pub struct RedisBackend {
        connection: ConnectionManager,
    }

    impl RedisBackend {
        pub async fn connect(url: &str) -> Result<Self, CacheError> {
            info!("Connecting to Redis cache backend...");

            let client = Client::open(url).map_err(|e| CacheError(e.to_string()))?;
            let connection = ConnectionManager::new(client)
                .await
                .map_err(|e| CacheError(e.to_string()))?;

            info!("Redis cache backend connected");
            Ok(Self { connection })
        }
    }

    #[async_trait]
    impl CacheBackend for RedisBackend {
        async fn get(&self, key: &str) -> Result<Option<StoredResponse>, CacheError> {
            let mut conn = self.connection.clone();
            let value: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| CacheError(e.to_string()))?;

            match value {
                Some(json) => serde_json::from_str(&json)
                    .map(Some)
                    .map_err(|e| CacheError(format!("corrupt entry '{}': {}", key, e))),
                None => Ok(None),
            }
        }

        async fn set(
            &self,
            key: &str,
            value: &StoredResponse,
            ttl: Duration,
        ) -> Result<(), CacheError> {
            let json = serde_json::to_string(value).map_err(|e| CacheError(e.to_string()))?;

            let mut conn = self.connection.clone();
            let _: () = conn
                .set_ex(key, json, ttl.as_secs().max(1))
                .await
                .map_err(|e| CacheError(e.to_string()))?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            let mut conn = self.connection.clone();
            let _: i64 = conn
                .del(key)
                .await
                .map_err(|e| CacheError(e.to_string()))?;
            Ok(())
        }
    }
}
