//! Token bucket rate limiter for provider calls.
//!
//! Each provider gets a bucket sized from its [`RateLimit`]: `burst` tokens
//! of capacity, refilled at `requests_per_minute / 60` tokens per second.
//! Waiting for a token is purely local and never counts against the
//! provider's circuit.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;

use crate::provider::RateLimit;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens per second
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn from_limit(limit: &RateLimit) -> Self {
        let capacity = f64::from(limit.burst.max(1));
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: f64::from(limit.requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    /// Take a token, or report how long until one is available.
    fn take(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.rate))
        }
    }
}

/// Per-provider token buckets.
///
/// Buckets are created from the configured limit on first use; providers
/// without a configured limit get [`RateLimit::default`].
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    limits: DashMap<String, RateLimit>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the budget for a provider, discarding any existing bucket.
    pub fn configure(&self, provider: &str, limit: RateLimit) {
        self.limits.insert(provider.to_string(), limit);
        self.buckets.remove(provider);
    }

    fn bucket_limit(&self, provider: &str) -> RateLimit {
        self.limits
            .get(provider)
            .map(|l| l.value().clone())
            .unwrap_or_default()
    }

    fn take(&self, provider: &str) -> Result<(), Duration> {
        if !self.buckets.contains_key(provider) {
            let limit = self.bucket_limit(provider);
            self.buckets
                .entry(provider.to_string())
                .or_insert_with(|| TokenBucket::from_limit(&limit));
        }
        match self.buckets.get_mut(provider) {
            Some(mut bucket) => bucket.take(),
            None => Ok(()),
        }
    }

    /// Wait until a token for `provider` is available and take it.
    ///
    /// Returns how long the caller waited. The map shard is never held
    /// across the sleep.
    pub async fn acquire(&self, provider: &str) -> Duration {
        let started = Instant::now();
        loop {
            match self.take(provider) {
                Ok(()) => {
                    let waited = started.elapsed();
                    if waited > Duration::ZERO {
                        debug!("Rate limiter: '{}' waited {:?}", provider, waited);
                    }
                    return waited;
                }
                Err(wait) => {
                    debug!("Rate limiter: waiting {:?} for '{}'", wait, provider);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Take a token without waiting.
    pub fn try_acquire(&self, provider: &str) -> bool {
        self.take(provider).is_ok()
    }

    pub fn remaining_tokens(&self, provider: &str) -> f64 {
        match self.buckets.get_mut(provider) {
            Some(mut bucket) => {
                bucket.refill();
                bucket.tokens
            }
            None => f64::from(self.bucket_limit(provider).burst.max(1)),
        }
    }

    pub fn reset(&self, provider: &str) {
        self.buckets.remove(provider);
    }
}
