//! In-process response cache with single-flight fills.
//!
//! Entries are partitioned by [`TtlClass`]; each partition is a `DashMap`
//! with its own capacity and LRU eviction. Concurrent misses on one key share
//! a single fill task: the first caller spawns it, later callers await the
//! same shared result. The fill runs on its own task, so a caller that gives
//! up waiting never cancels the fetch for everybody else.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::backend::{CacheBackend, StoredResponse};
use super::key::CacheKey;
use super::ttl::{CachePolicy, TtlClass};
use crate::errors::MarketDataError;
use crate::models::NormalizedResponse;

/// Where a response came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Fresh entry, no upstream call
    Hit,
    /// This caller triggered the fetch
    Miss,
    /// Waited on a fetch another caller started
    Joined,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Joined => "joined",
        })
    }
}

/// A response handed back by [`ResponseCache::get_or_fetch`].
#[derive(Clone, Debug)]
pub struct CachedResponse {
    pub response: NormalizedResponse,
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub status: CacheStatus,
}

impl CachedResponse {
    fn new(stored: &StoredResponse, status: CacheStatus) -> Self {
        Self {
            response: stored.response.clone(),
            provider: stored.provider.clone(),
            fetched_at: stored.fetched_at,
            status,
        }
    }
}

/// Counters since the cache was created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Callers that joined an in-flight fetch
    pub coalesced: u64,
    /// Entries dropped to respect capacity
    pub evictions: u64,
    /// Entries dropped because they went stale
    pub expired: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct Entry {
    value: Arc<StoredResponse>,
    expires_at: Instant,
    last_access: u64,
}

/// Outcome of one fill task.
#[derive(Clone, Debug)]
struct Fill {
    value: Arc<StoredResponse>,
    from_backend: bool,
}

type SharedFill = Shared<BoxFuture<'static, Result<Fill, MarketDataError>>>;

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

struct CacheInner {
    partitions: [DashMap<CacheKey, Entry>; 6],
    inflight: DashMap<CacheKey, SharedFill>,
    policy: CachePolicy,
    backend: Option<Arc<dyn CacheBackend>>,
    /// Logical clock for LRU ordering
    clock: AtomicU64,
    counters: Counters,
}

impl CacheInner {
    fn partition(&self, class: TtlClass) -> &DashMap<CacheKey, Entry> {
        &self.partitions[class.index()]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Fresh value for `key`, evicting it if it went stale.
    fn lookup(&self, key: &CacheKey, class: TtlClass) -> Option<Arc<StoredResponse>> {
        let partition = self.partition(class);
        let now = Instant::now();
        {
            let mut entry = partition.get_mut(key)?;
            if entry.expires_at > now {
                entry.last_access = self.tick();
                return Some(entry.value.clone());
            }
        }
        if partition
            .remove_if(key, |_, entry| entry.expires_at <= now)
            .is_some()
        {
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            debug!("Cache entry expired: {}", key);
        }
        None
    }

    fn store(&self, key: &CacheKey, class: TtlClass, value: Arc<StoredResponse>, ttl: Duration) {
        let partition = self.partition(class);
        partition.insert(
            key.clone(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
                last_access: self.tick(),
            },
        );

        let capacity = self.policy.capacity_per_class.max(1);
        while partition.len() > capacity {
            let now = Instant::now();
            // stale entries go first, then the least recently used
            let victim = partition
                .iter()
                .min_by_key(|e| (e.expires_at > now, e.last_access))
                .map(|e| e.key().clone());
            match victim {
                Some(victim) => {
                    if partition.remove(&victim).is_some() {
                        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                        debug!("Cache evicted {} from {}", victim, class);
                    }
                }
                None => break,
            }
        }
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for partition in &self.partitions {
            let before = partition.len();
            partition.retain(|_, entry| entry.expires_at > now);
            removed += before.saturating_sub(partition.len());
        }
        if removed > 0 {
            self.counters
                .expired
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Cache sweep removed {} expired entries", removed);
        }
        removed
    }

    async fn fill<F, Fut>(
        &self,
        key: &CacheKey,
        class: TtlClass,
        fetch: F,
    ) -> Result<Fill, MarketDataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StoredResponse, MarketDataError>>,
    {
        let ttl = self.policy.ttl(class);
        let external_key = key.to_string();

        if let Some(backend) = &self.backend {
            match backend.get(&external_key).await {
                Ok(Some(stored)) => {
                    if let Some(remaining) = stored.remaining_ttl(ttl) {
                        let value = Arc::new(stored);
                        self.store(key, class, value.clone(), remaining);
                        return Ok(Fill {
                            value,
                            from_backend: true,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Cache backend read failed for {}: {}", key, e),
            }
        }

        let value = Arc::new(fetch().await?);
        self.store(key, class, value.clone(), ttl);

        if let Some(backend) = &self.backend {
            if let Err(e) = backend.set(&external_key, &value, ttl).await {
                warn!("Cache backend write failed for {}: {}", key, e);
            }
        }

        Ok(Fill {
            value,
            from_backend: false,
        })
    }
}

/// Removes the in-flight marker when the fill task ends, even by panic.
struct InflightGuard {
    inner: Arc<CacheInner>,
    key: CacheKey,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inner.inflight.remove(&self.key);
    }
}

/// TTL cache for normalized responses.
///
/// Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

impl ResponseCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self::build(policy, None)
    }

    /// Cache that also reads and writes through an external store.
    pub fn with_backend(policy: CachePolicy, backend: Arc<dyn CacheBackend>) -> Self {
        Self::build(policy, Some(backend))
    }

    fn build(policy: CachePolicy, backend: Option<Arc<dyn CacheBackend>>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                partitions: std::array::from_fn(|_| DashMap::new()),
                inflight: DashMap::new(),
                policy,
                backend,
                clock: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Return the fresh entry for `key`, or run `fetch` once for all
    /// concurrent callers and cache its success under `class`.
    ///
    /// Failures are shared with every waiter but never cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        class: TtlClass,
        fetch: F,
    ) -> Result<CachedResponse, MarketDataError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<StoredResponse, MarketDataError>> + Send + 'static,
    {
        if let Some(value) = self.inner.lookup(&key, class) {
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(CachedResponse::new(&value, CacheStatus::Hit));
        }

        let (shared, leader) = match self.inner.inflight.entry(key.clone()) {
            MapEntry::Occupied(pending) => (pending.get().clone(), false),
            MapEntry::Vacant(slot) => {
                // a fill may have completed between the lookup and here
                if let Some(value) = self.inner.lookup(&key, class) {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(CachedResponse::new(&value, CacheStatus::Hit));
                }

                let (tx, rx) = oneshot::channel();
                let shared: SharedFill = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(MarketDataError::Internal(
                            "cache fill task ended without a result".to_string(),
                        ))
                    })
                }
                .boxed()
                .shared();
                slot.insert(shared.clone());

                let guard = InflightGuard {
                    inner: self.inner.clone(),
                    key,
                };
                tokio::spawn(async move {
                    let result = guard.inner.fill(&guard.key, class, fetch).await;
                    // late callers must start a fresh fill, not join a settled one
                    drop(guard);
                    let _ = tx.send(result);
                });
                (shared, true)
            }
        };

        let counter = if leader {
            &self.inner.counters.misses
        } else {
            &self.inner.counters.coalesced
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let fill = shared.await?;
        let status = match (leader, fill.from_backend) {
            (true, true) => CacheStatus::Hit,
            (true, false) => CacheStatus::Miss,
            (false, _) => CacheStatus::Joined,
        };
        Ok(CachedResponse::new(&fill.value, status))
    }

    /// Fresh entry without fetching.
    pub fn peek(&self, key: &CacheKey, class: TtlClass) -> Option<CachedResponse> {
        self.inner
            .lookup(key, class)
            .map(|value| CachedResponse::new(&value, CacheStatus::Hit))
    }

    /// Drop `key` from every class and from the external store.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let mut removed = false;
        for partition in &self.inner.partitions {
            removed |= partition.remove(key).is_some();
        }
        if let Some(backend) = &self.inner.backend {
            if let Err(e) = backend.delete(&key.to_string()).await {
                warn!("Cache backend delete failed for {}: {}", key, e);
            }
        }
        removed
    }

    /// Drop every in-process entry. The external store is left alone.
    pub fn clear(&self) {
        for partition in &self.inner.partitions {
            partition.clear();
        }
    }

    /// Remove expired entries now; returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    pub fn len(&self) -> usize {
        self.inner.partitions.iter().map(DashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            expired: counters.expired.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Start the periodic sweep if the policy asks for one.
    ///
    /// The task holds a weak reference and stops once every clone of the
    /// cache is dropped.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let interval = self.inner.policy.sweep_interval?;
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(inner) => {
                        inner.sweep();
                    }
                    None => break,
                }
            }
        }))
    }
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("policy", &self.inner.policy)
            .field("entries", &self.len())
            .field("external", &self.inner.backend.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CacheError;
    use crate::models::{OperationKind, Quote, RequestParams, Ticker};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn key(raw: &str) -> CacheKey {
        CacheKey::new(
            OperationKind::Quote,
            Some(Ticker::parse(raw).unwrap()),
            &RequestParams::default(),
        )
    }

    fn quote(raw: &str, price: i64) -> StoredResponse {
        let quote = Quote::new(Ticker::parse(raw).unwrap(), Utc::now(), Decimal::from(price));
        StoredResponse::new("STUB", NormalizedResponse::Quote(quote))
    }

    /// Fetch closure that counts invocations.
    fn counted(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        result: Result<StoredResponse, MarketDataError>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<StoredResponse, MarketDataError>> + Send + 'static
    {
        let calls = calls.clone();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                result
            }
            .boxed()
        }
    }

    fn price(cached: &CachedResponse) -> Decimal {
        cached.response.as_quote().unwrap().price
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let cache = ResponseCache::new(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch(
                key("NASDAQ:AAPL"),
                TtlClass::Live,
                counted(&calls, Duration::ZERO, Ok(quote("NASDAQ:AAPL", 1))),
            )
            .await
            .unwrap();
        let second = cache
            .get_or_fetch(
                key("NASDAQ:AAPL"),
                TtlClass::Live,
                counted(&calls, Duration::ZERO, Ok(quote("NASDAQ:AAPL", 2))),
            )
            .await
            .unwrap();

        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(price(&second), Decimal::from(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_fetch() {
        let cache = ResponseCache::new(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let fetch = counted(
                &calls,
                Duration::from_millis(50),
                Ok(quote("NASDAQ:AAPL", 7)),
            );
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(key("NASDAQ:AAPL"), TtlClass::Live, fetch)
                    .await
            }));
        }

        let mut statuses = Vec::new();
        for handle in handles {
            let cached = handle.await.unwrap().unwrap();
            assert_eq!(price(&cached), Decimal::from(7));
            statuses.push(cached.status);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            statuses.iter().filter(|s| **s == CacheStatus::Miss).count(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_is_shared_and_not_cached() {
        let cache = ResponseCache::new(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = MarketDataError::Internal("upstream down".to_string());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let fetch = counted(&calls, Duration::from_millis(50), Err(failure.clone()));
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(key("CRYPTO:BTC"), TtlClass::Live, fetch)
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), failure);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        cache
            .get_or_fetch(
                key("CRYPTO:BTC"),
                TtlClass::Live,
                counted(&calls, Duration::ZERO, Ok(quote("CRYPTO:BTC", 3))),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_fill_allows_immediate_retry() {
        let cache = ResponseCache::new(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = MarketDataError::Internal("upstream down".to_string());

        for _ in 0..20 {
            let error = cache
                .get_or_fetch(
                    key("CRYPTO:ETH"),
                    TtlClass::Live,
                    counted(&calls, Duration::ZERO, Err(failure.clone())),
                )
                .await
                .unwrap_err();
            assert_eq!(error, failure);
            assert!(!cache.inner.inflight.contains_key(&key("CRYPTO:ETH")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 20);

        let retried = cache
            .get_or_fetch(
                key("CRYPTO:ETH"),
                TtlClass::Live,
                counted(&calls, Duration::ZERO, Ok(quote("CRYPTO:ETH", 5))),
            )
            .await
            .unwrap();
        assert_eq!(retried.status, CacheStatus::Miss);
        assert_eq!(price(&retried), Decimal::from(5));
    }

    #[tokio::test]
    async fn test_abandoned_wait_does_not_cancel_fetch() {
        let cache = ResponseCache::new(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let cache = cache.clone();
            let fetch = counted(
                &calls,
                Duration::from_millis(50),
                Ok(quote("NASDAQ:MSFT", 4)),
            );
            tokio::spawn(async move {
                cache
                    .get_or_fetch(key("NASDAQ:MSFT"), TtlClass::Live, fetch)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let cached = cache.peek(&key("NASDAQ:MSFT"), TtlClass::Live).unwrap();
        assert_eq!(price(&cached), Decimal::from(4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let policy = CachePolicy::default().with_ttl(TtlClass::Live, Duration::from_millis(20));
        let cache = ResponseCache::new(policy);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            cache
                .get_or_fetch(
                    key("NASDAQ:AAPL"),
                    TtlClass::Live,
                    counted(&calls, Duration::ZERO, Ok(quote("NASDAQ:AAPL", 1))),
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().expired, 1);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_lru_eviction_within_class() {
        let cache = ResponseCache::new(CachePolicy::default().with_capacity(2));
        let calls = Arc::new(AtomicUsize::new(0));

        for raw in ["NASDAQ:A", "NASDAQ:B"] {
            cache
                .get_or_fetch(
                    key(raw),
                    TtlClass::Live,
                    counted(&calls, Duration::ZERO, Ok(quote(raw, 1))),
                )
                .await
                .unwrap();
        }
        // touch A so B becomes least recently used
        assert!(cache.peek(&key("NASDAQ:A"), TtlClass::Live).is_some());

        cache
            .get_or_fetch(
                key("NASDAQ:C"),
                TtlClass::Live,
                counted(&calls, Duration::ZERO, Ok(quote("NASDAQ:C", 1))),
            )
            .await
            .unwrap();

        assert!(cache.peek(&key("NASDAQ:A"), TtlClass::Live).is_some());
        assert!(cache.peek(&key("NASDAQ:B"), TtlClass::Live).is_none());
        assert!(cache.peek(&key("NASDAQ:C"), TtlClass::Live).is_some());
        assert_eq!(cache.stats().evictions, 1);

        // other classes have their own budget
        cache
            .get_or_fetch(
                key("NASDAQ:D"),
                TtlClass::Reference,
                counted(&calls, Duration::ZERO, Ok(quote("NASDAQ:D", 1))),
            )
            .await
            .unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = ResponseCache::new(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        for raw in ["NASDAQ:A", "NASDAQ:B"] {
            cache
                .get_or_fetch(
                    key(raw),
                    TtlClass::Live,
                    counted(&calls, Duration::ZERO, Ok(quote(raw, 1))),
                )
                .await
                .unwrap();
        }

        assert!(cache.invalidate(&key("NASDAQ:A")).await);
        assert!(!cache.invalidate(&key("NASDAQ:A")).await);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[derive(Default)]
    struct MemoryBackend {
        values: Mutex<HashMap<String, StoredResponse>>,
    }

    #[async_trait]
    impl CacheBackend for MemoryBackend {
        async fn get(&self, key: &str) -> Result<Option<StoredResponse>, CacheError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(
            &self,
            key: &str,
            value: &StoredResponse,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.clone());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<StoredResponse>, CacheError> {
            Err(CacheError("connection refused".to_string()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: &StoredResponse,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_backend_is_shared_between_instances() {
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::default());
        let first = ResponseCache::with_backend(CachePolicy::default(), backend.clone());
        let second = ResponseCache::with_backend(CachePolicy::default(), backend);
        let calls = Arc::new(AtomicUsize::new(0));

        first
            .get_or_fetch(
                key("HKEX:700"),
                TtlClass::Live,
                counted(&calls, Duration::ZERO, Ok(quote("HKEX:700", 5))),
            )
            .await
            .unwrap();
        let cached = second
            .get_or_fetch(
                key("HKEX:700"),
                TtlClass::Live,
                counted(&calls, Duration::ZERO, Ok(quote("HKEX:700", 6))),
            )
            .await
            .unwrap();

        assert_eq!(cached.status, CacheStatus::Hit);
        assert_eq!(price(&cached), Decimal::from(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_errors_degrade_to_in_process() {
        let cache = ResponseCache::with_backend(CachePolicy::default(), Arc::new(BrokenBackend));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            cache
                .get_or_fetch(
                    key("NASDAQ:AAPL"),
                    TtlClass::Live,
                    counted(&calls, Duration::ZERO, Ok(quote("NASDAQ:AAPL", 1))),
                )
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.invalidate(&key("NASDAQ:AAPL")).await);
    }

    #[tokio::test]
    async fn test_sweeper_stops_with_cache() {
        let policy = CachePolicy::default().with_sweep_interval(Some(Duration::from_millis(10)));
        let cache = ResponseCache::new(policy);
        let handle = cache.spawn_sweeper().unwrap();

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        let disabled = ResponseCache::new(CachePolicy::default().with_sweep_interval(None));
        assert!(disabled.spawn_sweeper().is_none());
    }
}
