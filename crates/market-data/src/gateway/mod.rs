//! Inbound interface.
//!
//! [`Gateway`] is the one entry point the tool layer talks to. For each
//! request it parses the ticker, builds the cache key and, on a miss, lets
//! the [`Router`] fetch through the providers. Every response carries the
//! provider that produced it, the cache status and the fetch time.

mod request;
mod search;

pub use request::{ResponseMeta, ToolRequest, ToolResponse};
pub use search::merge_results;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use log::debug;
use tokio::task::JoinHandle;

use crate::cache::{
    CacheBackend, CacheKey, CachePolicy, CacheStats, CachedResponse, ResponseCache,
    StoredResponse, TtlClass,
};
use crate::errors::MarketDataError;
use crate::models::{
    Fundamentals, News, NormalizedResponse, OperationKind, Profile, Quote, RequestParams,
    SearchResults, Series, Ticker, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT,
};
use crate::normalizer::Normalizer;
use crate::provider::MarketDataProvider;
use crate::registry::{
    CapabilityRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, Router,
    RouterConfig,
};
use crate::resolver::{resolve, RulesResolver, SymbolResolver};

/// Routing core plus cache.
pub struct Gateway {
    router: Arc<Router>,
    cache: ResponseCache,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Answer one tool request. Never fails; errors become error envelopes.
    pub async fn handle(&self, request: ToolRequest) -> ToolResponse {
        let ToolRequest {
            id,
            operation,
            ticker,
            params,
        } = request;

        match self.execute(operation, ticker.as_deref(), params).await {
            Ok(cached) => ToolResponse::ok(id, cached),
            Err(error) => {
                debug!("Request {} {:?} failed: {}", operation, ticker, error);
                ToolResponse::error(id, &error)
            }
        }
    }

    /// Run one operation and return the response with its cache metadata.
    pub async fn execute(
        &self,
        operation: OperationKind,
        raw_ticker: Option<&str>,
        params: RequestParams,
    ) -> Result<CachedResponse, MarketDataError> {
        if operation == OperationKind::Search {
            let query = params.query().or(raw_ticker).ok_or_else(|| {
                MarketDataError::InvalidRequest("search requires a query".to_string())
            })?;
            return self.search_cached(query, params.limit).await;
        }

        let raw = raw_ticker.ok_or_else(|| {
            MarketDataError::InvalidRequest(format!("{} requires a ticker", operation))
        })?;
        let ticker = resolve(raw)?;
        self.fetch(operation, ticker, params).await
    }

    async fn fetch(
        &self,
        operation: OperationKind,
        ticker: Ticker,
        params: RequestParams,
    ) -> Result<CachedResponse, MarketDataError> {
        let key = CacheKey::new(operation, Some(ticker.clone()), &params);
        let class = TtlClass::for_request(operation, &params);
        let router = self.router.clone();

        self.cache
            .get_or_fetch(key, class, move || async move {
                let routed = router.route(operation, &ticker, &params).await?;
                Ok(StoredResponse::new(routed.provider, routed.response))
            })
            .await
    }

    async fn search_cached(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<CachedResponse, MarketDataError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MarketDataError::InvalidRequest(
                "search query is empty".to_string(),
            ));
        }
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(MarketDataError::InvalidRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_SEARCH_LIMIT, limit
            )));
        }

        let params = RequestParams {
            query: Some(query.to_string()),
            limit: Some(limit),
            ..Default::default()
        };
        let key = CacheKey::new(OperationKind::Search, None, &params);
        let router = self.router.clone();
        let fill_query = query.to_string();

        let mut cached = self
            .cache
            .get_or_fetch(key, TtlClass::Reference, move || async move {
                let routed = router.search(&fill_query, limit).await?;
                Ok(merge_results(&fill_query, limit, routed))
            })
            .await?;
        // entries are shared across casings of the same query
        if let NormalizedResponse::Search(results) = &mut cached.response {
            results.query = query.to_string();
        }
        Ok(cached)
    }

    pub async fn quote(&self, raw: &str) -> Result<Quote, MarketDataError> {
        match self.data(OperationKind::Quote, raw, RequestParams::default()).await? {
            NormalizedResponse::Quote(quote) => Ok(quote),
            other => Err(unexpected(OperationKind::Quote, &other)),
        }
    }

    pub async fn series(&self, raw: &str, params: RequestParams) -> Result<Series, MarketDataError> {
        match self.data(OperationKind::Series, raw, params).await? {
            NormalizedResponse::Series(series) => Ok(series),
            other => Err(unexpected(OperationKind::Series, &other)),
        }
    }

    pub async fn profile(&self, raw: &str) -> Result<Profile, MarketDataError> {
        match self.data(OperationKind::Profile, raw, RequestParams::default()).await? {
            NormalizedResponse::Profile(profile) => Ok(profile),
            other => Err(unexpected(OperationKind::Profile, &other)),
        }
    }

    pub async fn fundamentals(&self, raw: &str) -> Result<Fundamentals, MarketDataError> {
        match self
            .data(OperationKind::Fundamentals, raw, RequestParams::default())
            .await?
        {
            NormalizedResponse::Fundamentals(fundamentals) => Ok(fundamentals),
            other => Err(unexpected(OperationKind::Fundamentals, &other)),
        }
    }

    pub async fn news(&self, raw: &str, params: RequestParams) -> Result<News, MarketDataError> {
        match self.data(OperationKind::News, raw, params).await? {
            NormalizedResponse::News(news) => Ok(news),
            other => Err(unexpected(OperationKind::News, &other)),
        }
    }

    /// Search every eligible provider and merge the results.
    ///
    /// `limit` defaults to 10 and must be within 1..=1000.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<SearchResults, MarketDataError> {
        match self.search_cached(query, limit).await?.response {
            NormalizedResponse::Search(results) => Ok(results),
            other => Err(unexpected(OperationKind::Search, &other)),
        }
    }

    /// Quotes for several tickers at once. One bad ticker does not fail the
    /// others.
    pub async fn quotes(&self, raws: &[&str]) -> HashMap<String, Result<Quote, MarketDataError>> {
        let results = join_all(raws.iter().map(|raw| self.quote(raw))).await;
        raws.iter()
            .map(|raw| raw.to_string())
            .zip(results)
            .collect()
    }

    async fn data(
        &self,
        operation: OperationKind,
        raw: &str,
        params: RequestParams,
    ) -> Result<NormalizedResponse, MarketDataError> {
        self.execute(operation, Some(raw), params)
            .await
            .map(|cached| cached.response)
    }

    /// Circuit health of every provider.
    pub fn provider_health(&self) -> Vec<CircuitSnapshot> {
        self.router.provider_health()
    }

    /// Admin: close a provider's circuit. False if the provider is unknown.
    pub fn reset_provider(&self, provider: &str) -> bool {
        self.router.reset_provider(provider)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Start background maintenance (the cache sweep), if configured.
    pub fn start_maintenance(&self) -> Option<JoinHandle<()>> {
        self.cache.spawn_sweeper()
    }
}

fn unexpected(operation: OperationKind, response: &NormalizedResponse) -> MarketDataError {
    MarketDataError::Internal(format!(
        "{} request produced a {} response",
        operation,
        response.operation()
    ))
}

/// Assembles a [`Gateway`] from provider clients and settings.
#[derive(Default)]
pub struct GatewayBuilder {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    priorities: HashMap<String, i32>,
    resolver: Option<Arc<dyn SymbolResolver>>,
    normalizer: Option<Normalizer>,
    circuit_breaker: CircuitBreakerConfig,
    router: RouterConfig,
    cache_policy: CachePolicy,
    cache_backend: Option<Arc<dyn CacheBackend>>,
}

impl GatewayBuilder {
    pub fn provider(mut self, provider: Arc<dyn MarketDataProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(
        mut self,
        providers: impl IntoIterator<Item = Arc<dyn MarketDataProvider>>,
    ) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Priority overrides by provider id; lower is tried first.
    pub fn priorities(mut self, priorities: HashMap<String, i32>) -> Self {
        self.priorities = priorities;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn SymbolResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.router = config;
        self
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn build(self) -> Gateway {
        let registry = CapabilityRegistry::with_priorities(self.providers, self.priorities);
        let router = Router::with_config(
            registry,
            self.resolver
                .unwrap_or_else(|| Arc::new(RulesResolver::new())),
            self.normalizer.unwrap_or_else(Normalizer::with_builtin),
            CircuitBreaker::with_config(self.circuit_breaker),
            self.router,
        );
        let cache = match self.cache_backend {
            Some(backend) => ResponseCache::with_backend(self.cache_policy, backend),
            None => ResponseCache::new(self.cache_policy),
        };

        Gateway {
            router: Arc::new(router),
            cache,
        }
    }
}
