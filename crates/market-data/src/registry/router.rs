//! Request router.
//!
//! For one request the router:
//!
//! 1. asks the [`CapabilityRegistry`] for candidates
//! 2. drops candidates whose circuit does not admit calls
//! 3. orders the rest by priority, breaking ties by most recent success
//! 4. races the top candidates (latency-sensitive operations) or walks them
//!    in order, each attempt bounded by a timeout
//! 5. normalizes the winning payload
//!
//! Every attempt outcome feeds the [`CircuitBreaker`]. Errors that only
//! mean "this provider has nothing for you" (unknown symbol, empty range)
//! move on without a penalty.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};

use super::capability_registry::{CapabilityRegistry, RegisteredProvider};
use super::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use super::diagnostics::{FetchDiagnostics, SkipReason};
use super::rate_limiter::RateLimiter;
use crate::errors::{MarketDataError, ProviderError, RetryClass};
use crate::models::{NormalizedResponse, OperationKind, RawPayload, RequestParams, Ticker};
use crate::normalizer::Normalizer;
use crate::provider::{FetchRequest, MarketDataProvider};
use crate::resolver::{RulesResolver, SymbolResolver};

/// Default time budget for a single provider call.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Default number of candidates raced at once for latency-sensitive calls.
pub const DEFAULT_RACE_WIDTH: usize = 2;

#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Budget for one provider call; rate-limit waits are not included.
    pub attempt_timeout: Duration,
    /// Candidates raced concurrently. 1 disables racing.
    pub race_width: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            race_width: DEFAULT_RACE_WIDTH,
        }
    }
}

/// A normalized response and the provider that produced it.
#[derive(Clone, Debug)]
pub struct RoutedResponse {
    pub provider: String,
    pub response: NormalizedResponse,
    pub latency: Duration,
}

#[derive(Clone, Copy, Debug)]
enum Target<'a> {
    Ticker {
        ticker: &'a Ticker,
        params: &'a RequestParams,
    },
    Search {
        query: &'a str,
        limit: usize,
    },
}

enum Attempt {
    Success(RoutedResponse),
    Failure(ProviderError),
    /// The circuit stopped admitting calls between selection and the call
    Skipped,
}

/// Routes requests across providers with failover and circuit breaking.
pub struct Router {
    registry: CapabilityRegistry,
    resolver: Arc<dyn SymbolResolver>,
    normalizer: Normalizer,
    circuit_breaker: CircuitBreaker,
    rate_limiter: RateLimiter,
    config: RouterConfig,
}

impl Router {
    /// Router with the rules resolver, builtin mappings and default settings.
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self::with_config(
            registry,
            Arc::new(RulesResolver::new()),
            Normalizer::with_builtin(),
            CircuitBreaker::new(),
            RouterConfig::default(),
        )
    }

    pub fn with_config(
        registry: CapabilityRegistry,
        resolver: Arc<dyn SymbolResolver>,
        normalizer: Normalizer,
        circuit_breaker: CircuitBreaker,
        config: RouterConfig,
    ) -> Self {
        let rate_limiter = RateLimiter::new();

        for provider in registry.providers() {
            let id = provider.id();
            circuit_breaker.register(id);
            rate_limiter.configure(id, provider.descriptor.rate_limit.clone());

            for operation in provider.descriptor.capabilities.operations {
                if !normalizer.supports(id, *operation) {
                    warn!(
                        "Provider '{}' declares {} but no normalizer mapping is registered",
                        id, operation
                    );
                }
            }
        }

        Self {
            registry,
            resolver,
            normalizer,
            circuit_breaker,
            rate_limiter,
            config,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Circuit health of every registered provider.
    pub fn provider_health(&self) -> Vec<CircuitSnapshot> {
        self.circuit_breaker.snapshot()
    }

    /// Admin action: close a provider's circuit.
    pub fn reset_provider(&self, provider: &str) -> bool {
        self.circuit_breaker.reset(provider)
    }

    /// Route a ticker-scoped request to the first provider that answers.
    pub async fn route(
        &self,
        operation: OperationKind,
        ticker: &Ticker,
        params: &RequestParams,
    ) -> Result<RoutedResponse, MarketDataError> {
        if !operation.requires_ticker() {
            return Err(MarketDataError::InvalidRequest(format!(
                "{} is not routed by ticker",
                operation
            )));
        }

        let candidates = self.registry.candidates(ticker.segment(), operation)?;
        let mut diagnostics = FetchDiagnostics::new();
        let eligible = self.eligible(candidates, &mut diagnostics);

        if eligible.is_empty() {
            warn!(
                "No eligible provider for {} {}: {}",
                operation,
                ticker,
                diagnostics.summary()
            );
            return Err(MarketDataError::AllProvidersFailed {
                operation,
                attempted: Vec::new(),
                causes: Vec::new(),
            });
        }

        let target = Target::Ticker { ticker, params };
        let routed = if operation.is_latency_sensitive() && self.config.race_width > 1 {
            self.race(operation, target, &eligible, &mut diagnostics)
                .await
        } else {
            self.sequential(operation, target, &eligible, &mut diagnostics)
                .await
        };

        match routed {
            Some(routed) => {
                debug!("Routed {} {}: {}", operation, ticker, diagnostics.summary());
                Ok(routed)
            }
            None => {
                warn!(
                    "All providers failed for {} {}: {}",
                    operation,
                    ticker,
                    diagnostics.summary()
                );
                Err(MarketDataError::AllProvidersFailed {
                    operation,
                    attempted: diagnostics.attempted(),
                    causes: diagnostics.failures(),
                })
            }
        }
    }

    /// Ask every eligible search provider in parallel.
    ///
    /// Returns each provider's normalized results; fails only when none
    /// succeeded.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RoutedResponse>, MarketDataError> {
        let operation = OperationKind::Search;
        let candidates = self.registry.search_candidates()?;
        let mut diagnostics = FetchDiagnostics::new();
        let eligible = self.eligible(candidates, &mut diagnostics);

        if eligible.is_empty() {
            warn!(
                "No eligible provider for search '{}': {}",
                query,
                diagnostics.summary()
            );
            return Err(MarketDataError::AllProvidersFailed {
                operation,
                attempted: Vec::new(),
                causes: Vec::new(),
            });
        }

        let target = Target::Search { query, limit };
        let attempts = join_all(eligible.iter().map(|provider| async move {
            (provider.id(), self.attempt(provider, operation, target).await)
        }))
        .await;

        let mut results = Vec::new();
        for (id, attempt) in attempts {
            match attempt {
                Attempt::Success(routed) => {
                    diagnostics.record_success(id, routed.latency);
                    results.push(routed);
                }
                Attempt::Failure(error) => diagnostics.record_error(id, error),
                Attempt::Skipped => diagnostics.record_skip(id, SkipReason::CircuitOpen),
            }
        }

        if results.is_empty() {
            warn!(
                "All providers failed for search '{}': {}",
                query,
                diagnostics.summary()
            );
            return Err(MarketDataError::AllProvidersFailed {
                operation,
                attempted: diagnostics.attempted(),
                causes: diagnostics.failures(),
            });
        }

        debug!("Search '{}': {}", query, diagnostics.summary());
        Ok(results)
    }

    /// Filter by circuit state, then order by priority and recent success.
    fn eligible<'r>(
        &self,
        candidates: Vec<&'r RegisteredProvider>,
        diagnostics: &mut FetchDiagnostics,
    ) -> Vec<&'r RegisteredProvider> {
        let mut ranked: Vec<_> = candidates
            .into_iter()
            .filter_map(|provider| {
                if self.circuit_breaker.is_eligible(provider.id()) {
                    let recency = Reverse(self.circuit_breaker.last_success(provider.id()));
                    Some((provider.descriptor.priority, recency, provider))
                } else {
                    debug!("Circuit open for '{}', skipping", provider.id());
                    diagnostics.record_skip(provider.id(), SkipReason::CircuitOpen);
                    None
                }
            })
            .collect();

        // stable, so equal keys keep the registry's id order
        ranked.sort_by_key(|(priority, recency, _)| (*priority, *recency));
        ranked.into_iter().map(|(_, _, provider)| provider).collect()
    }

    async fn sequential(
        &self,
        operation: OperationKind,
        target: Target<'_>,
        candidates: &[&RegisteredProvider],
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<RoutedResponse> {
        for provider in candidates {
            let id = provider.id();
            match self.attempt(provider, operation, target).await {
                Attempt::Success(routed) => {
                    diagnostics.record_success(id, routed.latency);
                    return Some(routed);
                }
                Attempt::Failure(error) => {
                    info!(
                        "Provider '{}' failed for {}: {}, trying next",
                        id, operation, error
                    );
                    diagnostics.record_error(id, error);
                }
                Attempt::Skipped => diagnostics.record_skip(id, SkipReason::CircuitOpen),
            }
        }
        None
    }

    /// Race candidates in batches of `race_width`; the first success wins and
    /// the rest of its batch is cancelled by dropping their futures.
    async fn race(
        &self,
        operation: OperationKind,
        target: Target<'_>,
        candidates: &[&RegisteredProvider],
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<RoutedResponse> {
        for batch in candidates.chunks(self.config.race_width.max(1)) {
            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .map(|provider| async move {
                    (provider.id(), self.attempt(provider, operation, target).await)
                })
                .collect();
            let mut finished: Vec<&str> = Vec::with_capacity(batch.len());

            while let Some((id, attempt)) = pending.next().await {
                finished.push(id);
                match attempt {
                    Attempt::Success(routed) => {
                        diagnostics.record_success(id, routed.latency);
                        for loser in batch.iter().filter(|p| !finished.contains(&p.id())) {
                            diagnostics.record_skip(loser.id(), SkipReason::RaceLost);
                        }
                        return Some(routed);
                    }
                    Attempt::Failure(error) => {
                        info!("Provider '{}' lost the {} race: {}", id, operation, error);
                        diagnostics.record_error(id, error);
                    }
                    Attempt::Skipped => diagnostics.record_skip(id, SkipReason::CircuitOpen),
                }
            }
        }
        None
    }

    /// One call to one provider, from admission to normalized response.
    async fn attempt(
        &self,
        provider: &RegisteredProvider,
        operation: OperationKind,
        target: Target<'_>,
    ) -> Attempt {
        let id = provider.id();
        let Some(permit) = self.circuit_breaker.try_acquire(id) else {
            return Attempt::Skipped;
        };

        let symbol = match target {
            Target::Ticker { ticker, .. } => match self.resolver.resolve(id, ticker) {
                Ok(symbol) => Some(symbol),
                Err(error) => {
                    debug!("Cannot resolve {} for '{}': {}", ticker, id, error);
                    return Attempt::Failure(error);
                }
            },
            Target::Search { .. } => None,
        };

        // Waiting for budget is not part of the provider's time
        self.rate_limiter.acquire(id).await;

        let started = Instant::now();
        let call = invoke(provider.client.as_ref(), operation, target, symbol.as_deref());
        let fetched = match tokio::time::timeout(self.config.attempt_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                after_ms: self.config.attempt_timeout.as_millis() as u64,
            }),
        };
        let latency = started.elapsed();

        let result = fetched.and_then(|raw| {
            self.normalizer
                .normalize(operation, id, &raw)
                .map_err(|error| {
                    warn!(
                        "Normalization failed for '{}' {} (schema drift?): {}",
                        id, operation, error.message
                    );
                    ProviderError::from(error)
                })
        });

        match result {
            Ok(response) => {
                permit.record(true, latency);
                Attempt::Success(RoutedResponse {
                    provider: id.to_string(),
                    response,
                    latency,
                })
            }
            Err(error) => {
                match error.retry_class() {
                    RetryClass::FailoverWithPenalty => permit.record(false, latency),
                    RetryClass::NextProvider | RetryClass::Never => drop(permit),
                }
                Attempt::Failure(error)
            }
        }
    }
}

async fn invoke(
    client: &dyn MarketDataProvider,
    operation: OperationKind,
    target: Target<'_>,
    symbol: Option<&str>,
) -> Result<RawPayload, ProviderError> {
    match target {
        Target::Search { query, limit } => client.search(query, limit).await,
        Target::Ticker { ticker, params } => {
            let request = FetchRequest {
                ticker,
                symbol: symbol.unwrap_or(ticker.symbol()),
                params,
            };
            match operation {
                OperationKind::Quote => client.fetch_quote(request).await,
                OperationKind::Series => client.fetch_series(request).await,
                OperationKind::Profile => client.fetch_profile(request).await,
                OperationKind::Fundamentals => client.fetch_fundamentals(request).await,
                OperationKind::News => client.fetch_news(request).await,
                OperationKind::Search => Err(ProviderError::NotSupported(operation)),
            }
        }
    }
}
