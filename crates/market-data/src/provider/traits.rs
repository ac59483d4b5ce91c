//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::{OperationKind, RawPayload, RequestParams, Ticker};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Everything a provider needs to serve one ticker-scoped request.
#[derive(Clone, Copy, Debug)]
pub struct FetchRequest<'a> {
    /// Canonical ticker, echoed into the raw payload
    pub ticker: &'a Ticker,
    /// Provider-specific symbol produced by the resolver
    pub symbol: &'a str,
    pub params: &'a RequestParams,
}

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// Providers only talk to their upstream and hand back the raw body; the
/// normalizer owns the mapping into canonical shapes, and the router owns
/// timeouts, circuit state and failover.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use stockgate_market_data::provider::{FetchRequest, MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             segments: &[MarketSegment::Crypto],
///             operations: &[OperationKind::Quote],
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
///         // ... call upstream
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "TUSHARE", etc.
    /// Used for logging, circuit breaker tracking, and resolution.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Segments and operations this provider serves.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch the latest quote.
    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let _ = request;
        Err(ProviderError::NotSupported(OperationKind::Quote))
    }

    /// Fetch an OHLCV series for the range and interval in `request.params`.
    async fn fetch_series(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let _ = request;
        Err(ProviderError::NotSupported(OperationKind::Series))
    }

    /// Fetch descriptive profile data.
    async fn fetch_profile(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let _ = request;
        Err(ProviderError::NotSupported(OperationKind::Profile))
    }

    /// Fetch valuation ratios.
    async fn fetch_fundamentals(
        &self,
        request: FetchRequest<'_>,
    ) -> Result<RawPayload, ProviderError> {
        let _ = request;
        Err(ProviderError::NotSupported(OperationKind::Fundamentals))
    }

    /// Fetch recent news for the range in `request.params`.
    async fn fetch_news(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let _ = request;
        Err(ProviderError::NotSupported(OperationKind::News))
    }

    /// Search instruments by free-text query.
    async fn search(&self, query: &str, limit: usize) -> Result<RawPayload, ProviderError> {
        let _ = (query, limit);
        Err(ProviderError::NotSupported(OperationKind::Search))
    }
}
