//! Stockgate Market Data Crate
//!
//! Adapter routing and resilience layer over unreliable financial data
//! providers.
//!
//! # Overview
//!
//! The crate supports:
//! - Multiple segments: US equities, A-shares, Hong Kong equities, crypto,
//!   forex, indices
//! - Multiple providers: Yahoo Finance, Finnhub, Tushare, EastMoney,
//!   CoinGecko, Binance
//! - Capability-based routing with racing and failover
//! - Per-provider circuit breaking and rate limiting
//! - One canonical response model regardless of provider
//! - TTL caching with single-flight fills
//!
//! # Architecture
//!
//! ```text
//!   ToolRequest {operation, "SSE:600519", params}
//!        |
//!        v
//! +------------------+
//! |     Gateway      |  resolve ticker, build cache key
//! +------------------+
//!        |  miss
//!        v
//! +------------------+
//! |  ResponseCache   |  single-flight per key
//! +------------------+
//!        |
//!        v
//! +------------------+     +--------------------+
//! |      Router      | --> | CapabilityRegistry |  who can serve (segment, op)
//! +------------------+     +--------------------+
//!        |            \--> CircuitBreaker / RateLimiter
//!        v
//! +------------------+
//! | SymbolResolver   |  "600519.SS" / "600519.SH" / "1.600519"
//! +------------------+
//!        |
//!        v
//! +------------------+
//! |    Provider      |  raw payload
//! +------------------+
//!        |
//!        v
//! +------------------+
//! |   Normalizer     |  NormalizedResponse
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Ticker`] - Canonical `EXCHANGE:SYMBOL` identity
//! - [`NormalizedResponse`] - One canonical shape per operation
//! - [`Gateway`] - Entry point for the tool layer
//! - [`Router`] - Candidate selection, racing and failover
//! - [`ResponseCache`] - TTL cache with single-flight fills
//! - [`MarketDataError`] - Caller-facing errors

pub mod cache;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod normalizer;
pub mod provider;
pub mod registry;
pub mod resolver;

// Re-export the types most callers need
pub use cache::{CachePolicy, CacheStatus, ResponseCache, TtlClass};
pub use errors::{MarketDataError, ProviderError, RetryClass};
pub use gateway::{Gateway, GatewayBuilder, ToolRequest, ToolResponse};
pub use models::{
    Bar, Fundamentals, Interval, MarketSegment, News, NewsItem, NormalizedResponse,
    OperationKind, Profile, Quote, RawPayload, RequestParams, SearchHit, SearchResults, Series,
    Ticker,
};
pub use normalizer::Normalizer;
pub use provider::binance::BinanceProvider;
pub use provider::coingecko::CoinGeckoProvider;
pub use provider::eastmoney::EastMoneyProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::tushare::TushareProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{FetchRequest, MarketDataProvider, ProviderCapabilities, RateLimit};
pub use registry::{
    CapabilityRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState, RateLimiter, Router,
    RouterConfig,
};
pub use resolver::{resolve, RulesResolver, SymbolResolver};
