//! Provider registry and routing.
//!
//! This module provides orchestration for market data providers, including:
//! - Static capability lookup and priority ordering
//! - Rate limiting per provider
//! - Circuit breaking for fault tolerance
//! - Racing and failover across candidates

mod capability_registry;
mod circuit_breaker;
mod diagnostics;
mod rate_limiter;
mod router;

pub use capability_registry::{CapabilityRegistry, ProviderDescriptor, RegisteredProvider};
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState,
};
pub use diagnostics::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use rate_limiter::RateLimiter;
pub use router::{
    RoutedResponse, Router, RouterConfig, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_RACE_WIDTH,
};
