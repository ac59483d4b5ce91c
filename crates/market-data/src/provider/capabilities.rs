//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how it should be rate-limited.

use std::time::Duration;

use crate::models::{MarketSegment, OperationKind};

/// Describes the capabilities of a market data provider.
///
/// Used by the capability registry to build the candidate list for each
/// (segment, operation) pair.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Market segments this provider covers.
    pub segments: &'static [MarketSegment],

    /// Operations this provider implements.
    pub operations: &'static [OperationKind],
}

impl ProviderCapabilities {
    pub fn supports(&self, segment: MarketSegment, operation: OperationKind) -> bool {
        self.segments.contains(&segment) && self.operations.contains(&operation)
    }

    pub fn supports_operation(&self, operation: OperationKind) -> bool {
        self.operations.contains(&operation)
    }
}

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Requests that may be issued back to back before throttling kicks in.
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 5,
        }
    }
}

impl RateLimit {
    /// Minimum spacing between requests once the burst is spent.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_requires_both_segment_and_operation() {
        let caps = ProviderCapabilities {
            segments: &[MarketSegment::Crypto],
            operations: &[OperationKind::Quote, OperationKind::Series],
        };
        assert!(caps.supports(MarketSegment::Crypto, OperationKind::Quote));
        assert!(!caps.supports(MarketSegment::Crypto, OperationKind::Profile));
        assert!(!caps.supports(MarketSegment::UsEquity, OperationKind::Quote));
    }

    #[test]
    fn test_min_interval() {
        let limit = RateLimit {
            requests_per_minute: 120,
            burst: 1,
        };
        assert_eq!(limit.min_interval(), Duration::from_millis(500));
    }
}
