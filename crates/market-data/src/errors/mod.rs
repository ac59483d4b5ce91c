//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The caller-facing error enum
//! - [`ProviderError`]: A single upstream failure, consumed by the router
//! - [`ParseError`], [`NormalizationError`], [`CacheError`]: component errors
//! - [`RetryClass`]: Classification for determining failover behavior
//! - [`ErrorDetail`]: The structured, serializable form handed to callers
//!
//! All errors are `Clone` so a single-flight fetch can hand the same failure
//! to every waiter.

mod retry;

pub use retry::RetryClass;

use serde::Serialize;
use thiserror::Error;

use crate::models::{MarketSegment, OperationKind};

/// A raw ticker string could not be turned into a [`Ticker`](crate::models::Ticker).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Invalid ticker '{raw_input}': {reason}")]
pub struct ParseError {
    /// Why the input was rejected.
    pub reason: String,
    /// The input exactly as received.
    pub raw_input: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>, raw_input: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw_input: raw_input.into(),
        }
    }
}

/// A provider payload could not be mapped into the canonical model.
///
/// Usually means the upstream schema drifted. The router treats it as a
/// provider failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Normalization failed for {provider} {operation}: {message}")]
pub struct NormalizationError {
    pub provider: String,
    pub operation: OperationKind,
    pub message: String,
}

impl NormalizationError {
    pub fn new(
        provider: impl Into<String>,
        operation: OperationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation,
            message: message.into(),
        }
    }
}

/// The external cache backend is unavailable or returned garbage.
///
/// Never surfaces to callers; the cache logs it and fetches through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cache backend error: {0}")]
pub struct CacheError(pub String);

/// One failed call to one upstream provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The attempt exceeded its time budget.
    #[error("Timed out after {after_ms}ms")]
    Timeout {
        /// Budget that was exceeded, in milliseconds.
        after_ms: u64,
    },

    /// The provider rate limited the request (HTTP 429, or 403 quota).
    #[error("Rate limited")]
    RateLimited,

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or extracted error message
        message: String,
    },

    /// The provider answered but reported an error in-band.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Connection-level failure (DNS, TLS, reset, unreadable body).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider does not know this instrument.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The instrument exists but there is nothing for the requested range.
    #[error("No data: {0}")]
    NoData(String),

    /// The provider does not implement this operation.
    #[error("Operation not supported: {0}")]
    NotSupported(OperationKind),

    /// The payload arrived but could not be normalized.
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl ProviderError {
    /// Returns the failover classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use stockgate_market_data::errors::{ProviderError, RetryClass};
    ///
    /// assert_eq!(ProviderError::RateLimited.retry_class(), RetryClass::FailoverWithPenalty);
    ///
    /// let error = ProviderError::SymbolNotFound("XYZ".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Timeout { .. }
            | Self::RateLimited
            | Self::Http { .. }
            | Self::Upstream(_)
            | Self::Network(_)
            | Self::Normalization(_) => RetryClass::FailoverWithPenalty,

            Self::SymbolNotFound(_) | Self::NoData(_) | Self::NotSupported(_) => {
                RetryClass::NextProvider
            }
        }
    }

    /// Short machine-readable label, used in [`ErrorDetail`] causes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Http { .. } => "http",
            Self::Upstream(_) => "upstream",
            Self::Network(_) => "network",
            Self::SymbolNotFound(_) => "symbol_not_found",
            Self::NoData(_) => "no_data",
            Self::NotSupported(_) => "not_supported",
            Self::Normalization(_) => "normalization",
        }
    }
}

/// A provider together with the error it produced during routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

/// Errors surfaced to callers of the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// Bad ticker syntax or unknown exchange. Never retried.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// No registered provider declares this (segment, operation) pair.
    /// A configuration gap, never retried. `segment` is `None` for search.
    #[error("{}", no_provider_message(.segment, .operation))]
    NoProvider {
        segment: Option<MarketSegment>,
        operation: OperationKind,
    },

    /// Every eligible candidate was tried and failed, or none was eligible.
    #[error("{}", all_failed_message(.operation, .attempted))]
    AllProvidersFailed {
        operation: OperationKind,
        /// Providers that were tried, in attempt order.
        attempted: Vec<String>,
        /// One entry per attempted provider.
        causes: Vec<ProviderFailure>,
    },

    /// The request itself is malformed (missing ticker, bad limit, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A background fetch task died before producing a result.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn no_provider_message(segment: &Option<MarketSegment>, operation: &OperationKind) -> String {
    match segment {
        Some(segment) => format!("No provider supports {} for {}", operation, segment),
        None => format!("No provider supports {}", operation),
    }
}

fn all_failed_message(operation: &OperationKind, attempted: &[String]) -> String {
    if attempted.is_empty() {
        format!("No eligible provider for {}: all circuits open", operation)
    } else {
        format!(
            "All providers failed for {} (attempted: {})",
            operation,
            attempted.join(", ")
        )
    }
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// Caller-facing errors are terminal by the time they leave the router:
    /// transient upstream failures have already been absorbed by failover.
    pub fn retry_class(&self) -> RetryClass {
        RetryClass::Never
    }

    /// Short machine-readable label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::NoProvider { .. } => "no_provider",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal",
        }
    }

    /// Structured form for callers.
    pub fn detail(&self) -> ErrorDetail {
        let (attempted, causes) = match self {
            Self::AllProvidersFailed {
                attempted, causes, ..
            } => (
                attempted.clone(),
                causes
                    .iter()
                    .map(|c| CauseDetail {
                        provider: c.provider.clone(),
                        kind: c.error.kind().to_string(),
                        message: c.error.to_string(),
                    })
                    .collect(),
            ),
            _ => (Vec::new(), Vec::new()),
        };

        ErrorDetail {
            kind: self.kind().to_string(),
            message: self.to_string(),
            attempted,
            causes,
        }
    }
}

/// Serializable error returned in a [`ToolResponse`](crate::gateway::ToolResponse).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
    pub attempted: Vec<String>,
    pub causes: Vec<CauseDetail>,
}

/// Per-provider cause inside an [`ErrorDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CauseDetail {
    pub provider: String,
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_fail_over_with_penalty() {
        assert_eq!(
            ProviderError::Timeout { after_ms: 500 }.retry_class(),
            RetryClass::FailoverWithPenalty
        );
        assert_eq!(
            ProviderError::RateLimited.retry_class(),
            RetryClass::FailoverWithPenalty
        );
        assert_eq!(
            ProviderError::Http {
                status: 502,
                message: "Bad Gateway".to_string()
            }
            .retry_class(),
            RetryClass::FailoverWithPenalty
        );
        assert_eq!(
            ProviderError::Network("connection reset".to_string()).retry_class(),
            RetryClass::FailoverWithPenalty
        );
    }

    #[test]
    fn test_normalization_counts_as_provider_failure() {
        let error: ProviderError =
            NormalizationError::new("YAHOO", OperationKind::Quote, "missing meta").into();
        assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
        assert_eq!(error.kind(), "normalization");
    }

    #[test]
    fn test_missing_data_moves_on_without_penalty() {
        assert_eq!(
            ProviderError::SymbolNotFound("ZZZZ".to_string()).retry_class(),
            RetryClass::NextProvider
        );
        assert_eq!(
            ProviderError::NoData("empty range".to_string()).retry_class(),
            RetryClass::NextProvider
        );
        assert_eq!(
            ProviderError::NotSupported(OperationKind::News).retry_class(),
            RetryClass::NextProvider
        );
    }

    #[test]
    fn test_caller_errors_never_retry() {
        let error = MarketDataError::Parse(ParseError::new("missing ':'", "BOGUS"));
        assert_eq!(error.retry_class(), RetryClass::Never);

        let error = MarketDataError::NoProvider {
            segment: Some(MarketSegment::Forex),
            operation: OperationKind::Fundamentals,
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert_eq!(error.to_string(), "No provider supports fundamentals for FOREX");
    }

    #[test]
    fn test_all_providers_failed_detail_carries_causes() {
        let error = MarketDataError::AllProvidersFailed {
            operation: OperationKind::Quote,
            attempted: vec!["A".to_string(), "B".to_string()],
            causes: vec![
                ProviderFailure {
                    provider: "A".to_string(),
                    error: ProviderError::RateLimited,
                },
                ProviderFailure {
                    provider: "B".to_string(),
                    error: ProviderError::Timeout { after_ms: 100 },
                },
            ],
        };

        let detail = error.detail();
        assert_eq!(detail.kind, "all_providers_failed");
        assert_eq!(detail.attempted, vec!["A", "B"]);
        assert_eq!(detail.causes.len(), 2);
        assert_eq!(detail.causes[1].kind, "timeout");
        assert_eq!(detail.message, "All providers failed for quote (attempted: A, B)");
    }

    #[test]
    fn test_empty_attempt_list_message() {
        let error = MarketDataError::AllProvidersFailed {
            operation: OperationKind::Quote,
            attempted: vec![],
            causes: vec![],
        };
        assert_eq!(
            error.to_string(),
            "No eligible provider for quote: all circuits open"
        );
    }

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::new("expected EXCHANGE:CODE", "BOGUS");
        assert_eq!(
            format!("{}", error),
            "Invalid ticker 'BOGUS': expected EXCHANGE:CODE"
        );
    }
}
