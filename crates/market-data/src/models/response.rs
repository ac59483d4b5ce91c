//! Canonical responses and the raw payloads they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::params::Interval;
use super::profile::{Fundamentals, Profile};
use super::quote::{Quote, Series};
use super::search::{News, SearchResults};
use super::ticker::Ticker;
use super::types::{OperationKind, ProviderId};

/// Provider-independent response, one shape per operation.
///
/// Timestamps are UTC, prices and volumes carry a fixed decimal scale, and
/// tickers are canonical, no matter which provider produced the data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedResponse {
    Quote(Quote),
    Series(Series),
    Profile(Profile),
    Fundamentals(Fundamentals),
    News(News),
    Search(SearchResults),
}

impl NormalizedResponse {
    pub fn operation(&self) -> OperationKind {
        match self {
            Self::Quote(_) => OperationKind::Quote,
            Self::Series(_) => OperationKind::Series,
            Self::Profile(_) => OperationKind::Profile,
            Self::Fundamentals(_) => OperationKind::Fundamentals,
            Self::News(_) => OperationKind::News,
            Self::Search(_) => OperationKind::Search,
        }
    }

    /// Ticker the response is about; `None` for search.
    pub fn ticker(&self) -> Option<&Ticker> {
        match self {
            Self::Quote(q) => Some(&q.ticker),
            Self::Series(s) => Some(&s.ticker),
            Self::Profile(p) => Some(&p.ticker),
            Self::Fundamentals(f) => Some(&f.ticker),
            Self::News(n) => Some(&n.ticker),
            Self::Search(_) => None,
        }
    }

    pub fn as_quote(&self) -> Option<&Quote> {
        match self {
            Self::Quote(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&Series> {
        match self {
            Self::Series(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_search(&self) -> Option<&SearchResults> {
        match self {
            Self::Search(s) => Some(s),
            _ => None,
        }
    }
}

/// Provider-native body, exactly as returned by a provider client.
///
/// The normalizer is the only consumer.
#[derive(Clone, Debug)]
pub struct RawPayload {
    pub provider: ProviderId,
    pub operation: OperationKind,
    /// The requested ticker; `None` for search
    pub ticker: Option<Ticker>,
    /// Bar width the series was requested with
    pub interval: Option<Interval>,
    pub body: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl RawPayload {
    pub fn new(
        provider: impl Into<ProviderId>,
        operation: OperationKind,
        ticker: Option<Ticker>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation,
            ticker,
            interval: None,
            body,
            received_at: Utc::now(),
        }
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }
}
