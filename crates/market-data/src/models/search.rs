//! Search result models for symbol lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ticker::Ticker;

/// One match from a symbol search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Canonical ticker when the listing exchange is one we route
    pub ticker: Option<Ticker>,

    /// Bare instrument code without exchange decoration (e.g. "600519", "AAPL")
    pub code: String,

    /// Display name (e.g., "Apple Inc")
    pub name: String,

    /// Canonical exchange code, when known
    pub exchange: Option<String>,

    /// ISO country of the listing, when known
    pub country: Option<String>,

    /// Asset type as reported by the provider (e.g., "EQUITY", "ETF", "CRYPTO")
    pub asset_type: Option<String>,

    /// Listing currency
    pub currency: Option<String>,

    /// Relevance score from provider (higher = better match)
    pub score: Option<f64>,
}

impl SearchHit {
    /// Create a new search hit with required fields.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: None,
            code: code.into(),
            name: name.into(),
            exchange: None,
            country: None,
            asset_type: None,
            currency: None,
            score: None,
        }
    }

    /// Attach the canonical ticker and fill exchange from it.
    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.exchange = Some(ticker.exchange().to_string());
        self.ticker = Some(ticker);
        self
    }

    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country;
        self
    }

    pub fn with_asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    pub fn with_currency(mut self, currency: Option<String>) -> Self {
        self.currency = currency;
        self
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Search results for one query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

/// One news article about an instrument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub summary: Option<String>,
    /// Publisher name
    pub source: Option<String>,
    pub url: Option<String>,
    /// Publication time, UTC
    pub published_at: DateTime<Utc>,
}

/// News feed for one instrument, newest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct News {
    pub ticker: Ticker,
    pub items: Vec<NewsItem>,
}
