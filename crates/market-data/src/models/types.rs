use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Currency code (ISO 4217) - mostly static
pub type Currency = Cow<'static, str>;

/// Provider-specific symbol derived from a canonical ticker
pub type ProviderSymbol = Arc<str>;

/// Fixed number of decimal places for every price in a normalized response.
pub const PRICE_SCALE: u32 = 6;

/// Fixed number of decimal places for every volume in a normalized response.
pub const VOLUME_SCALE: u32 = 2;

/// Market category used to scope provider eligibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSegment {
    UsEquity,
    AShare,
    HkEquity,
    Crypto,
    Forex,
    Index,
}

impl MarketSegment {
    pub const ALL: [MarketSegment; 6] = [
        MarketSegment::UsEquity,
        MarketSegment::AShare,
        MarketSegment::HkEquity,
        MarketSegment::Crypto,
        MarketSegment::Forex,
        MarketSegment::Index,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsEquity => "US_EQUITY",
            Self::AShare => "A_SHARE",
            Self::HkEquity => "HK_EQUITY",
            Self::Crypto => "CRYPTO",
            Self::Forex => "FOREX",
            Self::Index => "INDEX",
        }
    }
}

impl fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|segment| segment.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown market segment '{}'", s))
    }
}

/// Kind of data a request asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Quote,
    Series,
    Profile,
    Fundamentals,
    News,
    Search,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Quote,
        OperationKind::Series,
        OperationKind::Profile,
        OperationKind::Fundamentals,
        OperationKind::News,
        OperationKind::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Series => "series",
            Self::Profile => "profile",
            Self::Fundamentals => "fundamentals",
            Self::News => "news",
            Self::Search => "search",
        }
    }

    /// Live quotes are raced across several providers; everything else is
    /// attempted sequentially to conserve rate-limit budget.
    pub fn is_latency_sensitive(&self) -> bool {
        matches!(self, Self::Quote)
    }

    /// Search is keyed by a free-text query, every other operation by a ticker.
    pub fn requires_ticker(&self) -> bool {
        !matches!(self, Self::Search)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}
