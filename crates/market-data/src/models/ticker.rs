//! Canonical instrument identity.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::types::MarketSegment;
use crate::errors::ParseError;

/// A resolved `EXCHANGE:CODE` ticker.
///
/// Only the resolver constructs tickers, so every value has a recognized
/// exchange and an upper-cased symbol. Serializes as its canonical string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticker {
    segment: MarketSegment,
    exchange: Arc<str>,
    symbol: Arc<str>,
}

impl Ticker {
    pub(crate) fn new(segment: MarketSegment, exchange: &str, symbol: &str) -> Self {
        Self {
            segment,
            exchange: Arc::from(exchange),
            symbol: Arc::from(symbol),
        }
    }

    /// Parse a raw `EXCHANGE:CODE` string.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        crate::resolver::resolve(raw)
    }

    pub fn segment(&self) -> MarketSegment {
        self.segment
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Canonical `EXCHANGE:SYMBOL` form.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

impl FromStr for Ticker {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Ticker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ticker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ticker::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_serializes_as_canonical_string() {
        let ticker = Ticker::parse("SSE:600519").unwrap();
        assert_eq!(serde_json::to_string(&ticker).unwrap(), "\"SSE:600519\"");

        let back: Ticker = serde_json::from_str("\"SSE:600519\"").unwrap();
        assert_eq!(back, ticker);
    }

    #[test]
    fn test_deserialize_rejects_unknown_exchange() {
        let result: Result<Ticker, _> = serde_json::from_str("\"MOON:ABC\"");
        assert!(result.is_err());
    }
}
