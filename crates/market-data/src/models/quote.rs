use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::params::Interval;
use super::ticker::Ticker;

/// Latest price snapshot.
///
/// Optional fields serialize as explicit `null` so every provider yields the
/// same set of keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Canonical ticker
    pub ticker: Ticker,

    /// Time of the last trade or update, UTC
    pub timestamp: DateTime<Utc>,

    /// Last traded price
    pub price: Decimal,

    /// Session open
    pub open: Option<Decimal>,

    /// Session high
    pub high: Option<Decimal>,

    /// Session low
    pub low: Option<Decimal>,

    /// Previous session close
    pub previous_close: Option<Decimal>,

    /// Absolute change against previous close
    pub change: Option<Decimal>,

    /// Percent change against previous close
    pub change_percent: Option<Decimal>,

    /// Traded volume in units of the instrument (shares, coins)
    pub volume: Option<Decimal>,

    /// Quote currency
    pub currency: Option<String>,
}

impl Quote {
    /// Create a quote with only the required fields set.
    pub fn new(ticker: Ticker, timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            ticker,
            timestamp,
            price,
            open: None,
            high: None,
            low: None,
            previous_close: None,
            change: None,
            change_percent: None,
            volume: None,
            currency: None,
        }
    }

    /// Fill change fields from `previous_close` when the provider omits them.
    pub fn derive_change(mut self) -> Self {
        if let Some(prev) = self.previous_close {
            if self.change.is_none() {
                self.change = Some(self.price - prev);
            }
            if self.change_percent.is_none() && !prev.is_zero() {
                self.change_percent = Some((self.price - prev) / prev * Decimal::ONE_HUNDRED);
            }
        }
        self
    }
}

/// One OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar start time, UTC
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
}

/// Historical OHLCV series, oldest bar first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub ticker: Ticker,
    pub interval: Interval,
    pub currency: Option<String>,
    pub bars: Vec<Bar>,
}
