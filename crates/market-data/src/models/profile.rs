use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ticker::Ticker;

/// Descriptive company or asset data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub ticker: Ticker,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub website: Option<String>,
    pub employees: Option<u64>,
    pub listing_date: Option<NaiveDate>,
}

impl Profile {
    pub fn new(ticker: Ticker) -> Self {
        Self {
            ticker,
            name: None,
            description: None,
            sector: None,
            industry: None,
            country: None,
            currency: None,
            website: None,
            employees: None,
            listing_date: None,
        }
    }
}

/// Valuation and balance-sheet ratios.
///
/// Monetary amounts are in whole currency units and share counts in shares,
/// whatever multiplier the provider reports in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub ticker: Ticker,
    /// When the figures were observed, UTC
    pub as_of: DateTime<Utc>,
    pub currency: Option<String>,
    pub market_cap: Option<Decimal>,
    pub shares_outstanding: Option<Decimal>,
    pub pe_ratio: Option<Decimal>,
    pub pb_ratio: Option<Decimal>,
    pub eps: Option<Decimal>,
    /// Percent, e.g. `1.25` for 1.25%
    pub dividend_yield: Option<Decimal>,
    pub beta: Option<Decimal>,
    pub week_52_high: Option<Decimal>,
    pub week_52_low: Option<Decimal>,
}

impl Fundamentals {
    pub fn new(ticker: Ticker, as_of: DateTime<Utc>) -> Self {
        Self {
            ticker,
            as_of,
            currency: None,
            market_cap: None,
            shares_outstanding: None,
            pe_ratio: None,
            pb_ratio: None,
            eps: None,
            dividend_yield: None,
            beta: None,
            week_52_high: None,
            week_52_low: None,
        }
    }
}
