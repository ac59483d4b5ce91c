//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limiting configuration
//! - Shared HTTP plumbing
//! - Concrete provider implementations (Yahoo, Finnhub, Tushare, EastMoney,
//!   CoinGecko, Binance)
//!
//! # Architecture
//!
//! Providers are deliberately thin: they receive a pre-resolved provider
//! symbol, call their upstream, and return the body as a [`RawPayload`].
//! Symbol resolution happens in the resolver module and mapping into the
//! canonical model in the normalizer, so a provider never sees another
//! provider's conventions.
//!
//! [`RawPayload`]: crate::models::RawPayload

mod capabilities;
pub mod http;
mod traits;

pub mod binance;
pub mod coingecko;
pub mod eastmoney;
pub mod finnhub;
pub mod tushare;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use http::HttpClient;
pub use traits::{FetchRequest, MarketDataProvider};

use chrono::NaiveDate;

/// Unix seconds at 00:00:00 UTC on `date`.
pub(crate) fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Unix seconds at 23:59:59 UTC on `date`, so the whole day is included.
pub(crate) fn day_end_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(day_start_timestamp(date), 1_704_153_600);
        assert_eq!(day_end_timestamp(date), 1_704_153_600 + 86_399);
    }
}
