//! Binance spot market provider.
//!
//! - 24h rolling ticker via `/api/v3/ticker/24hr`
//! - Candles via `/api/v3/klines`
//!
//! Crypto symbols are quoted against USDT (`BTCUSDT`). Public endpoints, no
//! API key needed.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::errors::ProviderError;
use crate::models::{Interval, MarketSegment, OperationKind, RawPayload};
use crate::provider::http::HttpClient;
use crate::provider::{
    day_end_timestamp, day_start_timestamp, FetchRequest, MarketDataProvider,
    ProviderCapabilities, RateLimit,
};

const BASE_URL: &str = "https://api.binance.com";
pub const PROVIDER_ID: &str = "BINANCE";

/// Largest page `/klines` returns.
const MAX_KLINES: u32 = 1000;

/// Binance error code for an unknown trading pair.
const INVALID_SYMBOL: &str = "-1121";

/// Binance spot market data provider.
pub struct BinanceProvider {
    http: HttpClient,
}

impl BinanceProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(PROVIDER_ID, base_url),
        }
    }

    async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        self.http
            .get_json(path, params, &[])
            .await
            .map_err(|e| match e {
                // Unknown pairs come back as HTTP 400 with code -1121
                ProviderError::Http { status: 400, message } if message.contains(INVALID_SYMBOL) => {
                    ProviderError::SymbolNotFound(message)
                }
                other => other,
            })
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn kline_interval(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1m",
        Interval::FiveMinutes => "5m",
        Interval::FifteenMinutes => "15m",
        Interval::ThirtyMinutes => "30m",
        Interval::OneHour => "1h",
        Interval::OneDay => "1d",
        Interval::OneWeek => "1w",
        Interval::OneMonth => "1M",
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            segments: &[MarketSegment::Crypto],
            operations: &[OperationKind::Quote, OperationKind::Series],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 600,
            burst: 20,
        }
    }

    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let body = self
            .fetch("/api/v3/ticker/24hr", &[("symbol", request.symbol.to_string())])
            .await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Quote,
            Some(request.ticker.clone()),
            body,
        ))
    }

    async fn fetch_series(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let (start, end) = request.params.series_range(Utc::now().date_naive());
        let params = [
            ("symbol", request.symbol.to_string()),
            ("interval", kline_interval(request.params.interval()).to_string()),
            ("startTime", (day_start_timestamp(start) * 1000).to_string()),
            ("endTime", (day_end_timestamp(end) * 1000 + 999).to_string()),
            ("limit", MAX_KLINES.to_string()),
        ];
        let body = self.fetch("/api/v3/klines", &params).await?;

        if body.as_array().map_or(true, |rows| rows.is_empty()) {
            return Err(ProviderError::NoData(format!(
                "{} between {} and {}",
                request.symbol, start, end
            )));
        }

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Series,
            Some(request.ticker.clone()),
            body,
        )
        .with_interval(request.params.interval()))
    }
}
