//! EastMoney provider for mainland A-shares.
//!
//! Uses the public push endpoints behind the eastmoney.com quote pages:
//! - Realtime snapshot via `push2.eastmoney.com/api/qt/stock/get`
//! - K-lines via `push2his.eastmoney.com/api/qt/stock/kline/get`
//!
//! Instruments are addressed by `secid` (`market.code`, e.g. `1.600519`).
//! Snapshot prices are integers scaled by `10^f59`; k-line rows are
//! comma-separated strings in China Standard Time. No API key needed.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::errors::ProviderError;
use crate::models::{Interval, MarketSegment, OperationKind, RawPayload};
use crate::provider::http::HttpClient;
use crate::provider::{FetchRequest, MarketDataProvider, ProviderCapabilities, RateLimit};

const QUOTE_URL: &str = "https://push2.eastmoney.com";
const HISTORY_URL: &str = "https://push2his.eastmoney.com";
pub const PROVIDER_ID: &str = "EASTMONEY";

/// Snapshot fields: last, high, low, open, volume (lots), name, price
/// decimals, previous close, timestamp, change, change percent.
const QUOTE_FIELDS: &str = "f43,f44,f45,f46,f47,f57,f58,f59,f60,f86,f169,f170";

/// K-line row layout: date, open, close, high, low, volume (lots).
const KLINE_FIELDS: &str = "f51,f52,f53,f54,f55,f56";

/// EastMoney A-share market data provider.
pub struct EastMoneyProvider {
    quote: HttpClient,
    history: HttpClient,
}

impl EastMoneyProvider {
    pub fn new() -> Self {
        Self::with_base_urls(QUOTE_URL, HISTORY_URL)
    }

    pub fn with_base_urls(quote_url: impl Into<String>, history_url: impl Into<String>) -> Self {
        Self {
            quote: HttpClient::new(PROVIDER_ID, quote_url),
            history: HttpClient::new(PROVIDER_ID, history_url),
        }
    }
}

impl Default for EastMoneyProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// EastMoney answers unknown secids with `"data": null`.
fn require_data(body: Value, secid: &str) -> Result<Value, ProviderError> {
    if body["data"].is_null() {
        return Err(ProviderError::SymbolNotFound(secid.to_string()));
    }
    Ok(body)
}

/// `klt` parameter for an interval.
fn kline_type(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1",
        Interval::FiveMinutes => "5",
        Interval::FifteenMinutes => "15",
        Interval::ThirtyMinutes => "30",
        Interval::OneHour => "60",
        Interval::OneDay => "101",
        Interval::OneWeek => "102",
        Interval::OneMonth => "103",
    }
}

#[async_trait]
impl MarketDataProvider for EastMoneyProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            segments: &[MarketSegment::AShare],
            operations: &[OperationKind::Quote, OperationKind::Series],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 120,
            burst: 10,
        }
    }

    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let params = [
            ("secid", request.symbol.to_string()),
            ("fields", QUOTE_FIELDS.to_string()),
        ];
        let body = self
            .quote
            .get_json("/api/qt/stock/get", &params, &[])
            .await?;
        let body = require_data(body, request.symbol)?;

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
            ("secid", request.symbol.to_string()),
            ("klt", kline_type(request.params.interval()).to_string()),
            // Unadjusted prices
            ("fqt", "0".to_string()),
            ("beg", start.format("%Y%m%d").to_string()),
            ("end", end.format("%Y%m%d").to_string()),
            ("fields1", "f1,f2,f3".to_string()),
            ("fields2", KLINE_FIELDS.to_string()),
        ];
        debug!(
            "EastMoney klines for {} from {} to {}",
            request.symbol, start, end
        );
        let body = self
            .history
            .get_json("/api/qt/stock/kline/get", &params, &[])
            .await?;
        let body = require_data(body, request.symbol)?;

        let empty = body["data"]["klines"]
            .as_array()
            .map_or(true, |rows| rows.is_empty());
        if empty {
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
