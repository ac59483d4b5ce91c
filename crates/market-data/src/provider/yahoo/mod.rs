//! Yahoo Finance market data provider.
//!
//! Talks to the public chart and search endpoints:
//! - Latest quotes and OHLCV series via `/v8/finance/chart/{symbol}`
//! - Symbol search via `/v1/finance/search`
//!
//! Covers every segment we route (US, A-share, Hong Kong, crypto, forex,
//! indices) which makes it the default first candidate. No API key needed.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use urlencoding::encode;

use crate::errors::ProviderError;
use crate::models::{Interval, MarketSegment, OperationKind, RawPayload};
use crate::provider::http::HttpClient;
use crate::provider::{
    day_end_timestamp, day_start_timestamp, FetchRequest, MarketDataProvider,
    ProviderCapabilities, RateLimit,
};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const PROVIDER_ID: &str = "YAHOO";

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    http: HttpClient,
}

impl YahooProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the client at a different host (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(PROVIDER_ID, base_url),
        }
    }

    async fn chart(
        &self,
        symbol: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let path = format!("/v8/finance/chart/{}", encode(symbol));
        let body = self.http.get_json(&path, query, &[]).await?;
        check_chart_error(&body, symbol)?;
        Ok(body)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Yahoo reports unknown symbols in-band as `chart.error`.
fn check_chart_error(body: &Value, symbol: &str) -> Result<(), ProviderError> {
    let error = &body["chart"]["error"];
    if error.is_null() {
        return Ok(());
    }

    let code = error["code"].as_str().unwrap_or_default();
    let description = error["description"]
        .as_str()
        .unwrap_or("unknown error")
        .to_string();

    if code.eq_ignore_ascii_case("Not Found") {
        Err(ProviderError::SymbolNotFound(format!(
            "{}: {}",
            symbol, description
        )))
    } else {
        Err(ProviderError::Upstream(description))
    }
}

/// Yahoo interval parameter.
fn yahoo_interval(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1m",
        Interval::FiveMinutes => "5m",
        Interval::FifteenMinutes => "15m",
        Interval::ThirtyMinutes => "30m",
        Interval::OneHour => "60m",
        Interval::OneDay => "1d",
        Interval::OneWeek => "1wk",
        Interval::OneMonth => "1mo",
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            segments: &MarketSegment::ALL,
            operations: &[
                OperationKind::Quote,
                OperationKind::Series,
                OperationKind::Search,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 100,
            burst: 10,
        }
    }

    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        // A five day window makes Yahoo fill in the previous close
        let query = [
            ("interval", "1d".to_string()),
            ("range", "5d".to_string()),
        ];
        let body = self.chart(request.symbol, &query).await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Quote,
            Some(request.ticker.clone()),
            body,
        ))
    }

    async fn fetch_series(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let (start, end) = request.params.series_range(Utc::now().date_naive());
        let query = [
            ("interval", yahoo_interval(request.params.interval()).to_string()),
            ("period1", day_start_timestamp(start).to_string()),
            ("period2", day_end_timestamp(end).to_string()),
            ("events", "div,splits".to_string()),
        ];
        debug!(
            "Yahoo series for {} from {} to {}",
            request.symbol, start, end
        );
        let body = self.chart(request.symbol, &query).await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Series,
            Some(request.ticker.clone()),
            body,
        )
        .with_interval(request.params.interval()))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<RawPayload, ProviderError> {
        let params = [
            ("q", query.to_string()),
            ("quotesCount", limit.to_string()),
            ("newsCount", "0".to_string()),
            ("listsCount", "0".to_string()),
        ];
        let body = self
            .http
            .get_json("/v1/finance/search", &params, &[])
            .await?;

        Ok(RawPayload::new(PROVIDER_ID, OperationKind::Search, None, body))
    }
}
