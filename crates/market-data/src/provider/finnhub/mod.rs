//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Quotes via /quote
//! - Candles via /stock/candle, /crypto/candle and /forex/candle
//! - Company profiles via /stock/profile2
//! - Basic financials via /stock/metric
//! - Company news via /company-news
//! - Symbol search via /search
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::errors::ProviderError;
use crate::models::{Interval, MarketSegment, OperationKind, RawPayload};
use crate::provider::http::HttpClient;
use crate::provider::{
    day_end_timestamp, day_start_timestamp, FetchRequest, MarketDataProvider,
    ProviderCapabilities, RateLimit,
};

const BASE_URL: &str = "https://finnhub.io/api/v1";
pub const PROVIDER_ID: &str = "FINNHUB";

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
///
/// Supports US equities plus crypto and forex candles.
/// Free tier is limited to 60 API calls per minute.
pub struct FinnhubProvider {
    http: HttpClient,
    api_key: String,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider with the given API key.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(PROVIDER_ID, base_url),
            api_key,
        }
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        // API key as header rather than query param keeps it out of logs
        let headers = [("X-Finnhub-Token", self.api_key.as_str())];
        let body = self.http.get_json(endpoint, params, &headers).await?;

        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(ProviderError::Upstream(error.to_string()));
        }
        Ok(body)
    }

    fn payload(operation: OperationKind, request: &FetchRequest<'_>, body: Value) -> RawPayload {
        RawPayload::new(PROVIDER_ID, operation, Some(request.ticker.clone()), body)
    }
}

/// Finnhub candle resolution parameter.
fn resolution(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1",
        Interval::FiveMinutes => "5",
        Interval::FifteenMinutes => "15",
        Interval::ThirtyMinutes => "30",
        Interval::OneHour => "60",
        Interval::OneDay => "D",
        Interval::OneWeek => "W",
        Interval::OneMonth => "M",
    }
}

fn candle_endpoint(segment: MarketSegment) -> &'static str {
    match segment {
        MarketSegment::Crypto => "/crypto/candle",
        MarketSegment::Forex => "/forex/candle",
        _ => "/stock/candle",
    }
}

/// Finnhub answers unknown symbols with an all-zero quote instead of an error.
fn is_empty_quote(body: &Value) -> bool {
    let zero = |key: &str| body[key].as_f64().map_or(true, |v| v == 0.0);
    zero("c") && zero("t")
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            segments: &[
                MarketSegment::UsEquity,
                MarketSegment::Crypto,
                MarketSegment::Forex,
            ],
            operations: &[
                OperationKind::Quote,
                OperationKind::Series,
                OperationKind::Profile,
                OperationKind::Fundamentals,
                OperationKind::News,
                OperationKind::Search,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 60,
            burst: 5,
        }
    }

    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let body = self
            .fetch("/quote", &[("symbol", request.symbol.to_string())])
            .await?;

        if is_empty_quote(&body) {
            return Err(ProviderError::SymbolNotFound(format!(
                "Symbol not found or no trading data: {}",
                request.symbol
            )));
        }
        Ok(Self::payload(OperationKind::Quote, &request, body))
    }

    async fn fetch_series(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let (start, end) = request.params.series_range(Utc::now().date_naive());
        let params = [
            ("symbol", request.symbol.to_string()),
            ("resolution", resolution(request.params.interval()).to_string()),
            ("from", day_start_timestamp(start).to_string()),
            ("to", day_end_timestamp(end).to_string()),
        ];
        let body = self
            .fetch(candle_endpoint(request.ticker.segment()), &params)
            .await?;

        if body["s"].as_str() == Some("no_data") {
            return Err(ProviderError::NoData(format!(
                "{} between {} and {}",
                request.symbol, start, end
            )));
        }
        let payload = Self::payload(OperationKind::Series, &request, body);
        Ok(payload.with_interval(request.params.interval()))
    }

    async fn fetch_profile(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        if request.ticker.segment() != MarketSegment::UsEquity {
            return Err(ProviderError::NotSupported(OperationKind::Profile));
        }

        let body = self
            .fetch("/stock/profile2", &[("symbol", request.symbol.to_string())])
            .await?;

        // Empty object means unknown symbol
        if body.as_object().map_or(true, |o| o.is_empty()) {
            return Err(ProviderError::SymbolNotFound(request.symbol.to_string()));
        }
        Ok(Self::payload(OperationKind::Profile, &request, body))
    }

    async fn fetch_fundamentals(
        &self,
        request: FetchRequest<'_>,
    ) -> Result<RawPayload, ProviderError> {
        if request.ticker.segment() != MarketSegment::UsEquity {
            return Err(ProviderError::NotSupported(OperationKind::Fundamentals));
        }

        let params = [
            ("symbol", request.symbol.to_string()),
            ("metric", "all".to_string()),
        ];
        let body = self.fetch("/stock/metric", &params).await?;

        if body["metric"].as_object().map_or(true, |o| o.is_empty()) {
            return Err(ProviderError::NoData(format!(
                "no metrics for {}",
                request.symbol
            )));
        }
        Ok(Self::payload(OperationKind::Fundamentals, &request, body))
    }

    async fn fetch_news(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let (start, end) = request.params.news_range(Utc::now().date_naive());
        let params = [
            ("symbol", request.symbol.to_string()),
            ("from", start.format("%Y-%m-%d").to_string()),
            ("to", end.format("%Y-%m-%d").to_string()),
        ];
        debug!("Finnhub news for {} from {} to {}", request.symbol, start, end);
        let body = self.fetch("/company-news", &params).await?;
        Ok(Self::payload(OperationKind::News, &request, body))
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<RawPayload, ProviderError> {
        let body = self.fetch("/search", &[("q", query.to_string())]).await?;
        Ok(RawPayload::new(PROVIDER_ID, OperationKind::Search, None, body))
    }
}
