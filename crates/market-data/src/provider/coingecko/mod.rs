//! CoinGecko provider for crypto assets.
//!
//! - Spot price plus 24h stats via `/simple/price`
//! - OHLC candles via `/coins/{id}/ohlc`
//! - Asset descriptions via `/coins/{id}`
//! - Coin search via `/search`
//!
//! Prices are quoted in USD. The demo tier works without a key but is
//! throttled hard; a demo key is sent as `x-cg-demo-api-key`.
//! API documentation: https://docs.coingecko.com/reference/introduction

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::errors::ProviderError;
use crate::models::{MarketSegment, OperationKind, RawPayload};
use crate::provider::http::HttpClient;
use crate::provider::{FetchRequest, MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const PROVIDER_ID: &str = "COINGECKO";

const VS_CURRENCY: &str = "usd";

/// CoinGecko crypto market data provider.
pub struct CoinGeckoProvider {
    http: HttpClient,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(PROVIDER_ID, base_url),
            api_key,
        }
    }

    async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let headers: Vec<(&str, &str)> = self
            .api_key
            .as_deref()
            .map(|key| vec![("x-cg-demo-api-key", key)])
            .unwrap_or_default();
        self.http.get_json(path, params, &headers).await
    }
}

/// OHLC `days` parameter; CoinGecko only accepts a fixed set of values.
fn ohlc_days(span_days: i64) -> &'static str {
    match span_days {
        d if d <= 1 => "1",
        d if d <= 7 => "7",
        d if d <= 14 => "14",
        d if d <= 30 => "30",
        d if d <= 90 => "90",
        d if d <= 180 => "180",
        d if d <= 365 => "365",
        _ => "max",
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            segments: &[MarketSegment::Crypto],
            operations: &[
                OperationKind::Quote,
                OperationKind::Series,
                OperationKind::Profile,
                OperationKind::Search,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 30,
            burst: 5,
        }
    }

    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let params = [
            ("ids", request.symbol.to_string()),
            ("vs_currencies", VS_CURRENCY.to_string()),
            ("include_24hr_change", "true".to_string()),
            ("include_24hr_vol", "true".to_string()),
            ("include_last_updated_at", "true".to_string()),
        ];
        let body = self.fetch("/simple/price", &params).await?;

        // Unknown ids come back as an empty object
        if body.get(request.symbol).map_or(true, Value::is_null) {
            return Err(ProviderError::SymbolNotFound(request.symbol.to_string()));
        }

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Quote,
            Some(request.ticker.clone()),
            body,
        ))
    }

    async fn fetch_series(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let today = Utc::now().date_naive();
        let (start, _) = request.params.series_range(today);
        let span = (today - start).num_days();
        let params = [
            ("vs_currency", VS_CURRENCY.to_string()),
            ("days", ohlc_days(span).to_string()),
        ];
        let path = format!("/coins/{}/ohlc", request.symbol);
        let body = self.fetch(&path, &params).await?;

        if body.as_array().map_or(true, |rows| rows.is_empty()) {
            return Err(ProviderError::NoData(format!(
                "no candles for {}",
                request.symbol
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

    async fn fetch_profile(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let params = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("market_data", "false".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
        ];
        let path = format!("/coins/{}", request.symbol);
        let body = self.fetch(&path, &params).await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Profile,
            Some(request.ticker.clone()),
            body,
        ))
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<RawPayload, ProviderError> {
        let body = self.fetch("/search", &[("query", query.to_string())]).await?;
        Ok(RawPayload::new(PROVIDER_ID, OperationKind::Search, None, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestParams, Ticker};
    use mockito::Matcher;

    #[test]
    fn test_ohlc_days_buckets() {
        assert_eq!(ohlc_days(0), "1");
        assert_eq!(ohlc_days(5), "7");
        assert_eq!(ohlc_days(365), "365");
        assert_eq!(ohlc_days(1000), "max");
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let provider = CoinGeckoProvider::with_base_url(None, server.url());
        let ticker = Ticker::parse("CRYPTO:NOPE").unwrap();
        let params = RequestParams::default();
        let error = provider
            .fetch_quote(FetchRequest {
                ticker: &ticker,
                symbol: "nope",
                params: &params,
            })
            .await
            .unwrap_err();

        assert_eq!(error, ProviderError::SymbolNotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_demo_key_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/simple/price")
            .match_header("x-cg-demo-api-key", "demo")
            .match_query(Matcher::UrlEncoded("ids".into(), "bitcoin".into()))
            .with_status(200)
            .with_body(r#"{"bitcoin": {"usd": 43000.5, "last_updated_at": 1700000000}}"#)
            .create_async()
            .await;

        let provider = CoinGeckoProvider::with_base_url(Some("demo".to_string()), server.url());
        let ticker = Ticker::parse("CRYPTO:BTC").unwrap();
        let params = RequestParams::default();
        let raw = provider
            .fetch_quote(FetchRequest {
                ticker: &ticker,
                symbol: "bitcoin",
                params: &params,
            })
            .await
            .unwrap();

        assert_eq!(raw.body["bitcoin"]["usd"], 43000.5);
        mock.assert_async().await;
    }
}
