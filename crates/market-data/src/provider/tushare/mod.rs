//! Tushare Pro provider for mainland A-shares.
//!
//! Every call is a POST of `{api_name, token, params, fields}` to a single
//! endpoint; responses carry `{code, msg, data: {fields, items}}`. Dates are
//! `YYYYMMDD` in China Standard Time and volumes are in lots of 100 shares;
//! the normalizer converts both.
//!
//! API documentation: https://tushare.pro/document/2

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::ProviderError;
use crate::models::{Interval, MarketSegment, OperationKind, RawPayload};
use crate::provider::http::HttpClient;
use crate::provider::{FetchRequest, MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "http://api.tushare.pro";
pub const PROVIDER_ID: &str = "TUSHARE";

/// Calendar days looked back for "latest" daily rows; covers long holidays.
const LATEST_LOOKBACK_DAYS: i64 = 14;

const DAILY_FIELDS: &str = "ts_code,trade_date,open,high,low,close,pre_close,change,pct_chg,vol,amount";
const BASIC_FIELDS: &str = "ts_code,symbol,name,area,industry,market,list_date";
const DAILY_BASIC_FIELDS: &str =
    "ts_code,trade_date,close,pe_ttm,pb,dv_ttm,total_share,total_mv";

/// Tushare Pro market data provider.
pub struct TushareProvider {
    http: HttpClient,
    token: String,
}

impl TushareProvider {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL)
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(PROVIDER_ID, base_url),
            token,
        }
    }

    /// Invoke one Tushare API and return the full response body.
    ///
    /// Non-zero `code` is an in-band failure; an empty item table is
    /// reported with `empty`.
    async fn call(
        &self,
        api_name: &str,
        params: Value,
        fields: &str,
        empty: impl FnOnce() -> ProviderError,
    ) -> Result<Value, ProviderError> {
        let request = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });
        debug!("Tushare call: {}", api_name);

        let body = self.http.post_json("/", &request).await?;

        let code = body["code"].as_i64().unwrap_or(-1);
        if code != 0 {
            let msg = body["msg"].as_str().unwrap_or("unknown error").to_string();
            warn!("Tushare {} failed with code {}: {}", api_name, code, msg);
            return Err(ProviderError::Upstream(format!("code {}: {}", code, msg)));
        }

        let has_rows = body["data"]["items"]
            .as_array()
            .map_or(false, |items| !items.is_empty());
        if !has_rows {
            return Err(empty());
        }
        Ok(body)
    }
}

fn tushare_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Daily-or-coarser API for an interval; Tushare minute bars need a paid tier.
fn series_api(interval: Interval) -> Option<&'static str> {
    match interval {
        Interval::OneDay => Some("daily"),
        Interval::OneWeek => Some("weekly"),
        Interval::OneMonth => Some("monthly"),
        _ => None,
    }
}

#[async_trait]
impl MarketDataProvider for TushareProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            segments: &[MarketSegment::AShare],
            operations: &[
                OperationKind::Quote,
                OperationKind::Series,
                OperationKind::Profile,
                OperationKind::Fundamentals,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 200,
            burst: 10,
        }
    }

    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let today = Utc::now().date_naive();
        let params = json!({
            "ts_code": request.symbol,
            "start_date": tushare_date(today - Duration::days(LATEST_LOOKBACK_DAYS)),
            "end_date": tushare_date(today),
        });
        let body = self
            .call("daily", params, DAILY_FIELDS, || {
                ProviderError::SymbolNotFound(request.symbol.to_string())
            })
            .await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Quote,
            Some(request.ticker.clone()),
            body,
        ))
    }

    async fn fetch_series(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let interval = request.params.interval();
        let api = series_api(interval).ok_or(ProviderError::NotSupported(OperationKind::Series))?;
        let (start, end) = request.params.series_range(Utc::now().date_naive());
        let params = json!({
            "ts_code": request.symbol,
            "start_date": tushare_date(start),
            "end_date": tushare_date(end),
        });
        let body = self
            .call(api, params, DAILY_FIELDS, || {
                ProviderError::NoData(format!("{} between {} and {}", request.symbol, start, end))
            })
            .await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Series,
            Some(request.ticker.clone()),
            body,
        )
        .with_interval(request.params.interval()))
    }

    async fn fetch_profile(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        let params = json!({ "ts_code": request.symbol });
        let body = self
            .call("stock_basic", params, BASIC_FIELDS, || {
                ProviderError::SymbolNotFound(request.symbol.to_string())
            })
            .await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Profile,
            Some(request.ticker.clone()),
            body,
        ))
    }

    async fn fetch_fundamentals(
        &self,
        request: FetchRequest<'_>,
    ) -> Result<RawPayload, ProviderError> {
        let today = Utc::now().date_naive();
        let params = json!({
            "ts_code": request.symbol,
            "start_date": tushare_date(today - Duration::days(LATEST_LOOKBACK_DAYS)),
            "end_date": tushare_date(today),
        });
        let body = self
            .call("daily_basic", params, DAILY_BASIC_FIELDS, || {
                ProviderError::NoData(format!("no daily_basic rows for {}", request.symbol))
            })
            .await?;

        Ok(RawPayload::new(
            PROVIDER_ID,
            OperationKind::Fundamentals,
            Some(request.ticker.clone()),
            body,
        ))
    }
}
