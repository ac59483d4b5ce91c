#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use stockgate_market_data::errors::{NormalizationError, ProviderError};
use stockgate_market_data::models::{
    Fundamentals, MarketSegment, NormalizedResponse, OperationKind, Quote, RawPayload, SearchHit,
    SearchResults,
};
use stockgate_market_data::{
    FetchRequest, MarketDataProvider, Normalizer, ProviderCapabilities, RateLimit,
};

pub const EQUITY_OPS: &[OperationKind] = &[OperationKind::Quote, OperationKind::Fundamentals];
pub const QUOTE_ONLY: &[OperationKind] = &[OperationKind::Quote];
pub const SEARCH_ONLY: &[OperationKind] = &[OperationKind::Search];

/// What a stub answers with.
#[derive(Clone, Debug)]
pub enum Behavior {
    /// Valid payload with this price
    Price(i64),
    Fail(ProviderError),
    /// A body the stub mapping cannot read
    Garbage,
}

/// Scriptable provider that counts its upstream calls.
pub struct StubProvider {
    id: &'static str,
    priority: u8,
    segments: &'static [MarketSegment],
    operations: &'static [OperationKind],
    behavior: Mutex<Behavior>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(
        id: &'static str,
        priority: u8,
        segments: &'static [MarketSegment],
        operations: &'static [OperationKind],
        behavior: Behavior,
    ) -> Self {
        Self {
            id,
            priority,
            segments,
            operations,
            behavior: Mutex::new(behavior),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// US equity provider for quotes and fundamentals.
    pub fn equity(id: &'static str, priority: u8, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self::new(
            id,
            priority,
            &[MarketSegment::UsEquity],
            EQUITY_OPS,
            behavior,
        ))
    }

    pub fn crypto(id: &'static str, priority: u8, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self::new(
            id,
            priority,
            &[MarketSegment::Crypto],
            QUOTE_ONLY,
            behavior,
        ))
    }

    /// Provider that only answers searches.
    pub fn searcher(id: &'static str, priority: u8) -> Arc<Self> {
        Arc::new(Self::new(
            id,
            priority,
            &[MarketSegment::UsEquity],
            SEARCH_ONLY,
            Behavior::Price(1),
        ))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    async fn respond(
        &self,
        request: FetchRequest<'_>,
        operation: OperationKind,
    ) -> Result<RawPayload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let behavior = self.behavior.lock().unwrap().clone();
        let body = match behavior {
            Behavior::Price(price) => json!({ "price": price, "symbol": request.symbol }),
            Behavior::Fail(error) => return Err(error),
            Behavior::Garbage => json!({ "unexpected": true }),
        };
        Ok(RawPayload::new(
            self.id,
            operation,
            Some(request.ticker.clone()),
            body,
        ))
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            segments: self.segments,
            operations: self.operations,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 6000,
            burst: 100,
        }
    }

    async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
        self.respond(request, OperationKind::Quote).await
    }

    async fn fetch_fundamentals(
        &self,
        request: FetchRequest<'_>,
    ) -> Result<RawPayload, ProviderError> {
        self.respond(request, OperationKind::Fundamentals).await
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<RawPayload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawPayload::new(
            self.id,
            OperationKind::Search,
            None,
            json!({ "query": query, "codes": ["AAPL"] }),
        ))
    }
}

fn body_price(raw: &RawPayload) -> Result<Decimal, NormalizationError> {
    raw.body["price"]
        .as_i64()
        .map(Decimal::from)
        .ok_or_else(|| {
            NormalizationError::new(raw.provider.as_ref(), raw.operation, "price missing")
        })
}

fn stub_quote(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = raw.ticker.clone().ok_or_else(|| {
        NormalizationError::new(raw.provider.as_ref(), raw.operation, "no ticker")
    })?;
    Ok(NormalizedResponse::Quote(Quote::new(
        ticker,
        Utc::now(),
        body_price(raw)?,
    )))
}

fn stub_fundamentals(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = raw.ticker.clone().ok_or_else(|| {
        NormalizationError::new(raw.provider.as_ref(), raw.operation, "no ticker")
    })?;
    let mut fundamentals = Fundamentals::new(ticker, Utc::now());
    fundamentals.pe_ratio = Some(body_price(raw)?);
    Ok(NormalizedResponse::Fundamentals(fundamentals))
}

fn stub_search(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let hits = raw.body["codes"]
        .as_array()
        .ok_or_else(|| NormalizationError::new(raw.provider.as_ref(), raw.operation, "no codes"))?
        .iter()
        .filter_map(Value::as_str)
        .map(|code| SearchHit::new(code, code))
        .collect();
    Ok(NormalizedResponse::Search(SearchResults {
        query: raw.body["query"].as_str().unwrap_or_default().to_string(),
        hits,
    }))
}

/// Built-in mappings plus stub mappings for `ids`.
pub fn normalizer_for(ids: &[&str]) -> Normalizer {
    let mut normalizer = Normalizer::with_builtin();
    for id in ids {
        normalizer.register(*id, OperationKind::Quote, stub_quote);
        normalizer.register(*id, OperationKind::Fundamentals, stub_fundamentals);
        normalizer.register(*id, OperationKind::Search, stub_search);
    }
    normalizer
}

/// Field names no canonical response may carry.
pub fn assert_no_raw_fields(value: &Value) {
    let text = value.to_string();
    for field in ["\"f43\"", "\"f86\"", "\"regularMarketPrice\"", "\"lastPrice\""] {
        assert!(!text.contains(field), "raw field {} leaked: {}", field, text);
    }
}
