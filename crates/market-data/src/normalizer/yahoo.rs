//! Yahoo chart and search payloads.

use serde::Deserialize;

use crate::errors::NormalizationError;
use crate::models::{
    Bar, MarketSegment, NormalizedResponse, OperationKind, Quote, RawPayload, SearchHit,
    SearchResults, Series, Ticker,
};
use crate::provider::yahoo::PROVIDER_ID;
use crate::resolver::{exchange_registry, resolve};

use super::common::{
    fail, non_empty, opt_price, opt_volume, parse_body, ticker, utc_from_secs, venue_currency,
};
use super::Normalizer;

pub(super) fn register(normalizer: &mut Normalizer) {
    normalizer.register(PROVIDER_ID, OperationKind::Quote, map_quote);
    normalizer.register(PROVIDER_ID, OperationKind::Series, map_series);
    normalizer.register(PROVIDER_ID, OperationKind::Search, map_search);
}

// ── Raw shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteIndicator>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteIndicator {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuote {
    symbol: String,
    shortname: Option<String>,
    longname: Option<String>,
    exchange: Option<String>,
    quote_type: Option<String>,
    score: Option<f64>,
}

// ── Mappings ─────────────────────────────────────────────────────────────────

fn first_result(raw: &RawPayload) -> Result<ChartResult, NormalizationError> {
    let envelope: ChartEnvelope = parse_body(raw)?;
    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| fail(raw, "chart has no result"))
}

fn at(values: &[Option<f64>], idx: usize) -> Option<f64> {
    values.get(idx).copied().flatten()
}

fn map_quote(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let result = first_result(raw)?;
    let meta = &result.meta;

    let last_price = opt_price(meta.regular_market_price)
        .ok_or_else(|| fail(raw, "meta.regularMarketPrice missing"))?;
    let timestamp = meta
        .regular_market_time
        .and_then(utc_from_secs)
        .ok_or_else(|| fail(raw, "meta.regularMarketTime missing"))?;

    // The window ends with today's bar, so the bar before it holds the
    // previous session's close.
    let bars = result.indicators.quote.first();
    let last = result.timestamp.len().checked_sub(1);
    let previous_close = match (bars, last) {
        (Some(q), Some(idx)) if idx > 0 => opt_price(at(&q.close, idx - 1)),
        _ => None,
    }
    .or_else(|| opt_price(meta.previous_close.or(meta.chart_previous_close)));

    let mut quote = Quote::new(ticker.clone(), timestamp, last_price);
    quote.open = match (bars, last) {
        (Some(q), Some(idx)) => opt_price(at(&q.open, idx)),
        _ => None,
    };
    quote.high = opt_price(meta.regular_market_day_high);
    quote.low = opt_price(meta.regular_market_day_low);
    quote.volume = opt_volume(meta.regular_market_volume);
    quote.previous_close = previous_close;
    quote.currency = meta.currency.clone().or_else(|| venue_currency(&ticker));

    Ok(NormalizedResponse::Quote(quote.derive_change()))
}

fn map_series(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let result = first_result(raw)?;
    let indicator = result.indicators.quote.first();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    if let Some(q) = indicator {
        for (idx, &ts) in result.timestamp.iter().enumerate() {
            // Yahoo pads halted sessions with nulls
            let (Some(open), Some(high), Some(low), Some(close)) = (
                opt_price(at(&q.open, idx)),
                opt_price(at(&q.high, idx)),
                opt_price(at(&q.low, idx)),
                opt_price(at(&q.close, idx)),
            ) else {
                continue;
            };
            let timestamp = utc_from_secs(ts).ok_or_else(|| fail(raw, "bad bar timestamp"))?;
            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume: opt_volume(at(&q.volume, idx)),
            });
        }
    }

    Ok(NormalizedResponse::Series(Series {
        currency: result.meta.currency.clone().or_else(|| venue_currency(&ticker)),
        ticker,
        interval: raw.interval.unwrap_or_default(),
        bars,
    }))
}

/// Canonical ticker for a Yahoo symbol, if it trades somewhere we route.
fn ticker_for(symbol: &str, exchange: Option<&str>) -> Option<Ticker> {
    if let Some((entry, code)) = exchange_registry::split_yahoo_symbol(symbol) {
        return resolve(&format!("{}:{}", entry.code, code)).ok();
    }

    let entry = exchange_registry::exchange_for_yahoo_code(exchange?)?;
    let code = match entry.segment {
        MarketSegment::UsEquity => symbol.replace('-', "."),
        MarketSegment::Crypto => symbol.trim_end_matches("-USD").to_string(),
        MarketSegment::Forex => symbol.trim_end_matches("=X").to_string(),
        MarketSegment::Index => symbol.trim_start_matches('^').to_string(),
        _ => symbol.to_string(),
    };
    resolve(&format!("{}:{}", entry.code, code)).ok()
}

fn map_search(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let envelope: SearchEnvelope = parse_body(raw)?;

    let hits = envelope
        .quotes
        .into_iter()
        .map(|q| {
            let ticker = ticker_for(&q.symbol, q.exchange.as_deref());
            let name = non_empty(q.longname.as_deref())
                .or_else(|| non_empty(q.shortname.as_deref()))
                .unwrap_or_else(|| q.symbol.clone());
            let code = ticker
                .as_ref()
                .map(|t| t.symbol().to_string())
                .unwrap_or_else(|| q.symbol.clone());

            let mut hit = SearchHit::new(code, name);
            if let Some(t) = ticker {
                let entry = exchange_registry::exchange(t.exchange());
                hit = hit
                    .with_country(entry.and_then(|e| e.country.clone()))
                    .with_currency(venue_currency(&t))
                    .with_ticker(t);
            } else {
                hit.exchange = q.exchange.clone();
            }
            if let Some(kind) = q.quote_type {
                hit = hit.with_asset_type(kind);
            }
            if let Some(score) = q.score {
                hit = hit.with_score(score);
            }
            hit
        })
        .collect();

    Ok(NormalizedResponse::Search(SearchResults {
        // Filled in when the gateway merges provider results
        query: String::new(),
        hits,
    }))
}
