//! CoinGecko payloads.
//!
//! Everything is quoted in USD. `/simple/price` reports 24h volume in USD,
//! which is converted to units of the coin so it lines up with the other
//! crypto sources.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::NormalizationError;
use crate::models::{
    Bar, NormalizedResponse, OperationKind, Profile, Quote, RawPayload, SearchHit, SearchResults,
    Series,
};
use crate::provider::coingecko::PROVIDER_ID;
use crate::resolver::{exchange_registry, resolve};

use super::common::{
    decimal, fail, non_empty, opt_price, parse_body, price, ticker, utc_from_millis, utc_from_secs,
    volume,
};
use super::Normalizer;

const CURRENCY: &str = "USD";

pub(super) fn register(normalizer: &mut Normalizer) {
    normalizer.register(PROVIDER_ID, OperationKind::Quote, map_quote);
    normalizer.register(PROVIDER_ID, OperationKind::Series, map_series);
    normalizer.register(PROVIDER_ID, OperationKind::Profile, map_profile);
    normalizer.register(PROVIDER_ID, OperationKind::Search, map_search);
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
    usd_24h_vol: Option<f64>,
    last_updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CoinDetail {
    name: Option<String>,
    #[serde(default)]
    description: HashMap<String, String>,
    #[serde(default)]
    categories: Vec<Option<String>>,
    links: Option<Links>,
    genesis_date: Option<String>,
    country_origin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    homepage: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    coins: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct Coin {
    id: String,
    name: String,
    symbol: String,
    market_cap_rank: Option<u32>,
}

fn map_quote(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let prices: HashMap<String, SimplePrice> = parse_body(raw)?;
    let id = exchange_registry::coingecko_id(ticker.symbol());
    let entry = prices
        .get(&id)
        .or_else(|| prices.values().next())
        .ok_or_else(|| fail(raw, format!("no price for {}", id)))?;

    let last = entry
        .usd
        .and_then(decimal)
        .filter(|p| !p.is_zero())
        .ok_or_else(|| fail(raw, "usd price missing"))?;
    let timestamp = entry
        .last_updated_at
        .and_then(utc_from_secs)
        .ok_or_else(|| fail(raw, "last_updated_at missing"))?;

    let mut quote = Quote::new(ticker, timestamp, price(last));
    quote.currency = Some(CURRENCY.to_string());
    quote.volume = entry
        .usd_24h_vol
        .and_then(decimal)
        .map(|usd| volume(usd / last));

    if let Some(pct) = entry.usd_24h_change.and_then(decimal) {
        let factor = Decimal::ONE + pct / Decimal::ONE_HUNDRED;
        if !factor.is_zero() {
            let previous = last / factor;
            quote.previous_close = Some(price(previous));
            quote.change = Some(price(last - previous));
        }
        quote.change_percent = Some(price(pct));
    }

    Ok(NormalizedResponse::Quote(quote))
}

fn map_series(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    // [[time_ms, open, high, low, close], ...]
    let rows: Vec<Vec<f64>> = parse_body(raw)?;

    let mut bars = Vec::with_capacity(rows.len());
    for row in &rows {
        let [ms, open, high, low, close] = row.as_slice() else {
            return Err(fail(raw, format!("expected 5 columns, got {}", row.len())));
        };
        let timestamp = utc_from_millis(*ms as i64)
            .ok_or_else(|| fail(raw, format!("bad candle time {}", ms)))?;
        let ohlc = [*open, *high, *low, *close].map(|v| opt_price(Some(v)));
        let [Some(open), Some(high), Some(low), Some(close)] = ohlc else {
            return Err(fail(raw, "non-finite candle value"));
        };
        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
        });
    }
    bars.sort_by_key(|bar| bar.timestamp);

    Ok(NormalizedResponse::Series(Series {
        ticker,
        interval: raw.interval.unwrap_or_default(),
        currency: Some(CURRENCY.to_string()),
        bars,
    }))
}

fn map_profile(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let detail: CoinDetail = parse_body(raw)?;

    let mut profile = Profile::new(ticker);
    profile.name = non_empty(detail.name.as_deref());
    profile.description = non_empty(detail.description.get("en").map(String::as_str));
    profile.sector = Some("Cryptocurrency".to_string());
    profile.industry = detail
        .categories
        .iter()
        .flatten()
        .find(|c| !c.trim().is_empty())
        .cloned();
    profile.website = detail
        .links
        .and_then(|links| links.homepage.into_iter().find(|url| !url.trim().is_empty()));
    profile.country = non_empty(detail.country_origin.as_deref());
    profile.currency = Some(CURRENCY.to_string());
    profile.listing_date = detail
        .genesis_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(NormalizedResponse::Profile(profile))
}

fn map_search(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let envelope: SearchEnvelope = parse_body(raw)?;

    let hits = envelope
        .coins
        .into_iter()
        .map(|coin| {
            let symbol = exchange_registry::coingecko_symbol(&coin.id)
                .map(str::to_string)
                .unwrap_or_else(|| coin.symbol.to_uppercase());
            let mut hit = SearchHit::new(symbol.clone(), coin.name)
                .with_asset_type("CRYPTO")
                .with_currency(Some(CURRENCY.to_string()));
            if let Ok(ticker) = resolve(&format!("CRYPTO:{}", symbol)) {
                hit = hit.with_ticker(ticker);
            }
            if let Some(rank) = coin.market_cap_rank.filter(|r| *r > 0) {
                hit = hit.with_score(1.0 / f64::from(rank));
            }
            hit
        })
        .collect();

    Ok(NormalizedResponse::Search(SearchResults {
        query: String::new(),
        hits,
    }))
}
