//! EastMoney push API payloads.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::NormalizationError;
use crate::models::{Bar, NormalizedResponse, OperationKind, Quote, RawPayload, Series};
use crate::provider::eastmoney::PROVIDER_ID;

use super::common::{
    decimal_value, fail, local_date_to_utc, local_to_utc, parse_body, price, ticker,
    utc_from_secs, venue_currency, venue_offset, volume,
};
use super::Normalizer;

const SHARES_PER_LOT: i64 = 100;

/// Price decimals when the snapshot omits `f59`.
const DEFAULT_PRICE_DECIMALS: u32 = 2;

/// `f170` (percent change) always carries two implied decimals.
const PERCENT_DECIMALS: u32 = 2;

pub(super) fn register(normalizer: &mut Normalizer) {
    normalizer.register(PROVIDER_ID, OperationKind::Quote, map_quote);
    normalizer.register(PROVIDER_ID, OperationKind::Series, map_series);
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// Snapshot fields are integers with implied decimals, or `"-"` when the
/// instrument is suspended.
#[derive(Debug, Deserialize)]
struct Snapshot {
    f43: Value,
    #[serde(default)]
    f44: Value,
    #[serde(default)]
    f45: Value,
    #[serde(default)]
    f46: Value,
    #[serde(default)]
    f47: Value,
    #[serde(default)]
    f59: Option<u32>,
    #[serde(default)]
    f60: Value,
    f86: Option<i64>,
    #[serde(default)]
    f169: Value,
    #[serde(default)]
    f170: Value,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

/// Undo EastMoney's implied decimals: `172000` with 2 decimals is `1720.00`.
fn implied(value: &Value, decimals: u32) -> Option<Decimal> {
    let mut d = decimal_value(value)?;
    d.set_scale(d.scale() + decimals).ok()?;
    Some(d)
}

fn lots_to_shares(lots: Decimal) -> Decimal {
    volume(lots * Decimal::from(SHARES_PER_LOT))
}

fn map_quote(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let envelope: Envelope<Snapshot> = parse_body(raw)?;
    let snap = envelope.data.ok_or_else(|| fail(raw, "data is null"))?;

    let decimals = snap.f59.unwrap_or(DEFAULT_PRICE_DECIMALS);
    let px = |value: &Value| implied(value, decimals).map(price);

    let last = px(&snap.f43).ok_or_else(|| fail(raw, "no last price (suspended?)"))?;
    let timestamp = snap
        .f86
        .and_then(utc_from_secs)
        .ok_or_else(|| fail(raw, "f86 timestamp missing"))?;

    let mut quote = Quote::new(ticker.clone(), timestamp, last);
    quote.high = px(&snap.f44);
    quote.low = px(&snap.f45);
    quote.open = px(&snap.f46);
    quote.previous_close = px(&snap.f60);
    quote.change = px(&snap.f169);
    quote.change_percent = implied(&snap.f170, PERCENT_DECIMALS).map(price);
    quote.volume = decimal_value(&snap.f47).map(lots_to_shares);
    quote.currency = venue_currency(&ticker);

    Ok(NormalizedResponse::Quote(quote.derive_change()))
}

/// K-line dates are `YYYY-MM-DD` for daily+ bars and `YYYY-MM-DD HH:MM` intraday.
fn kline_time(text: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(local) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M") {
        return local_to_utc(local, offset);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| local_date_to_utc(date, offset))
}

fn map_series(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let offset = venue_offset(&ticker);
    let envelope: Envelope<KlineData> = parse_body(raw)?;
    let data = envelope.data.ok_or_else(|| fail(raw, "data is null"))?;

    let mut bars = Vec::with_capacity(data.klines.len());
    for line in &data.klines {
        // date, open, close, high, low, volume
        let cols: Vec<&str> = line.split(',').collect();
        if cols.len() < 6 {
            return Err(fail(raw, format!("short k-line row: {}", line)));
        }
        let num = |idx: usize| decimal_value(&Value::String(cols[idx].to_string()));

        let (Some(timestamp), Some(open), Some(close), Some(high), Some(low)) = (
            kline_time(cols[0], offset),
            num(1),
            num(2),
            num(3),
            num(4),
        ) else {
            return Err(fail(raw, format!("unreadable k-line row: {}", line)));
        };

        bars.push(Bar {
            timestamp,
            open: price(open),
            high: price(high),
            low: price(low),
            close: price(close),
            volume: num(5).map(lots_to_shares),
        });
    }

    Ok(NormalizedResponse::Series(Series {
        currency: venue_currency(&ticker),
        ticker,
        interval: raw.interval.unwrap_or_default(),
        bars,
    }))
}
