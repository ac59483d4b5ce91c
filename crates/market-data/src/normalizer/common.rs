//! Shared conversions used by the per-provider mappings.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::NormalizationError;
use crate::models::{MarketSegment, RawPayload, Ticker, PRICE_SCALE, VOLUME_SCALE};
use crate::resolver::exchange_registry;

/// China Standard Time, used when the catalog has no offset for an A-share venue.
const CST_OFFSET_SECS: i32 = 8 * 3600;

/// Build a [`NormalizationError`] for `raw`.
pub(crate) fn fail(raw: &RawPayload, message: impl Into<String>) -> NormalizationError {
    NormalizationError::new(raw.provider.as_ref(), raw.operation, message)
}

/// Deserialize the payload body into a provider-specific raw struct.
pub(crate) fn parse_body<T: DeserializeOwned>(raw: &RawPayload) -> Result<T, NormalizationError> {
    serde_json::from_value(raw.body.clone())
        .map_err(|e| fail(raw, format!("unexpected payload shape: {}", e)))
}

/// The ticker the request was made for.
pub(crate) fn ticker(raw: &RawPayload) -> Result<Ticker, NormalizationError> {
    raw.ticker
        .clone()
        .ok_or_else(|| fail(raw, "payload carries no ticker"))
}

/// Decimal from a float, rejecting NaN and infinities.
pub(crate) fn decimal(value: f64) -> Option<Decimal> {
    if value.is_finite() {
        Decimal::from_f64(value)
    } else {
        None
    }
}

/// Decimal from a JSON number or numeric string; anything else is `None`.
pub(crate) fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => n.as_f64().and_then(decimal),
        },
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "-" {
                None
            } else {
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .ok()
            }
        }
        _ => None,
    }
}

fn with_scale(value: Decimal, scale: u32) -> Decimal {
    let mut scaled = value.round_dp(scale);
    scaled.rescale(scale);
    scaled
}

/// Round and pad a price to the canonical scale.
pub(crate) fn price(value: Decimal) -> Decimal {
    with_scale(value, PRICE_SCALE)
}

/// Round and pad a volume to the canonical scale.
pub(crate) fn volume(value: Decimal) -> Decimal {
    with_scale(value, VOLUME_SCALE)
}

pub(crate) fn opt_price(value: Option<f64>) -> Option<Decimal> {
    value.and_then(decimal).map(price)
}

pub(crate) fn opt_volume(value: Option<f64>) -> Option<Decimal> {
    value.and_then(decimal).map(volume)
}

pub(crate) fn utc_from_secs(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

pub(crate) fn utc_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Fixed UTC offset of the ticker's venue, falling back to China Standard
/// Time for A-share venues and UTC for everything else.
pub(crate) fn venue_offset(ticker: &Ticker) -> FixedOffset {
    exchange_registry::exchange(ticker.exchange())
        .and_then(|entry| entry.utc_offset())
        .or_else(|| match ticker.segment() {
            MarketSegment::AShare => FixedOffset::east_opt(CST_OFFSET_SECS),
            _ => None,
        })
        .unwrap_or_else(|| Utc.fix())
}

/// Trading currency of the ticker's venue; forex pairs quote in their second leg.
pub(crate) fn venue_currency(ticker: &Ticker) -> Option<String> {
    if ticker.segment() == MarketSegment::Forex {
        let symbol = ticker.symbol();
        return (symbol.len() == 6).then(|| symbol[3..].to_string());
    }
    exchange_registry::exchange(ticker.exchange()).and_then(|entry| entry.currency.clone())
}

/// Midnight of a venue-local calendar date, as UTC.
pub(crate) fn local_date_to_utc(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    local_to_utc(date.and_hms_opt(0, 0, 0)?, offset)
}

/// A venue-local wall-clock time, as UTC.
pub(crate) fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Non-empty trimmed string.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
