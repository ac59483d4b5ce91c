//! Binance spot payloads. Every number arrives as a string; prices are in USDT.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::NormalizationError;
use crate::models::{Bar, NormalizedResponse, OperationKind, Quote, RawPayload, Series};
use crate::provider::binance::PROVIDER_ID;

use super::common::{decimal_value, fail, parse_body, price, ticker, utc_from_millis, volume};
use super::Normalizer;

const CURRENCY: &str = "USDT";

pub(super) fn register(normalizer: &mut Normalizer) {
    normalizer.register(PROVIDER_ID, OperationKind::Quote, map_quote);
    normalizer.register(PROVIDER_ID, OperationKind::Series, map_series);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    open_price: Option<String>,
    high_price: Option<String>,
    low_price: Option<String>,
    prev_close_price: Option<String>,
    price_change: Option<String>,
    price_change_percent: Option<String>,
    volume: Option<String>,
    close_time: i64,
}

fn num(text: Option<&str>) -> Option<Decimal> {
    decimal_value(&Value::String(text?.to_string()))
}

fn map_quote(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let t: Ticker24h = parse_body(raw)?;

    let last = num(Some(&t.last_price))
        .map(price)
        .ok_or_else(|| fail(raw, format!("unreadable lastPrice {:?}", t.last_price)))?;
    let timestamp = utc_from_millis(t.close_time)
        .ok_or_else(|| fail(raw, format!("bad closeTime {}", t.close_time)))?;

    let mut quote = Quote::new(ticker, timestamp, last);
    quote.open = num(t.open_price.as_deref()).map(price);
    quote.high = num(t.high_price.as_deref()).map(price);
    quote.low = num(t.low_price.as_deref()).map(price);
    // prevClosePrice is the previous 24h window's close; the window open is a
    // better stand-in when it is missing or zero
    quote.previous_close = num(t.prev_close_price.as_deref())
        .filter(|p| !p.is_zero())
        .or(quote.open)
        .map(price);
    quote.change = num(t.price_change.as_deref()).map(price);
    quote.change_percent = num(t.price_change_percent.as_deref()).map(price);
    quote.volume = num(t.volume.as_deref()).map(volume);
    quote.currency = Some(CURRENCY.to_string());

    Ok(NormalizedResponse::Quote(quote.derive_change()))
}

fn map_series(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    // [openTime, "open", "high", "low", "close", "volume", closeTime, ...]
    let rows: Vec<Vec<Value>> = parse_body(raw)?;

    let mut bars = Vec::with_capacity(rows.len());
    for row in &rows {
        if row.len() < 6 {
            return Err(fail(raw, format!("kline has {} columns", row.len())));
        }
        let timestamp = row[0]
            .as_i64()
            .and_then(utc_from_millis)
            .ok_or_else(|| fail(raw, format!("bad kline open time {}", row[0])))?;
        let (Some(open), Some(high), Some(low), Some(close)) = (
            decimal_value(&row[1]),
            decimal_value(&row[2]),
            decimal_value(&row[3]),
            decimal_value(&row[4]),
        ) else {
            return Err(fail(raw, format!("unreadable kline at {}", timestamp)));
        };

        bars.push(Bar {
            timestamp,
            open: price(open),
            high: price(high),
            low: price(low),
            close: price(close),
            volume: decimal_value(&row[5]).map(volume),
        });
    }

    Ok(NormalizedResponse::Series(Series {
        ticker,
        interval: raw.interval.unwrap_or_default(),
        currency: Some(CURRENCY.to_string()),
        bars,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interval, Ticker};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(op: OperationKind, body: Value) -> RawPayload {
        RawPayload::new(PROVIDER_ID, op, Some(Ticker::parse("CRYPTO:BTC").unwrap()), body)
    }

    #[test]
    fn test_24h_ticker() {
        let body = json!({
            "symbol": "BTCUSDT",
            "priceChange": "800.00000000",
            "priceChangePercent": "1.200",
            "prevClosePrice": "66950.00000000",
            "lastPrice": "67750.00000000",
            "openPrice": "66950.00000000",
            "highPrice": "68000.00000000",
            "lowPrice": "66500.00000000",
            "volume": "21000.12345678",
            "openTime": 1710374400000u64,
            "closeTime": 1710460799999u64
        });
        let response = map_quote(&raw(OperationKind::Quote, body)).unwrap();
        let quote = response.as_quote().unwrap();

        assert_eq!(quote.price.to_string(), "67750.000000");
        assert_eq!(quote.change, Some(dec!(800)));
        assert_eq!(quote.volume.unwrap().to_string(), "21000.12");
        assert_eq!(quote.currency.as_deref(), Some("USDT"));
        assert_eq!(quote.timestamp.timestamp_millis(), 1_710_460_799_999);
    }

    #[test]
    fn test_zero_prev_close_falls_back_to_open() {
        let body = json!({
            "lastPrice": "110.0", "openPrice": "100.0", "prevClosePrice": "0.00000000",
            "closeTime": 1710460799999u64
        });
        let response = map_quote(&raw(OperationKind::Quote, body)).unwrap();
        let quote = response.as_quote().unwrap();

        assert_eq!(quote.previous_close, Some(dec!(100)));
        assert_eq!(quote.change_percent, Some(dec!(10)));
    }

    #[test]
    fn test_klines() {
        let body = json!([
            [1710374400000u64, "66950.00", "68000.00", "66500.00", "67750.00", "21000.5", 1710460799999u64, "1.4E9", 100, "1", "1", "0"]
        ]);
        let payload = raw(OperationKind::Series, body).with_interval(Interval::OneDay);
        let response = map_series(&payload).unwrap();
        let series = response.as_series().unwrap();

        assert_eq!(series.interval, Interval::OneDay);
        assert_eq!(series.bars[0].high, dec!(68000));
        assert_eq!(series.bars[0].volume, Some(dec!(21000.5)));
    }

    #[test]
    fn test_short_kline_fails() {
        let body = json!([[1710374400000u64, "1", "2"]]);
        assert!(map_series(&raw(OperationKind::Series, body)).is_err());
    }
}
