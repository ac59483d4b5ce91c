//! Tushare Pro tables.
//!
//! Every API answers with a column list plus rows of positional values.
//! Dates are `YYYYMMDD` in China Standard Time, volumes are lots of 100
//! shares, and `daily_basic` reports shares and market value in units of
//! 10,000.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::NormalizationError;
use crate::models::{
    Bar, Fundamentals, NormalizedResponse, OperationKind, Profile, Quote, RawPayload, Series,
};
use crate::provider::tushare::PROVIDER_ID;

use super::common::{
    decimal_value, fail, local_date_to_utc, local_to_utc, non_empty, parse_body, price, ticker,
    venue_currency, venue_offset, volume,
};
use super::Normalizer;

const SHARES_PER_LOT: i64 = 100;
const TEN_THOUSAND: i64 = 10_000;

pub(super) fn register(normalizer: &mut Normalizer) {
    normalizer.register(PROVIDER_ID, OperationKind::Quote, map_quote);
    normalizer.register(PROVIDER_ID, OperationKind::Series, map_series);
    normalizer.register(PROVIDER_ID, OperationKind::Profile, map_profile);
    normalizer.register(PROVIDER_ID, OperationKind::Fundamentals, map_fundamentals);
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Table,
}

#[derive(Debug, Deserialize)]
struct Table {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

/// One positional row viewed through the column list.
struct Row<'a> {
    fields: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    fn get(&self, name: &str) -> Option<&'a Value> {
        let idx = self.fields.iter().position(|f| f == name)?;
        self.values.get(idx)
    }

    fn decimal(&self, name: &str) -> Option<Decimal> {
        self.get(name).and_then(decimal_value)
    }

    fn text(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_str)
    }

    fn date(&self, name: &str) -> Option<NaiveDate> {
        self.text(name)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
    }
}

impl Table {
    fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.items.iter().map(move |values| Row {
            fields: &self.fields,
            values,
        })
    }

    /// Row with the most recent `trade_date`; Tushare usually sorts newest first
    /// but does not promise it.
    fn latest(&self) -> Option<Row<'_>> {
        self.rows()
            .filter(|row| row.date("trade_date").is_some())
            .max_by_key(|row| row.date("trade_date"))
    }
}

fn table(raw: &RawPayload) -> Result<Table, NormalizationError> {
    let envelope: Envelope = parse_body(raw)?;
    Ok(envelope.data)
}

fn lots_to_shares(lots: Decimal) -> Decimal {
    volume(lots * Decimal::from(SHARES_PER_LOT))
}

/// Daily rows describe the session that closes at 15:00 Shanghai time.
fn session_close(raw: &RawPayload, date: NaiveDate) -> Result<DateTime<Utc>, NormalizationError> {
    let ticker = ticker(raw)?;
    let close = NaiveTime::from_hms_opt(15, 0, 0).ok_or_else(|| fail(raw, "bad session time"))?;
    local_to_utc(date.and_time(close), venue_offset(&ticker))
        .ok_or_else(|| fail(raw, format!("cannot place {} in UTC", date)))
}

fn map_quote(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let table = table(raw)?;
    let row = table.latest().ok_or_else(|| fail(raw, "no dated rows"))?;

    let trade_date = row
        .date("trade_date")
        .ok_or_else(|| fail(raw, "trade_date missing"))?;
    let close = row
        .decimal("close")
        .map(price)
        .ok_or_else(|| fail(raw, "close missing"))?;

    let mut quote = Quote::new(ticker.clone(), session_close(raw, trade_date)?, close);
    quote.open = row.decimal("open").map(price);
    quote.high = row.decimal("high").map(price);
    quote.low = row.decimal("low").map(price);
    quote.previous_close = row.decimal("pre_close").map(price);
    quote.change = row.decimal("change").map(price);
    quote.change_percent = row.decimal("pct_chg").map(price);
    quote.volume = row.decimal("vol").map(lots_to_shares);
    quote.currency = venue_currency(&ticker);

    Ok(NormalizedResponse::Quote(quote.derive_change()))
}

fn map_series(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let offset = venue_offset(&ticker);
    let table = table(raw)?;

    let mut bars = Vec::with_capacity(table.items.len());
    for row in table.rows() {
        let (Some(date), Some(open), Some(high), Some(low), Some(close)) = (
            row.date("trade_date"),
            row.decimal("open"),
            row.decimal("high"),
            row.decimal("low"),
            row.decimal("close"),
        ) else {
            return Err(fail(raw, "row is missing trade_date or OHLC"));
        };
        let timestamp = local_date_to_utc(date, offset)
            .ok_or_else(|| fail(raw, format!("cannot place {} in UTC", date)))?;

        bars.push(Bar {
            timestamp,
            open: price(open),
            high: price(high),
            low: price(low),
            close: price(close),
            volume: row.decimal("vol").map(lots_to_shares),
        });
    }
    bars.sort_by_key(|bar| bar.timestamp);

    Ok(NormalizedResponse::Series(Series {
        currency: venue_currency(&ticker),
        ticker,
        interval: raw.interval.unwrap_or_default(),
        bars,
    }))
}

fn map_profile(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let table = table(raw)?;
    let row = table.rows().next().ok_or_else(|| fail(raw, "no rows"))?;

    let mut profile = Profile::new(ticker.clone());
    profile.name = non_empty(row.text("name"));
    profile.industry = non_empty(row.text("industry"));
    profile.country = Some("CN".to_string());
    profile.currency = venue_currency(&ticker);
    profile.listing_date = row.date("list_date");
    profile.description = non_empty(row.text("market")).map(|board| format!("{} board", board));

    Ok(NormalizedResponse::Profile(profile))
}

fn map_fundamentals(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let table = table(raw)?;
    let row = table.latest().ok_or_else(|| fail(raw, "no dated rows"))?;

    let trade_date = row
        .date("trade_date")
        .ok_or_else(|| fail(raw, "trade_date missing"))?;
    let ten_thousand = Decimal::from(TEN_THOUSAND);

    let mut fundamentals = Fundamentals::new(ticker.clone(), session_close(raw, trade_date)?);
    fundamentals.currency = venue_currency(&ticker);
    fundamentals.market_cap = row.decimal("total_mv").map(|v| price(v * ten_thousand));
    fundamentals.shares_outstanding = row
        .decimal("total_share")
        .map(|v| volume(v * ten_thousand));
    fundamentals.pe_ratio = row.decimal("pe_ttm").map(price);
    fundamentals.pb_ratio = row.decimal("pb").map(price);
    fundamentals.dividend_yield = row.decimal("dv_ttm").map(price);
    fundamentals.eps = match (row.decimal("close"), fundamentals.pe_ratio) {
        (Some(close), Some(pe)) if !pe.is_zero() => Some(price(close / pe)),
        _ => None,
    };

    Ok(NormalizedResponse::Fundamentals(fundamentals))
}
