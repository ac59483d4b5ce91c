//! Finnhub payloads.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::NormalizationError;
use crate::models::{
    Bar, Fundamentals, News, NewsItem, NormalizedResponse, OperationKind, Profile,
    Quote, RawPayload, SearchHit, SearchResults, Series,
};
use crate::provider::finnhub::PROVIDER_ID;

use super::common::{
    decimal_value, fail, non_empty, opt_price, opt_volume, parse_body, price, ticker,
    utc_from_secs, venue_currency, volume,
};
use super::Normalizer;

/// Finnhub reports market capitalization and share counts in millions.
const MILLION: i64 = 1_000_000;

pub(super) fn register(normalizer: &mut Normalizer) {
    normalizer.register(PROVIDER_ID, OperationKind::Quote, map_quote);
    normalizer.register(PROVIDER_ID, OperationKind::Series, map_series);
    normalizer.register(PROVIDER_ID, OperationKind::Profile, map_profile);
    normalizer.register(PROVIDER_ID, OperationKind::Fundamentals, map_fundamentals);
    normalizer.register(PROVIDER_ID, OperationKind::News, map_news);
    normalizer.register(PROVIDER_ID, OperationKind::Search, map_search);
}

// ── Raw shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    c: Option<f64>,
    d: Option<f64>,
    dp: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    o: Option<f64>,
    pc: Option<f64>,
    t: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Candles {
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
    #[serde(default)]
    t: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanyProfile {
    name: Option<String>,
    country: Option<String>,
    currency: Option<String>,
    finnhub_industry: Option<String>,
    ipo: Option<String>,
    weburl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetricEnvelope {
    #[serde(default)]
    metric: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Article {
    datetime: i64,
    headline: String,
    source: Option<String>,
    summary: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    description: String,
    display_symbol: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

// ── Mappings ─────────────────────────────────────────────────────────────────

fn map_quote(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let q: FinnhubQuote = parse_body(raw)?;

    let last_price = opt_price(q.c).ok_or_else(|| fail(raw, "current price missing"))?;
    let timestamp = q
        .t
        .and_then(utc_from_secs)
        .ok_or_else(|| fail(raw, "quote timestamp missing"))?;

    let mut quote = Quote::new(ticker.clone(), timestamp, last_price);
    quote.open = opt_price(q.o);
    quote.high = opt_price(q.h);
    quote.low = opt_price(q.l);
    quote.previous_close = opt_price(q.pc);
    quote.change = opt_price(q.d);
    quote.change_percent = opt_price(q.dp);
    quote.currency = venue_currency(&ticker);

    Ok(NormalizedResponse::Quote(quote.derive_change()))
}

fn map_series(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let candles: Candles = parse_body(raw)?;

    let n = candles.t.len();
    if [candles.o.len(), candles.h.len(), candles.l.len(), candles.c.len()]
        .iter()
        .any(|&len| len != n)
    {
        return Err(fail(raw, "candle arrays have different lengths"));
    }

    let mut bars = Vec::with_capacity(n);
    for idx in 0..n {
        let (Some(open), Some(high), Some(low), Some(close), Some(timestamp)) = (
            opt_price(Some(candles.o[idx])),
            opt_price(Some(candles.h[idx])),
            opt_price(Some(candles.l[idx])),
            opt_price(Some(candles.c[idx])),
            utc_from_secs(candles.t[idx]),
        ) else {
            return Err(fail(raw, format!("unreadable candle at index {}", idx)));
        };
        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: opt_volume(candles.v.get(idx).copied()),
        });
    }

    Ok(NormalizedResponse::Series(Series {
        currency: venue_currency(&ticker),
        ticker,
        interval: raw.interval.unwrap_or_default(),
        bars,
    }))
}

fn map_profile(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let p: CompanyProfile = parse_body(raw)?;

    let mut profile = Profile::new(ticker);
    profile.name = non_empty(p.name.as_deref());
    profile.industry = non_empty(p.finnhub_industry.as_deref());
    profile.country = non_empty(p.country.as_deref());
    profile.currency = non_empty(p.currency.as_deref());
    profile.website = non_empty(p.weburl.as_deref());
    profile.listing_date = p
        .ipo
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(NormalizedResponse::Profile(profile))
}

/// First metric present among `keys`, in order of preference.
fn metric(metrics: &Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    keys.iter()
        .find_map(|key| metrics.get(*key).and_then(decimal_value))
}

fn map_fundamentals(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let envelope: MetricEnvelope = parse_body(raw)?;
    let m = &envelope.metric;
    if m.is_empty() {
        return Err(fail(raw, "metric object is empty"));
    }

    let millions = |keys: &[&str]| metric(m, keys).map(|v| v * Decimal::from(MILLION));

    let mut fundamentals = Fundamentals::new(ticker.clone(), raw.received_at);
    fundamentals.currency = venue_currency(&ticker);
    fundamentals.market_cap = millions(&["marketCapitalization"]).map(price);
    fundamentals.shares_outstanding = millions(&["sharesOutstanding"]).map(volume);
    fundamentals.pe_ratio =
        metric(m, &["peTTM", "peBasicExclExtraTTM", "peNormalizedAnnual"]).map(price);
    fundamentals.pb_ratio = metric(m, &["pbQuarterly", "pbAnnual"]).map(price);
    fundamentals.eps = metric(m, &["epsTTM", "epsBasicExclExtraItemsTTM"]).map(price);
    fundamentals.dividend_yield =
        metric(m, &["currentDividendYieldTTM", "dividendYieldIndicatedAnnual"]).map(price);
    fundamentals.beta = metric(m, &["beta"]).map(price);
    fundamentals.week_52_high = metric(m, &["52WeekHigh"]).map(price);
    fundamentals.week_52_low = metric(m, &["52WeekLow"]).map(price);

    Ok(NormalizedResponse::Fundamentals(fundamentals))
}

fn map_news(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let ticker = ticker(raw)?;
    let articles: Vec<Article> = parse_body(raw)?;

    let mut items: Vec<NewsItem> = articles
        .into_iter()
        .filter_map(|a| {
            Some(NewsItem {
                published_at: utc_from_secs(a.datetime)?,
                headline: a.headline,
                summary: non_empty(a.summary.as_deref()),
                source: non_empty(a.source.as_deref()),
                url: non_empty(a.url.as_deref()),
            })
        })
        .collect();
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    Ok(NormalizedResponse::News(News { ticker, items }))
}

fn map_search(raw: &RawPayload) -> Result<NormalizedResponse, NormalizationError> {
    let envelope: SearchEnvelope = parse_body(raw)?;

    let hits = envelope
        .result
        .into_iter()
        .map(|r| {
            // Dotted symbols are foreign listings ("0700.HK"); bare ones are US
            let us_listing = !r.display_symbol.contains('.');
            let mut hit = SearchHit::new(r.display_symbol.clone(), r.description);
            if us_listing {
                hit = hit
                    .with_country(Some("US".to_string()))
                    .with_currency(Some("USD".to_string()));
            }
            if let Some(kind) = r.kind.filter(|k| !k.is_empty()) {
                hit = hit.with_asset_type(kind);
            }
            hit
        })
        .collect();

    Ok(NormalizedResponse::Search(SearchResults {
        query: String::new(),
        hits,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interval, Ticker};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(op: OperationKind, ticker: &str, body: Value) -> RawPayload {
        RawPayload::new(PROVIDER_ID, op, Some(Ticker::parse(ticker).unwrap()), body)
    }

    #[test]
    fn test_quote() {
        let body = json!({"c": 189.84, "d": 2.4, "dp": 1.2804, "h": 190.5, "l": 188.1, "o": 189.0, "pc": 187.44, "t": 1700000000});
        let response = map_quote(&raw(OperationKind::Quote, "NASDAQ:AAPL", body)).unwrap();
        let quote = response.as_quote().unwrap();

        assert_eq!(quote.price, dec!(189.84));
        assert_eq!(quote.change, Some(dec!(2.4)));
        assert_eq!(quote.change_percent.unwrap().to_string(), "1.280400");
        assert_eq!(quote.volume, None);
        assert_eq!(quote.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_crypto_candles() {
        let body = json!({"s": "ok", "t": [1700000000, 1700086400], "o": [36000.0, 36500.0], "h": [37000.0, 37200.0], "l": [35800.0, 36100.0], "c": [36500.0, 37000.0], "v": [1200.5, 900.25]});
        let payload = raw(OperationKind::Series, "CRYPTO:BTC", body).with_interval(Interval::OneDay);

        let response = map_series(&payload).unwrap();
        let series = response.as_series().unwrap();
        assert_eq!(series.ticker.to_string(), "CRYPTO:BTC");
        assert_eq!(series.bars.len(), 2);
        assert_eq!(series.bars[1].volume.unwrap().to_string(), "900.25");
    }

    #[test]
    fn test_ragged_candles_fail() {
        let body = json!({"s": "ok", "t": [1700000000, 1700086400], "o": [1.0], "h": [1.0, 2.0], "l": [1.0, 1.0], "c": [1.0, 1.5]});
        assert!(map_series(&raw(OperationKind::Series, "NASDAQ:AAPL", body)).is_err());
    }

    #[test]
    fn test_fundamentals_scale_market_cap() {
        let body = json!({"metric": {
            "marketCapitalization": 2950000.5,
            "peTTM": 30.12,
            "pbQuarterly": 45.1,
            "epsTTM": 6.13,
            "beta": 1.29,
            "52WeekHigh": 199.62,
            "52WeekLow": 124.17
        }});
        let response =
            map_fundamentals(&raw(OperationKind::Fundamentals, "NASDAQ:AAPL", body)).unwrap();
        let NormalizedResponse::Fundamentals(f) = response else {
            panic!("expected fundamentals");
        };

        assert_eq!(f.market_cap, Some(dec!(2950000500000)));
        assert_eq!(f.pe_ratio, Some(dec!(30.12)));
        assert_eq!(f.dividend_yield, None);
        assert_eq!(f.week_52_low.unwrap().to_string(), "124.170000");
    }

    #[test]
    fn test_news_newest_first() {
        let body = json!([
            {"datetime": 1700000000, "headline": "older", "source": "Reuters", "summary": "", "url": "https://a"},
            {"datetime": 1700100000, "headline": "newer", "source": "CNBC", "summary": "s", "url": "https://b"}
        ]);
        let response = map_news(&raw(OperationKind::News, "NASDAQ:AAPL", body)).unwrap();
        let NormalizedResponse::News(news) = response else {
            panic!("expected news");
        };
        assert_eq!(news.items[0].headline, "newer");
        assert_eq!(news.items[1].summary, None);
    }

    #[test]
    fn test_search_marks_us_listings() {
        let body = json!({"count": 2, "result": [
            {"description": "APPLE INC", "displaySymbol": "AAPL", "symbol": "AAPL", "type": "Common Stock"},
            {"description": "TENCENT", "displaySymbol": "0700.HK", "symbol": "0700.HK", "type": ""}
        ]});
        let payload = RawPayload::new(PROVIDER_ID, OperationKind::Search, None, body);
        let response = map_search(&payload).unwrap();
        let hits = &response.as_search().unwrap().hits;

        assert_eq!(hits[0].country.as_deref(), Some("US"));
        assert_eq!(hits[0].asset_type.as_deref(), Some("Common Stock"));
        assert_eq!(hits[1].country, None);
        assert_eq!(hits[1].asset_type, None);
    }
}
