//! Request parameters shared by every operation.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default lookback for series requests without an explicit start date.
const DEFAULT_SERIES_DAYS: i64 = 365;

/// Default lookback for news requests.
const DEFAULT_NEWS_DAYS: i64 = 7;

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Upper bound on search results a caller may request.
pub const MAX_SEARCH_LIMIT: usize = 1000;

/// Bar width for series requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[default]
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::OneWeek => "1wk",
            Self::OneMonth => "1mo",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Self::OneMinute
                | Self::FiveMinutes
                | Self::FifteenMinutes
                | Self::ThirtyMinutes
                | Self::OneHour
        )
    }

    /// Bar width in minutes for intraday intervals.
    pub fn minutes(&self) -> Option<u32> {
        match self {
            Self::OneMinute => Some(1),
            Self::FiveMinutes => Some(5),
            Self::FifteenMinutes => Some(15),
            Self::ThirtyMinutes => Some(30),
            Self::OneHour => Some(60),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation parameters as received from the caller.
///
/// Every field is optional; providers fill defaults through the accessor
/// methods so that equal requests always resolve to equal ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    pub interval: Option<Interval>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub days_back: Option<u32>,
    pub limit: Option<usize>,
    pub query: Option<String>,
}

impl RequestParams {
    pub fn interval(&self) -> Interval {
        self.interval.unwrap_or_default()
    }

    /// Inclusive date range for series requests, relative to `today`.
    pub fn series_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        self.range(today, DEFAULT_SERIES_DAYS)
    }

    /// Inclusive date range for news requests, relative to `today`.
    pub fn news_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        self.range(today, DEFAULT_NEWS_DAYS)
    }

    fn range(&self, today: NaiveDate, default_days: i64) -> (NaiveDate, NaiveDate) {
        let end = self.end.unwrap_or(today);
        let days = self.days_back.map(i64::from).unwrap_or(default_days);
        let start = self.start.unwrap_or(end - Duration::days(days));
        if start > end {
            (end, start)
        } else {
            (start, end)
        }
    }

    /// Trimmed search query, if any.
    pub fn query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    pub fn search_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    /// Stable cache-key fragment.
    ///
    /// Only fields that are set contribute; the order is fixed and the query
    /// is case-folded, so equivalent requests share a cache entry.
    pub fn cache_fragment(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(interval) = self.interval {
            parts.push(format!("interval={}", interval));
        }
        if let Some(start) = self.start {
            parts.push(format!("start={}", start));
        }
        if let Some(end) = self.end {
            parts.push(format!("end={}", end));
        }
        if let Some(days) = self.days_back {
            parts.push(format!("days={}", days));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }
        if let Some(query) = self.query() {
            parts.push(format!("q={}", query.to_lowercase()));
        }
        parts.join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cache_fragment_ignores_unset_fields() {
        assert_eq!(RequestParams::default().cache_fragment(), "");

        let params = RequestParams {
            interval: Some(Interval::OneDay),
            start: Some(date(2024, 1, 2)),
            ..Default::default()
        };
        assert_eq!(params.cache_fragment(), "interval=1d;start=2024-01-02");
    }

    #[test]
    fn test_cache_fragment_folds_query_case_and_whitespace() {
        let a = RequestParams {
            query: Some("  Apple ".to_string()),
            ..Default::default()
        };
        let b = RequestParams {
            query: Some("apple".to_string()),
            ..Default::default()
        };
        assert_eq!(a.cache_fragment(), b.cache_fragment());
    }

    #[test]
    fn test_series_range_defaults_to_one_year() {
        let today = date(2024, 6, 30);
        let (start, end) = RequestParams::default().series_range(today);
        assert_eq!(end, today);
        assert_eq!(start, date(2023, 7, 1));
    }

    #[test]
    fn test_range_swaps_inverted_dates() {
        let params = RequestParams {
            start: Some(date(2024, 3, 1)),
            end: Some(date(2024, 1, 1)),
            ..Default::default()
        };
        assert_eq!(
            params.series_range(date(2024, 6, 30)),
            (date(2024, 1, 1), date(2024, 3, 1))
        );
    }

    #[test]
    fn test_interval_wire_names() {
        let params: RequestParams = serde_json::from_str(r#"{"interval":"5m"}"#).unwrap();
        assert_eq!(params.interval(), Interval::FiveMinutes);
        assert!(params.interval().is_intraday());
        assert_eq!(RequestParams::default().interval(), Interval::OneDay);
    }
}
