use std::fmt;

use crate::models::{OperationKind, RequestParams, Ticker};

/// Identity of a cacheable request.
///
/// Equal requests produce equal keys regardless of how the caller spelled
/// optional parameters; see [`RequestParams::cache_fragment`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: OperationKind,
    /// `None` for search
    pub ticker: Option<Ticker>,
    pub params: String,
}

impl CacheKey {
    pub fn new(operation: OperationKind, ticker: Option<Ticker>, params: &RequestParams) -> Self {
        Self {
            operation,
            ticker,
            params: params.cache_fragment(),
        }
    }
}

/// `sg:<operation>:<ticker|->:<params>`, also used as the external store key.
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sg:{}:", self.operation)?;
        match &self.ticker {
            Some(ticker) => write!(f, "{}", ticker)?,
            None => f.write_str("-")?,
        }
        write!(f, ":{}", self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interval;

    #[test]
    fn test_equivalent_params_share_a_key() {
        let ticker = Ticker::parse("NASDAQ:AAPL").unwrap();
        let a = RequestParams {
            query: Some("  Apple ".to_string()),
            ..Default::default()
        };
        let b = RequestParams {
            query: Some("apple".to_string()),
            ..Default::default()
        };

        assert_eq!(
            CacheKey::new(OperationKind::Search, None, &a),
            CacheKey::new(OperationKind::Search, None, &b)
        );
        assert_ne!(
            CacheKey::new(OperationKind::Quote, Some(ticker.clone()), &a),
            CacheKey::new(OperationKind::Profile, Some(ticker), &a)
        );
    }

    #[test]
    fn test_display() {
        let ticker = Ticker::parse("SSE:600519").unwrap();
        let params = RequestParams {
            interval: Some(Interval::OneDay),
            ..Default::default()
        };
        let key = CacheKey::new(OperationKind::Series, Some(ticker), &params);
        assert_eq!(key.to_string(), "sg:series:SSE:600519:interval=1d");

        let key = CacheKey::new(OperationKind::Search, None, &RequestParams::default());
        assert_eq!(key.to_string(), "sg:search:-:");
    }
}
