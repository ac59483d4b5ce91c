//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Identifiers and enums (ProviderId, MarketSegment, OperationKind)
//! - `ticker` - Canonical instrument identity (Ticker)
//! - `params` - Request parameters (RequestParams, Interval)
//! - `quote` - Price data (Quote, Bar, Series)
//! - `profile` - Descriptive and valuation data (Profile, Fundamentals)
//! - `search` - Search results and news (SearchHit, SearchResults, NewsItem, News)
//! - `response` - Canonical response envelope and raw provider payloads

mod params;
mod profile;
mod quote;
mod response;
mod search;
mod ticker;
mod types;

pub use params::{Interval, RequestParams, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
pub use profile::{Fundamentals, Profile};
pub use quote::{Bar, Quote, Series};
pub use response::{NormalizedResponse, RawPayload};
pub use search::{News, NewsItem, SearchHit, SearchResults};
pub use ticker::Ticker;
pub use types::{
    Currency, MarketSegment, OperationKind, ProviderId, ProviderSymbol, PRICE_SCALE, VOLUME_SCALE,
};
