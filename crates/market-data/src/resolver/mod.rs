//! Ticker parsing and symbol resolution.
//!
//! Two steps turn a caller's string into something a provider understands:
//!
//! ```text
//!   "SSE:600519"
//!        │  resolve()            grammar + exchange catalog
//!        ▼
//!   Ticker { A_SHARE, SSE, 600519 }
//!        │  SymbolResolver       per-provider rules
//!        ▼
//!   "600519.SS" (YAHOO) / "600519.SH" (TUSHARE) / "1.600519" (EASTMONEY)
//! ```
//!
//! The exchange catalog (`exchanges.json`) also carries the metadata the
//! normalizer needs to map provider symbols back to canonical tickers.

pub mod exchange_registry;
mod rules_resolver;
mod ticker_parser;
mod traits;

pub use exchange_registry::ExchangeEntry;
pub use rules_resolver::RulesResolver;
pub use ticker_parser::resolve;
pub use traits::SymbolResolver;
