//! JSON-driven exchange metadata registry.
//!
//! Loads `exchanges.json` at compile time via `include_str!` and builds
//! lookup indexes once via `lazy_static`.

use std::collections::HashMap;

use chrono::FixedOffset;
use lazy_static::lazy_static;
use serde::Deserialize;

use crate::models::MarketSegment;

// ── JSON schema ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ExchangeCatalog {
    exchanges: Vec<ExchangeEntry>,
    coingecko_ids: HashMap<String, String>,
}

/// Static metadata for one exchange prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeEntry {
    pub code: String,
    pub segment: MarketSegment,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub timezone: String,
    /// Fixed UTC offset for markets without daylight saving time
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    /// Tie-break weight when search results list the same instrument twice
    #[serde(default)]
    pub search_priority: u8,
    #[serde(default)]
    pub yahoo: Option<YahooInfo>,
    #[serde(default)]
    pub tushare: Option<SuffixInfo>,
    #[serde(default)]
    pub eastmoney: Option<EastMoneyInfo>,
}

impl ExchangeEntry {
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooInfo {
    pub suffix: String,
    #[serde(default)]
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuffixInfo {
    pub suffix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EastMoneyInfo {
    pub market: u8,
}

// ── Registry with pre-built indexes ──────────────────────────────────────────

struct ExchangeRegistry {
    catalog: ExchangeCatalog,
    /// exchange code → index into catalog.exchanges
    by_code: HashMap<String, usize>,
    /// Yahoo exchange code (e.g. "NMS") → index
    by_yahoo_code: HashMap<String, usize>,
    /// Yahoo suffix without dot (e.g. "SS") → index
    by_yahoo_suffix: HashMap<String, usize>,
    /// Tushare suffix without dot (e.g. "SH") → index
    by_tushare_suffix: HashMap<String, usize>,
    /// CoinGecko coin id → upper-case symbol
    coingecko_symbols: HashMap<String, String>,
}

lazy_static! {
    static ref REGISTRY: ExchangeRegistry = ExchangeRegistry::load();
}

impl ExchangeRegistry {
    fn load() -> Self {
        let json = include_str!("exchanges.json");
        let catalog: ExchangeCatalog =
            serde_json::from_str(json).expect("exchanges.json must be valid");

        let mut by_code = HashMap::new();
        let mut by_yahoo_code = HashMap::new();
        let mut by_yahoo_suffix = HashMap::new();
        let mut by_tushare_suffix = HashMap::new();

        for (idx, entry) in catalog.exchanges.iter().enumerate() {
            by_code.insert(entry.code.clone(), idx);

            if let Some(ref yahoo) = entry.yahoo {
                for code in &yahoo.codes {
                    by_yahoo_code.insert(code.clone(), idx);
                }
                if !yahoo.suffix.is_empty() {
                    by_yahoo_suffix.insert(yahoo.suffix.trim_start_matches('.').to_string(), idx);
                }
            }
            if let Some(ref tushare) = entry.tushare {
                by_tushare_suffix.insert(tushare.suffix.trim_start_matches('.').to_string(), idx);
            }
        }

        let coingecko_symbols = catalog
            .coingecko_ids
            .iter()
            .map(|(symbol, id)| (id.clone(), symbol.clone()))
            .collect();

        ExchangeRegistry {
            catalog,
            by_code,
            by_yahoo_code,
            by_yahoo_suffix,
            by_tushare_suffix,
            coingecko_symbols,
        }
    }

    fn entry(&self, idx: usize) -> &ExchangeEntry {
        &self.catalog.exchanges[idx]
    }
}

// ── Lookups ──────────────────────────────────────────────────────────────────

/// Metadata for an exchange prefix (e.g. "SSE").
pub fn exchange(code: &str) -> Option<&'static ExchangeEntry> {
    let registry: &'static ExchangeRegistry = &REGISTRY;
    registry.by_code.get(code).map(|&idx| registry.entry(idx))
}

/// Every known exchange prefix, in catalog order.
pub fn exchanges() -> &'static [ExchangeEntry] {
    let registry: &'static ExchangeRegistry = &REGISTRY;
    &registry.catalog.exchanges
}

/// Map a Yahoo exchange code (e.g. "NMS", "SHH") to our exchange.
pub fn exchange_for_yahoo_code(code: &str) -> Option<&'static ExchangeEntry> {
    let registry: &'static ExchangeRegistry = &REGISTRY;
    registry.by_yahoo_code.get(code).map(|&idx| registry.entry(idx))
}

/// Split a suffixed Yahoo symbol (e.g. "600519.SS") into exchange and bare code.
pub fn split_yahoo_symbol(symbol: &str) -> Option<(&'static ExchangeEntry, &str)> {
    let registry: &'static ExchangeRegistry = &REGISTRY;
    let (code, suffix) = symbol.rsplit_once('.')?;
    let idx = registry.by_yahoo_suffix.get(&suffix.to_uppercase())?;
    Some((registry.entry(*idx), code))
}

/// Split a Tushare `ts_code` (e.g. "600519.SH") into exchange and bare code.
pub fn split_tushare_code(ts_code: &str) -> Option<(&'static ExchangeEntry, &str)> {
    let registry: &'static ExchangeRegistry = &REGISTRY;
    let (code, suffix) = ts_code.rsplit_once('.')?;
    let idx = registry.by_tushare_suffix.get(&suffix.to_uppercase())?;
    Some((registry.entry(*idx), code))
}

/// CoinGecko coin id for a crypto symbol; unknown symbols are lower-cased.
pub fn coingecko_id(symbol: &str) -> String {
    REGISTRY
        .catalog
        .coingecko_ids
        .get(&symbol.to_uppercase())
        .cloned()
        .unwrap_or_else(|| symbol.to_lowercase())
}

/// Reverse of [`coingecko_id`] for the ids we know.
pub fn coingecko_symbol(id: &str) -> Option<&'static str> {
    let registry: &'static ExchangeRegistry = &REGISTRY;
    registry.coingecko_symbols.get(id).map(String::as_str)
}

/// Search de-duplication weight of an exchange; unknown exchanges weigh 0.
pub fn search_priority(code: &str) -> u8 {
    exchange(code).map(|e| e.search_priority).unwrap_or(0)
}
