//! Rules resolver - deterministic ticker to provider symbol conversion.
//!
//! Applies per-provider formatting rules on top of the exchange catalog
//! (suffixes, market ids, coin ids).

use std::sync::Arc;

use crate::errors::ProviderError;
use crate::models::{MarketSegment, ProviderSymbol, Ticker};
use crate::provider::{binance, coingecko, eastmoney, finnhub, tushare, yahoo};

use super::exchange_registry::{self, ExchangeEntry};
use super::traits::SymbolResolver;

/// Resolves provider symbols from deterministic rules.
///
/// # Supported Providers
///
/// - `YAHOO`: `AAPL`, `BRK-B`, `600519.SS`, `0700.HK`, `BTC-USD`, `EURUSD=X`, `^GSPC`
/// - `FINNHUB`: `AAPL`, `BINANCE:BTCUSDT`, `OANDA:EUR_USD`
/// - `TUSHARE`: `600519.SH`, `000001.SZ`, `430047.BJ`
/// - `EASTMONEY`: secid `1.600519`, `0.000001`
/// - `COINGECKO`: coin id (`bitcoin`)
/// - `BINANCE`: `BTCUSDT`
///
/// Any other provider receives the bare canonical symbol.
#[derive(Clone, Debug, Default)]
pub struct RulesResolver;

impl RulesResolver {
    pub fn new() -> Self {
        Self
    }

    fn resolve_yahoo(&self, ticker: &Ticker, entry: &ExchangeEntry) -> Option<String> {
        let symbol = ticker.symbol();
        match ticker.segment() {
            MarketSegment::UsEquity => Some(symbol.replace('.', "-")),
            MarketSegment::AShare => {
                let suffix = &entry.yahoo.as_ref()?.suffix;
                Some(format!("{}{}", symbol, suffix))
            }
            MarketSegment::HkEquity => {
                let suffix = &entry.yahoo.as_ref()?.suffix;
                Some(format!("{}{}", hk_code(symbol)?, suffix))
            }
            MarketSegment::Crypto => Some(format!("{}-USD", strip_quote(symbol))),
            MarketSegment::Forex => {
                let (from, to) = fx_pair(symbol)?;
                Some(format!("{}{}=X", from, to))
            }
            MarketSegment::Index => Some(format!("^{}", symbol)),
        }
    }

    fn resolve_finnhub(&self, ticker: &Ticker) -> Option<String> {
        let symbol = ticker.symbol();
        match ticker.segment() {
            MarketSegment::UsEquity => Some(symbol.to_string()),
            MarketSegment::Crypto => Some(format!("BINANCE:{}USDT", strip_quote(symbol))),
            MarketSegment::Forex => {
                let (from, to) = fx_pair(symbol)?;
                Some(format!("OANDA:{}_{}", from, to))
            }
            _ => None,
        }
    }

    fn resolve_tushare(&self, ticker: &Ticker, entry: &ExchangeEntry) -> Option<String> {
        if ticker.segment() != MarketSegment::AShare {
            return None;
        }
        let suffix = &entry.tushare.as_ref()?.suffix;
        Some(format!("{}{}", ticker.symbol(), suffix))
    }

    fn resolve_eastmoney(&self, ticker: &Ticker, entry: &ExchangeEntry) -> Option<String> {
        if ticker.segment() != MarketSegment::AShare {
            return None;
        }
        let market = entry.eastmoney.as_ref()?.market;
        Some(format!("{}.{}", market, ticker.symbol()))
    }

    fn resolve_crypto(&self, ticker: &Ticker, f: impl Fn(&str) -> String) -> Option<String> {
        (ticker.segment() == MarketSegment::Crypto).then(|| f(ticker.symbol()))
    }
}

impl SymbolResolver for RulesResolver {
    fn resolve(&self, provider: &str, ticker: &Ticker) -> Result<ProviderSymbol, ProviderError> {
        let entry = exchange_registry::exchange(ticker.exchange()).ok_or_else(|| {
            ProviderError::SymbolNotFound(format!("unknown exchange for {}", ticker))
        })?;

        let resolved = match provider {
            yahoo::PROVIDER_ID => self.resolve_yahoo(ticker, entry),
            finnhub::PROVIDER_ID => self.resolve_finnhub(ticker),
            tushare::PROVIDER_ID => self.resolve_tushare(ticker, entry),
            eastmoney::PROVIDER_ID => self.resolve_eastmoney(ticker, entry),
            coingecko::PROVIDER_ID => {
                self.resolve_crypto(ticker, |s| exchange_registry::coingecko_id(strip_quote(s)))
            }
            binance::PROVIDER_ID => {
                self.resolve_crypto(ticker, |s| format!("{}USDT", strip_quote(s)))
            }
            _ => Some(ticker.symbol().to_string()),
        };

        resolved.map(Arc::from).ok_or_else(|| {
            ProviderError::SymbolNotFound(format!("{} cannot express {}", provider, ticker))
        })
    }
}

/// Hong Kong codes are zero-padded to four digits ("700" and "00700" → "0700").
fn hk_code(symbol: &str) -> Option<String> {
    let number: u32 = symbol.parse().ok()?;
    Some(format!("{:04}", number))
}

/// Split a six-letter forex symbol into its two currencies.
fn fx_pair(symbol: &str) -> Option<(&str, &str)> {
    if symbol.len() == 6 && symbol.bytes().all(|b| b.is_ascii_alphabetic()) {
        Some(symbol.split_at(3))
    } else {
        None
    }
}

/// "BTCUSDT" and "BTCUSD" both mean BTC for providers that add their own quote.
fn strip_quote(symbol: &str) -> &str {
    for quote in ["USDT", "USD"] {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return base;
            }
        }
    }
    symbol
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(provider: &str, raw: &str) -> Result<String, ProviderError> {
        let ticker = Ticker::parse(raw).unwrap();
        RulesResolver::new()
            .resolve(provider, &ticker)
            .map(|s| s.to_string())
    }

    #[test]
    fn test_yahoo_symbols() {
        assert_eq!(resolve("YAHOO", "NASDAQ:AAPL").unwrap(), "AAPL");
        assert_eq!(resolve("YAHOO", "NYSE:BRK.B").unwrap(), "BRK-B");
        assert_eq!(resolve("YAHOO", "SSE:600519").unwrap(), "600519.SS");
        assert_eq!(resolve("YAHOO", "SZSE:000001").unwrap(), "000001.SZ");
        assert_eq!(resolve("YAHOO", "HKEX:00700").unwrap(), "0700.HK");
        assert_eq!(resolve("YAHOO", "CRYPTO:BTC").unwrap(), "BTC-USD");
        assert_eq!(resolve("YAHOO", "FX:EURUSD").unwrap(), "EURUSD=X");
        assert_eq!(resolve("YAHOO", "INDEX:GSPC").unwrap(), "^GSPC");
    }

    #[test]
    fn test_yahoo_has_no_beijing_listing() {
        assert!(matches!(
            resolve("YAHOO", "BSE:430047"),
            Err(ProviderError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_finnhub_symbols() {
        assert_eq!(resolve("FINNHUB", "NASDAQ:MSFT").unwrap(), "MSFT");
        assert_eq!(resolve("FINNHUB", "CRYPTO:ETH").unwrap(), "BINANCE:ETHUSDT");
        assert_eq!(resolve("FINNHUB", "FX:EURUSD").unwrap(), "OANDA:EUR_USD");
        assert!(resolve("FINNHUB", "SSE:600519").is_err());
    }

    #[test]
    fn test_a_share_providers() {
        assert_eq!(resolve("TUSHARE", "SSE:600519").unwrap(), "600519.SH");
        assert_eq!(resolve("TUSHARE", "BSE:430047").unwrap(), "430047.BJ");
        assert_eq!(resolve("EASTMONEY", "SSE:600519").unwrap(), "1.600519");
        assert_eq!(resolve("EASTMONEY", "SZSE:000001").unwrap(), "0.000001");
        assert!(resolve("TUSHARE", "NASDAQ:AAPL").is_err());
    }

    #[test]
    fn test_crypto_providers() {
        assert_eq!(resolve("COINGECKO", "CRYPTO:BTC").unwrap(), "bitcoin");
        assert_eq!(resolve("COINGECKO", "CRYPTO:BTCUSDT").unwrap(), "bitcoin");
        assert_eq!(resolve("BINANCE", "CRYPTO:SOL").unwrap(), "SOLUSDT");
        assert!(resolve("BINANCE", "NASDAQ:AAPL").is_err());
    }

    #[test]
    fn test_unknown_provider_gets_bare_symbol() {
        assert_eq!(resolve("STUB", "CRYPTO:BTC").unwrap(), "BTC");
    }
}
