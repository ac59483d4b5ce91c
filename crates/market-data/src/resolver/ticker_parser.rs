//! `EXCHANGE:CODE` grammar.

use crate::errors::ParseError;
use crate::models::Ticker;

use super::exchange_registry;

/// Parse a raw ticker string into a canonical [`Ticker`].
///
/// The input must match `^[A-Z]+:[A-Za-z0-9.]+$` and the exchange prefix
/// must be in the exchange catalog. The symbol is upper-cased. Pure and
/// deterministic, so `resolve(&t.to_string()) == Ok(t)` for every ticker it
/// returns.
///
/// # Examples
///
/// ```
/// use stockgate_market_data::models::MarketSegment;
/// use stockgate_market_data::resolver::resolve;
///
/// let ticker = resolve("SSE:600519").unwrap();
/// assert_eq!(ticker.segment(), MarketSegment::AShare);
/// assert_eq!(ticker.exchange(), "SSE");
/// assert_eq!(ticker.symbol(), "600519");
///
/// assert!(resolve("BOGUS").is_err());
/// ```
pub fn resolve(raw: &str) -> Result<Ticker, ParseError> {
    let (exchange, code) = raw
        .split_once(':')
        .ok_or_else(|| ParseError::new("expected EXCHANGE:CODE", raw))?;

    if exchange.is_empty() || !exchange.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ParseError::new(
            "exchange prefix must be upper-case letters",
            raw,
        ));
    }

    if code.is_empty()
        || !code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.')
    {
        return Err(ParseError::new(
            "code must contain only letters, digits and '.'",
            raw,
        ));
    }

    let entry = exchange_registry::exchange(exchange)
        .ok_or_else(|| ParseError::new(format!("unknown exchange '{}'", exchange), raw))?;

    Ok(Ticker::new(
        entry.segment,
        &entry.code,
        &code.to_ascii_uppercase(),
    ))
}
