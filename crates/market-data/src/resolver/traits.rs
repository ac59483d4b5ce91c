//! Resolution traits for the market data crate.
//!
//! Defines the abstraction for turning a canonical ticker into the symbol a
//! specific provider expects.

use crate::errors::ProviderError;
use crate::models::{ProviderSymbol, Ticker};

/// Maps canonical tickers to provider-specific symbols.
///
/// The router calls this before every attempt. A provider that cannot
/// express the ticker yields [`ProviderError::SymbolNotFound`], which moves
/// the router on to the next candidate without a circuit penalty.
pub trait SymbolResolver: Send + Sync {
    /// Resolve the symbol `provider` uses for `ticker`.
    ///
    /// # Arguments
    /// * `provider` - The provider ID to resolve for (e.g., "YAHOO", "TUSHARE")
    /// * `ticker` - The canonical ticker
    fn resolve(&self, provider: &str, ticker: &Ticker) -> Result<ProviderSymbol, ProviderError>;
}
