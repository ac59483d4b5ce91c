//! Sanity checks on normalized prices.
//!
//! Applied after mapping so that a provider sending nonsense is treated as a
//! failed provider rather than passed through:
//! - Negative prices or volumes
//! - `high < low`
//! - Open or close outside `[low, high]`
//!
//! Zero volume and absurd price levels are only logged.

use log::warn;
use rust_decimal::Decimal;

use crate::models::{Bar, Quote, Series};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Severity {
    /// Reject the response; the router moves to the next provider.
    Hard,
    /// Accept the response but log a warning.
    Soft,
}

#[derive(Clone, Debug)]
struct Issue {
    severity: Severity,
    message: String,
}

impl Issue {
    fn hard(message: String) -> Self {
        Self {
            severity: Severity::Hard,
            message,
        }
    }

    fn soft(message: String) -> Self {
        Self {
            severity: Severity::Soft,
            message,
        }
    }
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Reject negative prices and volumes.
    pub reject_negative: bool,
    /// Reject OHLC sets that contradict themselves.
    pub reject_invalid_ohlc: bool,
    /// Prices above this are logged as suspicious.
    pub max_price: Option<Decimal>,
    /// Log zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_negative: true,
            reject_invalid_ohlc: true,
            max_price: Some(Decimal::from(1_000_000_000i64)),
            warn_on_zero_volume: true,
        }
    }
}

/// OHLC view shared by quotes and bars.
struct Prices {
    open: Option<Decimal>,
    high: Option<Decimal>,
    low: Option<Decimal>,
    close: Decimal,
    volume: Option<Decimal>,
}

impl From<&Quote> for Prices {
    fn from(quote: &Quote) -> Self {
        Self {
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.price,
            volume: quote.volume,
        }
    }
}

impl From<&Bar> for Prices {
    fn from(bar: &Bar) -> Self {
        Self {
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: bar.close,
            volume: bar.volume,
        }
    }
}

/// Price data validator.
#[derive(Clone, Debug, Default)]
pub struct PriceValidator {
    config: ValidatorConfig,
}

impl PriceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a quote. Returns the joined hard-failure messages on rejection.
    pub fn validate_quote(&self, quote: &Quote) -> Result<(), String> {
        let issues = self.check(&Prices::from(quote));
        self.conclude(&quote.ticker.to_string(), issues)
    }

    /// Validate every bar of a series; the first bad bar rejects the series.
    pub fn validate_series(&self, series: &Series) -> Result<(), String> {
        let label = series.ticker.to_string();
        for bar in &series.bars {
            let issues = self.check(&Prices::from(bar));
            self.conclude(&label, issues)
                .map_err(|message| format!("bar at {}: {}", bar.timestamp, message))?;
        }
        Ok(())
    }

    fn conclude(&self, label: &str, issues: Vec<Issue>) -> Result<(), String> {
        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == Severity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(errors.join("; "));
        }

        for issue in issues.iter().filter(|i| i.severity == Severity::Soft) {
            warn!("Price validation warning for {}: {}", label, issue.message);
        }
        Ok(())
    }

    fn check(&self, prices: &Prices) -> Vec<Issue> {
        let mut issues = Vec::new();
        self.check_negative(prices, &mut issues);
        self.check_ohlc(prices, &mut issues);
        self.check_range(prices, &mut issues);
        self.check_volume(prices, &mut issues);
        issues
    }

    fn check_negative(&self, prices: &Prices, issues: &mut Vec<Issue>) {
        if !self.config.reject_negative {
            return;
        }
        let fields = [
            ("close", Some(prices.close)),
            ("open", prices.open),
            ("high", prices.high),
            ("low", prices.low),
        ];
        for (name, value) in fields {
            if let Some(v) = value.filter(|v| v.is_sign_negative() && !v.is_zero()) {
                issues.push(Issue::hard(format!("Negative {} price: {}", name, v)));
            }
        }
    }

    fn check_ohlc(&self, prices: &Prices, issues: &mut Vec<Issue>) {
        if !self.config.reject_invalid_ohlc {
            return;
        }
        let (Some(high), Some(low)) = (prices.high, prices.low) else {
            return;
        };

        if high < low {
            issues.push(Issue::hard(format!(
                "High ({}) is less than Low ({})",
                high, low
            )));
            return;
        }

        if let Some(open) = prices.open {
            if open < low || open > high {
                issues.push(Issue::hard(format!(
                    "Open ({}) is outside High/Low range ({}-{})",
                    open, low, high
                )));
            }
        }

        if prices.close < low || prices.close > high {
            issues.push(Issue::hard(format!(
                "Close ({}) is outside High/Low range ({}-{})",
                prices.close, low, high
            )));
        }
    }

    fn check_range(&self, prices: &Prices, issues: &mut Vec<Issue>) {
        if let Some(max_price) = self.config.max_price {
            if prices.close > max_price {
                issues.push(Issue::soft(format!(
                    "Close price ({}) exceeds max threshold ({})",
                    prices.close, max_price
                )));
            }
        }
    }

    fn check_volume(&self, prices: &Prices, issues: &mut Vec<Issue>) {
        if let Some(volume) = prices.volume {
            if volume.is_sign_negative() && !volume.is_zero() {
                issues.push(Issue::hard(format!("Negative volume: {}", volume)));
            }
            if self.config.warn_on_zero_volume && volume.is_zero() {
                issues.push(Issue::soft("Zero volume".to_string()));
            }
        }
    }
}
