//! Mapping of provider-native payloads into canonical responses.
//!
//! Each provider module registers one mapping function per operation it
//! serves. [`Normalizer::normalize`] looks the mapping up, runs it, checks
//! that the result has the shape the operation expects, and validates prices.
//! Any failure is a [`NormalizationError`], which the router counts against
//! the provider.

mod common;
mod validator;

mod binance;
mod coingecko;
mod eastmoney;
mod finnhub;
mod tushare;
mod yahoo;

use std::collections::HashMap;

use crate::errors::NormalizationError;
use crate::models::{NormalizedResponse, OperationKind, RawPayload};

pub use validator::{PriceValidator, ValidatorConfig};

/// Signature of a single (provider, operation) mapping.
pub type MapFn = fn(&RawPayload) -> Result<NormalizedResponse, NormalizationError>;

/// Registry of per-provider mappings plus post-mapping validation.
pub struct Normalizer {
    mappings: HashMap<(String, OperationKind), MapFn>,
    validator: PriceValidator,
}

impl Normalizer {
    /// An empty normalizer. Every provider must be registered before use.
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
            validator: PriceValidator::new(),
        }
    }

    /// A normalizer with mappings for every bundled provider client.
    pub fn with_builtin() -> Self {
        let mut normalizer = Self::new();
        yahoo::register(&mut normalizer);
        finnhub::register(&mut normalizer);
        tushare::register(&mut normalizer);
        eastmoney::register(&mut normalizer);
        coingecko::register(&mut normalizer);
        binance::register(&mut normalizer);
        normalizer
    }

    /// Register (or replace) the mapping for one provider and operation.
    pub fn register(&mut self, provider: impl Into<String>, operation: OperationKind, map: MapFn) {
        self.mappings.insert((provider.into(), operation), map);
    }

    pub fn supports(&self, provider: &str, operation: OperationKind) -> bool {
        self.mappings
            .contains_key(&(provider.to_string(), operation))
    }

    /// Turn a raw payload into the canonical response for `operation`.
    pub fn normalize(
        &self,
        operation: OperationKind,
        provider_id: &str,
        raw: &RawPayload,
    ) -> Result<NormalizedResponse, NormalizationError> {
        let map = self
            .mappings
            .get(&(provider_id.to_string(), operation))
            .ok_or_else(|| {
                NormalizationError::new(provider_id, operation, "no mapping registered")
            })?;

        let response = map(raw)?;

        if response.operation() != operation {
            return Err(NormalizationError::new(
                provider_id,
                operation,
                format!("mapping produced a {} response", response.operation()),
            ));
        }

        let checked = match &response {
            NormalizedResponse::Quote(quote) => self.validator.validate_quote(quote),
            NormalizedResponse::Series(series) => self.validator.validate_series(series),
            _ => Ok(()),
        };
        checked.map_err(|message| {
            NormalizationError::new(provider_id, operation, format!("validation failed: {}", message))
        })?;

        Ok(response)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_builtin()
    }
}
