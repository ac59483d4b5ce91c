//! Static capability registry.
//!
//! Built once from the provider clients that were configured at startup.
//! Answers "who can serve operation X for segment Y, in which order" and
//! nothing else; health and rate limits live in the router.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{MarketSegment, OperationKind};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

/// Static description of one registered provider.
#[derive(Clone, Debug)]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub capabilities: ProviderCapabilities,
    /// Lower values are tried first
    pub priority: i32,
    pub rate_limit: RateLimit,
}

impl ProviderDescriptor {
    fn from_client(client: &dyn MarketDataProvider, custom_priority: Option<i32>) -> Self {
        Self {
            id: client.id(),
            capabilities: client.capabilities(),
            priority: custom_priority.unwrap_or_else(|| i32::from(client.priority())),
            rate_limit: client.rate_limit(),
        }
    }

    pub fn supports(&self, segment: MarketSegment, operation: OperationKind) -> bool {
        self.capabilities.supports(segment, operation)
    }
}

/// A descriptor together with the client it describes.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub client: Arc<dyn MarketDataProvider>,
}

impl RegisteredProvider {
    pub fn id(&self) -> &'static str {
        self.descriptor.id
    }
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Ordered, immutable set of registered providers.
#[derive(Clone, Debug, Default)]
pub struct CapabilityRegistry {
    /// Sorted by (priority, id)
    providers: Vec<RegisteredProvider>,
}

impl CapabilityRegistry {
    /// Create a registry using each provider's declared priority.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_priorities(providers, HashMap::new())
    }

    /// Create a registry with priority overrides (provider id -> priority).
    ///
    /// Providers without an override keep their declared priority. A second
    /// client with an id that is already registered is ignored.
    pub fn with_priorities(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        custom_priorities: HashMap<String, i32>,
    ) -> Self {
        let mut registered: Vec<RegisteredProvider> = Vec::with_capacity(providers.len());

        for client in providers {
            if registered.iter().any(|p| p.id() == client.id()) {
                warn!(
                    "Provider '{}' registered twice, keeping the first",
                    client.id()
                );
                continue;
            }
            let custom = custom_priorities.get(client.id()).copied();
            let descriptor = ProviderDescriptor::from_client(client.as_ref(), custom);
            debug!(
                "Registered provider '{}' (priority {}, segments {:?}, operations {:?})",
                descriptor.id,
                descriptor.priority,
                descriptor.capabilities.segments,
                descriptor.capabilities.operations
            );
            registered.push(RegisteredProvider { descriptor, client });
        }

        registered.sort_by(|a, b| {
            (a.descriptor.priority, a.id()).cmp(&(b.descriptor.priority, b.id()))
        });

        Self {
            providers: registered,
        }
    }

    /// Providers that declare both `segment` and `operation`, best first.
    pub fn candidates(
        &self,
        segment: MarketSegment,
        operation: OperationKind,
    ) -> Result<Vec<&RegisteredProvider>, MarketDataError> {
        let candidates: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.descriptor.supports(segment, operation))
            .collect();

        if candidates.is_empty() {
            return Err(MarketDataError::NoProvider {
                segment: Some(segment),
                operation,
            });
        }
        Ok(candidates)
    }

    /// Providers that implement search, in priority order.
    ///
    /// Search is not scoped to a segment.
    pub fn search_candidates(&self) -> Result<Vec<&RegisteredProvider>, MarketDataError> {
        let candidates: Vec<_> = self
            .providers
            .iter()
            .filter(|p| {
                p.descriptor
                    .capabilities
                    .supports_operation(OperationKind::Search)
            })
            .collect();

        if candidates.is_empty() {
            return Err(MarketDataError::NoProvider {
                segment: None,
                operation: OperationKind::Search,
            });
        }
        Ok(candidates)
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredProvider> {
        self.providers.iter().find(|p| p.id() == id)
    }

    pub fn providers(&self) -> &[RegisteredProvider] {
        &self.providers
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.iter().map(RegisteredProvider::id)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct MockProvider {
        id: &'static str,
        priority: u8,
        segments: &'static [MarketSegment],
        operations: &'static [OperationKind],
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                segments: self.segments,
                operations: self.operations,
            }
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::default()
        }
    }

    fn mock(
        id: &'static str,
        priority: u8,
        segments: &'static [MarketSegment],
        operations: &'static [OperationKind],
    ) -> Arc<dyn MarketDataProvider> {
        Arc::new(MockProvider {
            id,
            priority,
            segments,
            operations,
        })
    }

    fn sample() -> Vec<Arc<dyn MarketDataProvider>> {
        vec![
            mock(
                "EQUITY_B",
                2,
                &[MarketSegment::UsEquity],
                &[OperationKind::Quote, OperationKind::Search],
            ),
            mock(
                "EQUITY_A",
                2,
                &[MarketSegment::UsEquity],
                &[OperationKind::Quote],
            ),
            mock(
                "EQUITY_TOP",
                1,
                &[MarketSegment::UsEquity, MarketSegment::Crypto],
                &[OperationKind::Quote, OperationKind::Series],
            ),
            mock(
                "CRYPTO_ONLY",
                1,
                &[MarketSegment::Crypto],
                &[OperationKind::Quote, OperationKind::Search],
            ),
        ]
    }

    fn ids(list: &[&RegisteredProvider]) -> Vec<&'static str> {
        list.iter().map(|p| p.id()).collect()
    }

    #[test]
    fn test_candidates_sorted_by_priority_then_id() {
        let registry = CapabilityRegistry::new(sample());
        let candidates = registry
            .candidates(MarketSegment::UsEquity, OperationKind::Quote)
            .unwrap();

        assert_eq!(ids(&candidates), vec!["EQUITY_TOP", "EQUITY_A", "EQUITY_B"]);
    }

    #[test]
    fn test_candidates_require_segment_and_operation() {
        let registry = CapabilityRegistry::new(sample());
        let candidates = registry
            .candidates(MarketSegment::Crypto, OperationKind::Series)
            .unwrap();
        assert_eq!(ids(&candidates), vec!["EQUITY_TOP"]);
    }

    #[test]
    fn test_no_provider_is_an_error() {
        let registry = CapabilityRegistry::new(sample());
        let error = registry
            .candidates(MarketSegment::Forex, OperationKind::Quote)
            .unwrap_err();

        assert!(matches!(
            error,
            MarketDataError::NoProvider {
                segment: Some(MarketSegment::Forex),
                operation: OperationKind::Quote
            }
        ));
    }

    #[test]
    fn test_custom_priorities_override_defaults() {
        let mut custom = HashMap::new();
        custom.insert("EQUITY_B".to_string(), 0);
        custom.insert("EQUITY_TOP".to_string(), 50);

        let registry = CapabilityRegistry::with_priorities(sample(), custom);
        let candidates = registry
            .candidates(MarketSegment::UsEquity, OperationKind::Quote)
            .unwrap();

        assert_eq!(ids(&candidates), vec!["EQUITY_B", "EQUITY_A", "EQUITY_TOP"]);
        assert_eq!(registry.get("EQUITY_TOP").unwrap().descriptor.priority, 50);
    }

    #[test]
    fn test_search_candidates_ignore_segment() {
        let registry = CapabilityRegistry::new(sample());
        let candidates = registry.search_candidates().unwrap();
        assert_eq!(ids(&candidates), vec!["CRYPTO_ONLY", "EQUITY_B"]);

        let empty = CapabilityRegistry::new(Vec::new());
        assert!(matches!(
            empty.search_candidates(),
            Err(MarketDataError::NoProvider { segment: None, .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut providers = sample();
        providers.push(mock("EQUITY_A", 0, &[MarketSegment::Forex], &[OperationKind::Quote]));

        let registry = CapabilityRegistry::new(providers);
        assert_eq!(registry.providers().len(), 4);
        assert_eq!(registry.get("EQUITY_A").unwrap().descriptor.priority, 2);
    }
}
