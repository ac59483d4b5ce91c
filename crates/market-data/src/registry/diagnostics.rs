//! Per-request record of what the router did with each candidate.

use std::time::Duration;

use crate::errors::{ProviderError, ProviderFailure};

/// Why a candidate was not called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Circuit is open, or half-open with its probe already in flight.
    CircuitOpen,
    /// Raced, but cancelled because another candidate answered first.
    RaceLost,
}

#[derive(Clone, Debug)]
pub enum AttemptOutcome {
    Skipped(SkipReason),
    Failed(ProviderError),
    Succeeded { latency: Duration },
}

/// One candidate's part in a routed request.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

/// Everything that happened while routing one request, in order.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, provider: &str, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider: provider.to_string(),
            outcome,
        });
    }

    pub fn record_skip(&mut self, provider: &str, reason: SkipReason) {
        self.push(provider, AttemptOutcome::Skipped(reason));
    }

    pub fn record_error(&mut self, provider: &str, error: ProviderError) {
        self.push(provider, AttemptOutcome::Failed(error));
    }

    pub fn record_success(&mut self, provider: &str, latency: Duration) {
        self.push(provider, AttemptOutcome::Succeeded { latency });
    }

    /// Summary for logging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no candidates".to_string();
        }
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Succeeded { latency } => {
                    format!("{}: SUCCESS ({}ms)", a.provider, latency.as_millis())
                }
                AttemptOutcome::Skipped(reason) => format!("{}: SKIPPED ({:?})", a.provider, reason),
                AttemptOutcome::Failed(error) => format!("{}: ERROR ({})", a.provider, error),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Providers that were actually tried (skips excluded), in order.
    pub fn attempted(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| !matches!(a.outcome, AttemptOutcome::Skipped(_)))
            .map(|a| a.provider.clone())
            .collect()
    }

    /// One cause per failed attempt.
    pub fn failures(&self) -> Vec<ProviderFailure> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Failed(error) => Some(ProviderFailure {
                    provider: a.provider.clone(),
                    error: error.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
