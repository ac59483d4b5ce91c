//! Per-provider circuit breaker for fault tolerance.
//!
//! Each provider has its own state machine:
//!
//! - **Closed**: requests pass. Failures inside the sliding window are
//!   counted; reaching the threshold opens the circuit.
//! - **Open**: requests are short-circuited until the cooldown elapses.
//! - **HalfOpen**: exactly one probe request is let through. Success closes
//!   the circuit, failure reopens it with a longer cooldown (multiplied by
//!   the backoff factor, capped at the maximum).
//!
//! Every provider's state sits behind its own mutex, so updates for one
//! provider never wait on another. The breaker is in-memory and resets on
//! restart.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::Serialize;

/// Default number of failures inside the window before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default sliding window for counting failures.
const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(60);

/// Default time an open circuit waits before letting a probe through.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

const DEFAULT_MAX_COOLDOWN: Duration = Duration::from_secs(300);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// Testing recovery - a single probe is allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Failures inside `failure_window` that open the circuit.
    pub failure_threshold: u32,
    /// A failure streak older than this starts counting from zero again.
    pub failure_window: Duration,
    /// Cooldown after the first trip.
    pub cooldown: Duration,
    /// Applied to the cooldown each time a probe fails.
    pub backoff_multiplier: f64,
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            failure_window: DEFAULT_FAILURE_WINDOW,
            cooldown: DEFAULT_COOLDOWN,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_cooldown: DEFAULT_MAX_COOLDOWN,
        }
    }
}

impl CircuitBreakerConfig {
    fn next_cooldown(&self, current: Duration) -> Duration {
        let multiplier = if self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0 {
            self.backoff_multiplier
        } else {
            1.0
        };
        current.mul_f64(multiplier).min(self.max_cooldown)
    }
}

/// Internal circuit state for a single provider.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    /// Failure times still inside the sliding window
    recent_failures: VecDeque<Instant>,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
    opened_at: Option<Instant>,
    current_cooldown: Duration,
    probe_in_flight: bool,
    successes: u64,
    failures: u64,
    latency_total: Duration,
}

impl Circuit {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            recent_failures: VecDeque::new(),
            last_failure: None,
            last_success: None,
            opened_at: None,
            current_cooldown: config.cooldown,
            probe_in_flight: false,
            successes: 0,
            failures: 0,
            latency_total: Duration::ZERO,
        }
    }

    /// Open -> HalfOpen once the cooldown has elapsed.
    fn poll_cooldown(&mut self, provider: &str) {
        if self.state != CircuitState::Open {
            return;
        }
        let elapsed = self.opened_at.map_or(true, |at| at.elapsed() >= self.current_cooldown);
        if elapsed {
            info!(
                "Circuit breaker: transitioning '{}' from OPEN to HALF_OPEN",
                provider
            );
            self.state = CircuitState::HalfOpen;
            self.probe_in_flight = false;
        }
    }

    fn admits(&self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !self.probe_in_flight,
            CircuitState::Open => false,
        }
    }

    fn open(&mut self, cooldown: Duration) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.current_cooldown = cooldown;
        self.probe_in_flight = false;
    }

    fn close(&mut self, config: &CircuitBreakerConfig) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.recent_failures.clear();
        self.opened_at = None;
        self.current_cooldown = config.cooldown;
        self.probe_in_flight = false;
    }

    /// Apply one call outcome. Only the probe may move a half-open circuit;
    /// late outcomes from calls admitted before the trip just update stats.
    fn apply(
        &mut self,
        provider: &str,
        config: &CircuitBreakerConfig,
        success: bool,
        latency: Duration,
        from_probe: bool,
    ) {
        let now = Instant::now();
        self.latency_total += latency;

        if success {
            self.successes += 1;
            self.last_success = Some(now);
            match self.state {
                CircuitState::Closed => {
                    self.consecutive_failures = 0;
                    self.recent_failures.clear();
                }
                CircuitState::HalfOpen if from_probe => {
                    info!(
                        "Circuit breaker: probe succeeded, closing circuit for '{}'",
                        provider
                    );
                    self.close(config);
                }
                _ => {
                    debug!(
                        "Circuit breaker: late success for '{}' while {}",
                        provider, self.state
                    );
                }
            }
            return;
        }

        self.failures += 1;
        self.last_failure = Some(now);
        match self.state {
            CircuitState::Closed => {
                while let Some(&oldest) = self.recent_failures.front() {
                    if now.duration_since(oldest) <= config.failure_window {
                        break;
                    }
                    self.recent_failures.pop_front();
                }
                self.recent_failures.push_back(now);
                self.consecutive_failures = self.recent_failures.len() as u32;

                if self.consecutive_failures >= config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit for '{}' after {} failures (cooldown {:?})",
                        provider, self.consecutive_failures, config.cooldown
                    );
                    self.open(config.cooldown);
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, self.consecutive_failures, config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen if from_probe => {
                let cooldown = config.next_cooldown(self.current_cooldown);
                self.consecutive_failures += 1;
                info!(
                    "Circuit breaker: probe failed, reopening circuit for '{}' (cooldown {:?})",
                    provider, cooldown
                );
                self.open(cooldown);
            }
            _ => {
                debug!(
                    "Circuit breaker: additional failure for '{}' while {}",
                    provider, self.state
                );
            }
        }
    }
}

/// One provider's circuit, shared with outstanding permits.
#[derive(Debug)]
struct ProviderCircuit {
    provider: String,
    circuit: Mutex<Circuit>,
}

impl ProviderCircuit {
    /// Lock the circuit, recovering from poison if necessary.
    ///
    /// A poisoned circuit holds at worst a slightly stale state, which is
    /// better than taking every request down with a panic.
    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Circuit breaker mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }
}

/// Admission ticket for one call.
///
/// Report the outcome with [`CallPermit::record`]. A permit dropped without
/// an outcome (cancelled race loser, symbol the provider does not know)
/// releases the half-open probe slot without counting anything.
#[derive(Debug)]
pub struct CallPermit {
    circuit: Arc<ProviderCircuit>,
    config: Arc<CircuitBreakerConfig>,
    probe: bool,
    settled: bool,
}

impl CallPermit {
    /// Whether this call is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record(mut self, success: bool, latency: Duration) {
        self.settled = true;
        let mut circuit = self.circuit.lock();
        circuit.apply(
            &self.circuit.provider,
            &self.config,
            success,
            latency,
            self.probe,
        );
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            let mut circuit = self.circuit.lock();
            if circuit.state == CircuitState::HalfOpen {
                debug!(
                    "Circuit breaker: probe for '{}' released without outcome",
                    self.circuit.provider
                );
                circuit.probe_in_flight = false;
            }
        }
    }
}

/// Point-in-time health of one provider.
#[derive(Clone, Debug, Serialize)]
pub struct CircuitSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub cooldown_ms: u64,
    pub probe_in_flight: bool,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency_ms: Option<f64>,
}

/// Wall-clock time of a monotonic instant, for reporting only.
fn wall_clock(instant: Instant) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(instant.elapsed())
        .ok()
        .map(|ago| Utc::now() - ago)
}

/// Per-provider circuit breaker.
pub struct CircuitBreaker {
    circuits: DashMap<String, Arc<ProviderCircuit>>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: DashMap::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Create a CLOSED circuit for `provider` if it has none yet.
    pub fn register(&self, provider: &str) {
        self.circuit(provider);
    }

    fn circuit(&self, provider: &str) -> Arc<ProviderCircuit> {
        if let Some(existing) = self.circuits.get(provider) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .circuits
            .entry(provider.to_string())
            .or_insert_with(|| {
                Arc::new(ProviderCircuit {
                    provider: provider.to_string(),
                    circuit: Mutex::new(Circuit::new(&self.config)),
                })
            });
        Arc::clone(entry.value())
    }

    /// Whether a call to `provider` would currently be admitted.
    ///
    /// Moves an open circuit to HalfOpen once its cooldown has elapsed. Does
    /// not claim the probe slot; use [`try_acquire`](Self::try_acquire) for that.
    pub fn is_eligible(&self, provider: &str) -> bool {
        let shared = self.circuit(provider);
        let mut circuit = shared.lock();
        circuit.poll_cooldown(provider);
        circuit.admits()
    }

    /// Admit one call, claiming the probe slot when half-open.
    pub fn try_acquire(&self, provider: &str) -> Option<CallPermit> {
        let shared = self.circuit(provider);
        let probe = {
            let mut circuit = shared.lock();
            circuit.poll_cooldown(provider);
            if !circuit.admits() {
                return None;
            }
            let probe = circuit.state == CircuitState::HalfOpen;
            if probe {
                debug!("Circuit breaker: admitting probe for '{}'", provider);
                circuit.probe_in_flight = true;
            }
            probe
        };

        Some(CallPermit {
            circuit: shared,
            config: Arc::clone(&self.config),
            probe,
            settled: false,
        })
    }

    /// Record the outcome of a call made without a permit.
    ///
    /// Treated as authoritative: in HalfOpen it closes or reopens the circuit.
    pub fn record_outcome(&self, provider: &str, success: bool, latency: Duration) {
        let shared = self.circuit(provider);
        let mut circuit = shared.lock();
        circuit.poll_cooldown(provider);
        circuit.apply(provider, &self.config, success, latency, true);
    }

    /// Get the current state for a provider.
    pub fn state(&self, provider: &str) -> CircuitState {
        let shared = self.circuit(provider);
        let mut circuit = shared.lock();
        circuit.poll_cooldown(provider);
        circuit.state
    }

    /// Consecutive failures in the current streak.
    pub fn failure_count(&self, provider: &str) -> u32 {
        self.circuits
            .get(provider)
            .map(|c| c.lock().consecutive_failures)
            .unwrap_or(0)
    }

    /// Time of the last successful call, used to break priority ties.
    pub fn last_success(&self, provider: &str) -> Option<Instant> {
        self.circuits
            .get(provider)
            .and_then(|c| c.lock().last_success)
    }

    /// Reset the circuit for a provider to Closed state.
    ///
    /// Returns `false` for a provider the breaker has never seen.
    pub fn reset(&self, provider: &str) -> bool {
        let Some(shared) = self.circuits.get(provider).map(|c| Arc::clone(c.value())) else {
            return false;
        };
        info!(
            "Circuit breaker: manually resetting circuit for '{}'",
            provider
        );
        *shared.lock() = Circuit::new(&self.config);
        true
    }

    /// Health of every tracked provider, sorted by id.
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let circuits: Vec<Arc<ProviderCircuit>> = self
            .circuits
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut snapshots: Vec<CircuitSnapshot> = circuits
            .iter()
            .map(|shared| {
                let mut circuit = shared.lock();
                circuit.poll_cooldown(&shared.provider);
                let calls = circuit.successes + circuit.failures;
                CircuitSnapshot {
                    provider: shared.provider.clone(),
                    state: circuit.state,
                    consecutive_failures: circuit.consecutive_failures,
                    last_failure: circuit.last_failure.and_then(wall_clock),
                    last_success: circuit.last_success.and_then(wall_clock),
                    opened_at: circuit.opened_at.and_then(wall_clock),
                    cooldown_ms: circuit.current_cooldown.as_millis() as u64,
                    probe_in_flight: circuit.probe_in_flight,
                    successes: circuit.successes,
                    failures: circuit.failures,
                    avg_latency_ms: (calls > 0)
                        .then(|| circuit.latency_total.as_secs_f64() * 1000.0 / calls as f64),
                }
            })
            .collect();

        snapshots.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshots
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
