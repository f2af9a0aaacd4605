//! Per-backend circuit breaker for adaptive dispatch.
//!
//! Tracks success/failure counts per backend and temporarily skips
//! backends that fail repeatedly. After a cooldown period, a tripped
//! backend enters a half-open state where a single probe request
//! determines whether to restore or re-trip the circuit.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::collections::HashMap;
use std::time::Instant;

/// Circuit breaker state for a single backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Backend is healthy — all requests are allowed through.
    Closed,
    /// Backend has failed too many times — requests are skipped until the
    /// cooldown expires.
    Open,
    /// Cooldown has elapsed — one probe request is allowed to test recovery.
    HalfOpen,
}

/// Health tracking data for a single backend.
#[derive(Debug, Clone)]
struct BackendHealth {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before tripping the circuit to Open.
    pub failure_threshold: u32,
    /// Seconds to wait in Open state before transitioning to HalfOpen.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Per-backend circuit breaker, keyed by backend name.
///
/// Owned by the pipeline (one per pipeline instance, behind a mutex) —
/// there is no process-wide breaker state.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    backends: HashMap<String, BackendHealth>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            backends: HashMap::new(),
        }
    }

    /// Record a successful request for the given backend.
    ///
    /// Resets the consecutive failure count and closes the circuit
    /// regardless of previous state.
    pub fn record_success(&mut self, backend: &str) {
        let health = self.backends.entry(backend.to_string()).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
    }

    /// Record a failed request for the given backend.
    ///
    /// Increments the consecutive failure count. If the count reaches
    /// the configured threshold, transitions to [`CircuitState::Open`].
    pub fn record_failure(&mut self, backend: &str) {
        let health = self.backends.entry(backend.to_string()).or_default();
        health.consecutive_failures += 1;
        health.last_failure_at = Some(Instant::now());

        if health.consecutive_failures >= self.config.failure_threshold {
            health.state = CircuitState::Open;
        }
    }

    /// Check whether a request to the given backend should be attempted.
    ///
    /// - [`CircuitState::Closed`]: always `true`
    /// - [`CircuitState::Open`]: `true` only if the cooldown has elapsed
    ///   (transitions to [`CircuitState::HalfOpen`])
    /// - [`CircuitState::HalfOpen`]: `true` (one probe allowed)
    pub fn should_attempt(&mut self, backend: &str) -> bool {
        let cooldown_secs = self.config.cooldown_secs;
        let health = self.backends.entry(backend.to_string()).or_default();

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed().as_secs() >= cooldown_secs);

                if cooldown_elapsed {
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Get the current circuit state for a specific backend.
    pub fn status(&self, backend: &str) -> CircuitState {
        self.backends
            .get(backend)
            .map_or(CircuitState::Closed, |h| h.state)
    }

    /// Health report: (backend, state, consecutive failures) for every
    /// backend seen so far.
    pub fn health_report(&self) -> Vec<(String, CircuitState, u32)> {
        self.backends
            .iter()
            .map(|(name, health)| (name.clone(), health.state, health.consecutive_failures))
            .collect()
    }

    /// Reset all backend states to healthy.
    pub fn reset(&mut self) {
        self.backends.clear();
    }
}
