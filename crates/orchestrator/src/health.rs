//! Per-provider circuit breaker.
//!
//! Each provider has a rolling window of failure timestamps. When the number
//! of failures inside the window reaches the threshold, the circuit opens and
//! the provider is excluded from routing until the cooldown elapses. A
//! non-retryable failure (e.g. rejected credentials) opens the circuit
//! immediately. A successful call closes the circuit and clears the window.
//!
//! This is the only cross-request mutable state in the subsystem. All access
//! goes through one mutex; critical sections are short and never await.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use generation::{ProviderName, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Longest time a single failure can keep a circuit open, whatever the
/// provider or configuration asks for.
pub const MAX_OPEN_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Circuit-breaker tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures inside the window that open the circuit.
    pub failure_threshold: u32,
    /// Length of the rolling failure window.
    pub failure_window_ms: u64,
    /// How long an open circuit excludes the provider.
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window_ms: 60_000,
            cooldown_ms: 30_000,
        }
    }
}

impl CircuitBreakerConfig {
    fn window(&self) -> Duration {
        Duration::from_millis(self.failure_window_ms)
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Default)]
struct Circuit {
    failures: VecDeque<Instant>,
    open_until: Option<Instant>,
}

impl Circuit {
    /// Drops failures that left the window and closes an expired circuit.
    fn refresh(&mut self, now: Instant, window: Duration) {
        if self.open_until.is_some_and(|until| now >= until) {
            self.open_until = None;
            self.failures.clear();
        }
        while self
            .failures
            .front()
            .is_some_and(|t| now.duration_since(*t) > window)
        {
            self.failures.pop_front();
        }
    }

    fn open_for(&mut self, now: Instant, duration: Duration) {
        let until = now
            .checked_add(duration.min(MAX_OPEN_DURATION))
            .unwrap_or(now);
        self.open_until = Some(self.open_until.map_or(until, |current| current.max(until)));
    }

    fn is_open(&self) -> bool {
        self.open_until.is_some()
    }
}

/// Thread-safe failure tracker shared by all in-flight requests.
#[derive(Debug)]
pub struct HealthTracker {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<ProviderName, Circuit>>,
}

impl HealthTracker {
    /// Creates a tracker with every circuit closed.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderName, Circuit>> {
        // Every update leaves the map consistent, so a poisoned lock is usable.
        self.circuits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` when the provider may be offered as a candidate.
    pub fn is_available(&self, provider: &ProviderName) -> bool {
        let mut circuits = self.lock();
        match circuits.get_mut(provider) {
            Some(circuit) => {
                circuit.refresh(Instant::now(), self.config.window());
                !circuit.is_open()
            }
            None => true,
        }
    }

    /// Failures recorded inside the current window.
    pub fn rolling_failures(&self, provider: &ProviderName) -> u32 {
        let mut circuits = self.lock();
        circuits.get_mut(provider).map_or(0, |circuit| {
            circuit.refresh(Instant::now(), self.config.window());
            u32::try_from(circuit.failures.len()).unwrap_or(u32::MAX)
        })
    }

    /// Records a failed call. Returns `true` if this failure opened the
    /// circuit.
    pub fn record_failure(&self, provider: &ProviderName, policy: &RetryPolicy) -> bool {
        let now = Instant::now();
        let mut circuits = self.lock();
        let circuit = circuits.entry(provider.clone()).or_default();
        circuit.refresh(now, self.config.window());
        let was_open = circuit.is_open();
        circuit.failures.push_back(now);

        let over_threshold =
            circuit.failures.len() >= self.config.failure_threshold.max(1) as usize;
        match policy {
            RetryPolicy::NonRetryable => circuit.open_for(now, self.config.cooldown()),
            RetryPolicy::Retryable { .. } if over_threshold => {
                circuit.open_for(now, self.config.cooldown())
            }
            RetryPolicy::Retryable { after: Some(after) } => circuit.open_for(now, *after),
            RetryPolicy::Retryable { after: None } => {}
        }

        let tripped = !was_open && circuit.is_open();
        if tripped {
            warn!(
                provider = %provider,
                failures = circuit.failures.len(),
                "circuit opened; provider excluded from routing"
            );
        } else {
            debug!(provider = %provider, failures = circuit.failures.len(), "provider failure recorded");
        }
        tripped
    }

    /// Records a successful call, closing the circuit.
    pub fn record_success(&self, provider: &ProviderName) {
        let mut circuits = self.lock();
        if let Some(circuit) = circuits.get_mut(provider) {
            circuit.failures.clear();
            circuit.open_until = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ProviderName {
        ProviderName::new(s).unwrap()
    }

    fn tracker(threshold: u32, window_ms: u64, cooldown_ms: u64) -> HealthTracker {
        HealthTracker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            failure_window_ms: window_ms,
            cooldown_ms,
        })
    }

    const RETRY: RetryPolicy = RetryPolicy::Retryable { after: None };

    #[test]
    fn unknown_providers_are_available() {
        let health = tracker(3, 1_000, 1_000);
        assert!(health.is_available(&name("a")));
        assert_eq!(health.rolling_failures(&name("a")), 0);
    }

    #[test]
    fn circuit_opens_at_threshold() {
        let health = tracker(2, 60_000, 60_000);
        let a = name("a");
        assert!(!health.record_failure(&a, &RETRY));
        assert!(health.is_available(&a));
        assert!(health.record_failure(&a, &RETRY));
        assert!(!health.is_available(&a));
        assert_eq!(health.rolling_failures(&a), 2);
    }

    #[test]
    fn non_retryable_failure_opens_immediately() {
        let health = tracker(5, 60_000, 60_000);
        let a = name("a");
        assert!(health.record_failure(&a, &RetryPolicy::NonRetryable));
        assert!(!health.is_available(&a));
    }

    #[test]
    fn circuit_closes_after_cooldown() {
        let health = tracker(1, 60_000, 20);
        let a = name("a");
        health.record_failure(&a, &RETRY);
        assert!(!health.is_available(&a));
        std::thread::sleep(Duration::from_millis(40));
        assert!(health.is_available(&a));
        assert_eq!(health.rolling_failures(&a), 0);
    }

    #[test]
    fn failures_age_out_of_window() {
        let health = tracker(2, 20, 60_000);
        let a = name("a");
        health.record_failure(&a, &RETRY);
        std::thread::sleep(Duration::from_millis(40));
        assert!(!health.record_failure(&a, &RETRY));
        assert!(health.is_available(&a));
        assert_eq!(health.rolling_failures(&a), 1);
    }

    #[test]
    fn success_resets_window() {
        let health = tracker(2, 60_000, 60_000);
        let a = name("a");
        health.record_failure(&a, &RETRY);
        health.record_success(&a);
        assert!(!health.record_failure(&a, &RETRY));
        assert!(health.is_available(&a));
    }

    #[test]
    fn rate_limit_hint_excludes_provider_temporarily() {
        let health = tracker(10, 60_000, 60_000);
        let a = name("a");
        let hint = RetryPolicy::Retryable {
            after: Some(Duration::from_millis(20)),
        };
        assert!(health.record_failure(&a, &hint));
        assert!(!health.is_available(&a));
        std::thread::sleep(Duration::from_millis(40));
        assert!(health.is_available(&a));
    }

    #[test]
    fn unbounded_rate_limit_hint_is_capped() {
        let health = tracker(10, 60_000, 60_000);
        let a = name("a");
        let hint = RetryPolicy::Retryable {
            after: Some(Duration::from_secs(u64::MAX)),
        };
        assert!(health.record_failure(&a, &hint));
        assert!(!health.is_available(&a));
        health.record_success(&a);
        assert!(health.is_available(&a));
    }

    #[test]
    fn oversized_cooldown_still_opens_the_circuit() {
        let health = tracker(1, u64::MAX, u64::MAX);
        let a = name("a");
        assert!(health.record_failure(&a, &RETRY));
        assert!(!health.is_available(&a));
    }
}
