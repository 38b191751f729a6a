//! Consecutive-failure circuit breaker.
//!
//! While closed every call is admitted. Reaching the failure threshold opens
//! the circuit for `open_timeout`; afterwards exactly one trial call is
//! admitted at a time until one of them reports an outcome.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Runtime circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is let through.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { retry_at: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
struct Ledger {
    phase: Phase,
    failures: u32,
}

/// Breaker shared by every call issued through one client.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    ledger: Mutex<Ledger>,
}

/// Permission to run one call. Report its outcome with
/// [`Admission::succeeded`] or [`Admission::failed`]; dropping it unreported
/// leaves the breaker untouched apart from freeing a half-open trial slot.
#[must_use = "an unreported admission does not move the breaker"]
#[derive(Debug)]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(Ledger {
                phase: Phase::Closed,
                failures: 0,
            }),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Admits a call, or returns `None` while the circuit rejects calls.
    pub fn admit(&self) -> Option<Admission<'_>> {
        let mut ledger = self.ledger();
        let trial = match ledger.phase {
            Phase::Closed => false,
            Phase::Open { retry_at } if Instant::now() >= retry_at => {
                tracing::info!("circuit breaker half-open; admitting a trial call");
                true
            }
            Phase::HalfOpen {
                trial_in_flight: false,
            } => true,
            Phase::Open { .. } | Phase::HalfOpen { .. } => return None,
        };
        if trial {
            ledger.phase = Phase::HalfOpen {
                trial_in_flight: true,
            };
        }

        Some(Admission {
            breaker: self,
            trial,
        })
    }

    pub fn state(&self) -> CircuitState {
        match self.ledger().phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.ledger().failures
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }

    fn close(&self) {
        let mut ledger = self.ledger();
        if !matches!(ledger.phase, Phase::Closed) {
            tracing::info!("circuit breaker closed");
        }
        ledger.phase = Phase::Closed;
        ledger.failures = 0;
    }

    fn trip(&self, trial: bool) {
        let mut ledger = self.ledger();
        ledger.failures = ledger.failures.saturating_add(1);

        let opens = trial
            || (matches!(ledger.phase, Phase::Closed)
                && ledger.failures >= self.config.failure_threshold);
        if opens {
            tracing::warn!(
                failures = ledger.failures,
                open_for = ?self.config.open_timeout,
                "circuit breaker opened"
            );
            ledger.phase = Phase::Open {
                retry_at: Instant::now() + self.config.open_timeout,
            };
        }
    }

    fn release_trial(&self) {
        let mut ledger = self.ledger();
        if let Phase::HalfOpen {
            trial_in_flight: true,
        } = ledger.phase
        {
            ledger.phase = Phase::HalfOpen {
                trial_in_flight: false,
            };
        }
    }
}

impl Admission<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeeded(mut self) {
        self.trial = false;
        self.breaker.close();
    }

    pub fn failed(mut self) {
        let trial = std::mem::replace(&mut self.trial, false);
        self.breaker.trip(trial);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.trial {
            self.breaker.release_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            open_timeout,
        })
    }

    fn fail(breaker: &CircuitBreaker) {
        breaker.admit().expect("admitted").failed();
    }

    #[test]
    fn defaults_break_after_two_failures_for_three_seconds() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.open_timeout, Duration::from_secs(3));
    }

    #[test]
    fn threshold_failures_open_and_reject() {
        let breaker = breaker(2, Duration::from_secs(60));

        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Closed);
        fail(&breaker);

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.admit().is_none());
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let breaker = breaker(2, Duration::from_secs(60));

        fail(&breaker);
        breaker.admit().expect("closed").succeeded();
        fail(&breaker);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[test]
    fn half_open_admits_a_single_trial() {
        let breaker = breaker(1, Duration::from_millis(1));
        fail(&breaker);
        std::thread::sleep(Duration::from_millis(5));

        let trial = breaker.admit().expect("cool-down elapsed");
        assert!(trial.is_trial());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.admit().is_none(), "second caller waits for the trial");

        trial.succeeded();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.admit().is_some_and(|admission| !admission.is_trial()));
    }

    #[test]
    fn failed_trial_reopens_immediately() {
        let breaker = breaker(3, Duration::from_millis(1));
        for _ in 0..3 {
            fail(&breaker);
        }
        std::thread::sleep(Duration::from_millis(5));

        breaker.admit().expect("trial").failed();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.admit().is_none());
    }

    #[test]
    fn unreported_trial_frees_the_slot() {
        let breaker = breaker(1, Duration::from_millis(1));
        fail(&breaker);
        std::thread::sleep(Duration::from_millis(5));

        drop(breaker.admit().expect("trial"));

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.admit().is_some_and(|admission| admission.is_trial()));
    }
}
