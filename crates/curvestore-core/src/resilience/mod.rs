//! # Resilience pipeline
//!
//! Every call passes through three layers, outermost first:
//!
//! ```text
//! circuit breaker ─▶ retry ─▶ bulkhead ─▶ operation
//! ```
//!
//! - the **bulkhead** bounds calls in flight and callers waiting for a slot;
//! - **retry** re-runs an attempt only when the caller's predicate marks its
//!   failure as transient, with exponential backoff between attempts;
//! - the **circuit breaker** sees the outcome after retries and, after enough
//!   consecutive transient outcomes, fails further calls fast until its timeout
//!   elapses; then a single trial call decides whether it closes again.
//!
//! Failures the predicate does not mark as transient pass straight through
//! every layer and leave the breaker untouched.

mod bulkhead;
mod circuit_breaker;
mod retry;

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadRejected, RateQuota};
pub use circuit_breaker::{Admission, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{Backoff, RetryConfig};

/// Independently overridable settings for the three layers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResilienceConfig {
    pub bulkhead: BulkheadConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ResilienceConfig {
    pub fn with_bulkhead(mut self, bulkhead: BulkheadConfig) -> Self {
        self.bulkhead = bulkhead;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }
}

/// Why a call did not produce the operation's own result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResilienceError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error(transparent)]
    BulkheadRejected(#[from] BulkheadRejected),
    #[error("operation cancelled")]
    Cancelled,
    /// The last attempt's own failure.
    #[error("{0}")]
    Failed(E),
}

/// Composed breaker ⊃ retry ⊃ bulkhead strategy.
#[derive(Debug)]
pub struct ResiliencePipeline {
    breaker: CircuitBreaker,
    retry: RetryConfig,
    bulkhead: Bulkhead,
}

impl Default for ResiliencePipeline {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

impl ResiliencePipeline {
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            breaker: CircuitBreaker::new(config.circuit_breaker),
            retry: config.retry,
            bulkhead: Bulkhead::new(config.bulkhead),
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    /// Runs `operation` through every layer.
    ///
    /// `operation` receives the 0-based attempt number. `is_transient` decides
    /// which failures are retried and counted by the breaker. Cancelling
    /// `cancel` aborts the current attempt, wait or backoff and stops retrying.
    pub async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
        is_transient: impl Fn(&E) -> bool,
        cancel: &CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Some(admission) = self.breaker.admit() else {
            tracing::debug!("circuit open; failing fast");
            return Err(ResilienceError::CircuitOpen);
        };

        let outcome = self.with_retry(&mut operation, &is_transient, cancel).await;

        match &outcome {
            Ok(_) => admission.succeeded(),
            Err(ResilienceError::Failed(error)) if is_transient(error) => admission.failed(),
            Err(_) => drop(admission),
        }

        outcome
    }

    async fn with_retry<T, E, F, Fut>(
        &self,
        operation: &mut F,
        is_transient: &impl Fn(&E) -> bool,
        cancel: &CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            match self.with_bulkhead(operation(attempt), cancel).await {
                Err(ResilienceError::Failed(error))
                    if self.retry.allows_retry(attempt) && is_transient(&error) =>
                {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(attempt, ?delay, %error, "transient failure; retrying");

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ResilienceError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn with_bulkhead<T, E>(
        &self,
        attempt: impl Future<Output = Result<T, E>>,
        cancel: &CancellationToken,
    ) -> Result<T, ResilienceError<E>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ResilienceError::Cancelled),
            outcome = self.bulkhead.run(attempt) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(ResilienceError::Failed(error)),
                Err(rejected) => Err(ResilienceError::BulkheadRejected(rejected)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Failure {
        Transport,
        Rejected,
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn transient(failure: &Failure) -> bool {
        *failure == Failure::Transport
    }

    fn pipeline(max_retries: u32, failure_threshold: u32) -> ResiliencePipeline {
        ResiliencePipeline::new(
            ResilienceConfig::default()
                .with_retry(RetryConfig::fixed(Duration::from_millis(1), max_retries))
                .with_circuit_breaker(CircuitBreakerConfig {
                    failure_threshold,
                    open_timeout: Duration::from_secs(60),
                }),
        )
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let pipeline = pipeline(3, 5);
        let calls = AtomicU32::new(0);

        let outcome = pipeline
            .execute(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 2 {
                            Err(Failure::Transport)
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                transient,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(pipeline.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn non_transient_failures_are_not_retried_or_counted() {
        let pipeline = pipeline(3, 1);
        let calls = AtomicU32::new(0);

        let outcome: Result<(), _> = pipeline
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Failure::Rejected) }
                },
                transient,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome, Err(ResilienceError::Failed(Failure::Rejected)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn breaker_counts_retried_outcomes_and_then_fails_fast() {
        let pipeline = pipeline(1, 2);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let outcome: Result<(), _> = pipeline
                .execute(
                    |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err(Failure::Transport) }
                    },
                    transient,
                    &cancel,
                )
                .await;
            assert_eq!(outcome, Err(ResilienceError::Failed(Failure::Transport)));
        }

        // two calls, each with one retry
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(pipeline.circuit_state(), CircuitState::Open);

        let outcome: Result<(), _> = pipeline
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
                transient,
                &cancel,
            )
            .await;

        assert_eq!(outcome, Err(ResilienceError::CircuitOpen));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn half_open_lets_one_trial_through_for_concurrent_callers() {
        let pipeline = ResiliencePipeline::new(
            ResilienceConfig::default()
                .with_retry(RetryConfig::no_retry())
                .with_circuit_breaker(CircuitBreakerConfig {
                    failure_threshold: 1,
                    open_timeout: Duration::from_millis(20),
                }),
        );
        let cancel = CancellationToken::new();
        let opened: Result<(), _> = pipeline
            .execute(|_| async { Err(Failure::Transport) }, transient, &cancel)
            .await;
        assert_eq!(opened, Err(ResilienceError::Failed(Failure::Transport)));
        tokio::time::sleep(Duration::from_millis(40)).await;

        let calls = AtomicU32::new(0);
        let slow_success = |_: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<_, Failure>(())
            }
        };
        let (first, second, third) = tokio::join!(
            pipeline.execute(slow_success, transient, &cancel),
            pipeline.execute(slow_success, transient, &cancel),
            pipeline.execute(slow_success, transient, &cancel),
        );

        let outcomes = [first, second, third];
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|outcome| **outcome == Err(ResilienceError::CircuitOpen))
                .count(),
            2
        );
        assert_eq!(pipeline.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn cancellation_stops_retries() {
        let pipeline = ResiliencePipeline::new(
            ResilienceConfig::default()
                .with_retry(RetryConfig::fixed(Duration::from_secs(30), 5)),
        );
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let outcome: Result<(), _> = pipeline
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    cancel.cancel();
                    async { Err(Failure::Transport) }
                },
                transient,
                &cancel,
            )
            .await;

        assert_eq!(outcome, Err(ResilienceError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.circuit_state(), CircuitState::Closed);
    }
}
