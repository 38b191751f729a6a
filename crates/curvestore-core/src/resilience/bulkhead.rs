use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tokio::sync::{Semaphore, TryAcquireError};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget per time window, enforced before each call leaves the bulkhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    pub window: Duration,
    pub limit: u32,
}

/// Concurrency limits for calls issued through one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadConfig {
    /// Calls allowed in flight at once.
    pub max_parallelism: usize,
    /// Callers allowed to wait for a slot; further callers are rejected.
    pub max_queued: usize,
    pub rate_quota: Option<RateQuota>,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 10,
            max_queued: 15,
            rate_quota: None,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("bulkhead is saturated: all slots busy and the wait queue is full")]
pub struct BulkheadRejected;

/// Bounds in-flight and queued calls.
pub struct Bulkhead {
    slots: Semaphore,
    queued: AtomicUsize,
    max_queued: usize,
    limiter: Option<DirectRateLimiter>,
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("available_slots", &self.slots.available_permits())
            .field("queued", &self.queued())
            .field("max_queued", &self.max_queued)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

struct QueueTicket<'a> {
    queued: &'a AtomicUsize,
}

impl Drop for QueueTicket<'_> {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Bulkhead {
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            slots: Semaphore::new(config.max_parallelism.max(1)),
            queued: AtomicUsize::new(0),
            max_queued: config.max_queued,
            limiter: config
                .rate_quota
                .map(|quota| RateLimiter::direct(quota_from_window(quota.window, quota.limit))),
        }
    }

    /// Runs `operation` once a slot is free, waiting in the queue if allowed.
    pub async fn run<F: Future>(&self, operation: F) -> Result<F::Output, BulkheadRejected> {
        let _permit = match self.slots.try_acquire() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(BulkheadRejected),
            Err(TryAcquireError::NoPermits) => {
                let _ticket = self.enter_queue()?;
                self.slots.acquire().await.map_err(|_| BulkheadRejected)?
            }
        };

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        Ok(operation.await)
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    fn enter_queue(&self) -> Result<QueueTicket<'_>, BulkheadRejected> {
        self.queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |queued| {
                (queued < self.max_queued).then_some(queued + 1)
            })
            .map_err(|queued| {
                tracing::warn!(queued, max_queued = self.max_queued, "bulkhead rejected call");
                BulkheadRejected
            })?;

        Ok(QueueTicket {
            queued: &self.queued,
        })
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = NonZeroU32::new(quota_limit.max(1)).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(safe_limit))
        .allow_burst(safe_limit)
}
