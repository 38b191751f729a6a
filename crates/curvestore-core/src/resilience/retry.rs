//! Retry policy for transient failures.

use std::time::Duration;

/// Wait between a failed attempt and the next one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed { delay: Duration },
    /// `base * factor^attempt`, capped at `max`; with `jitter` the capped
    /// delay is scaled by a random factor in `[0.5, 1.5)`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter: false,
            } => scaled(base, factor, attempt).min(max),
            Self::Exponential {
                base,
                factor,
                max,
                jitter: true,
            } => scaled(base, factor, attempt)
                .min(max)
                .mul_f64(0.5 + fastrand::f64()),
        }
    }
}

// Saturates instead of overflowing for large attempts.
fn scaled(base: Duration, factor: f64, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let nanos = base.as_nanos() as f64 * factor.powi(exponent);
    if nanos.is_finite() && nanos < u64::MAX as f64 {
        Duration::from_nanos(nanos.max(0.0) as u64)
    } else {
        Duration::from_nanos(u64::MAX)
    }
}

/// Retry policy applied to transient (transport-level) failures only.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a failed attempt number `attempt` (0-based) may be retried.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.enabled && attempt < self.max_retries
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential(jitter: bool) -> Backoff {
        Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter,
        }
    }

    #[test]
    fn fixed_delay_ignores_the_attempt() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay(0), backoff.delay(10));
    }

    #[test]
    fn exponential_delay_doubles_up_to_the_cap() {
        let delays: Vec<_> = (0..5).map(|attempt| exponential(false).delay(attempt)).collect();
        assert_eq!(
            delays,
            [100, 200, 400, 800, 1000].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn huge_attempts_saturate_at_the_cap() {
        assert_eq!(exponential(false).delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_either_side() {
        for attempt in 0..5 {
            let nominal = exponential(false).delay(attempt);
            for _ in 0..20 {
                let delay = exponential(true).delay(attempt);
                assert!(delay >= nominal / 2, "attempt={attempt} delay={delay:?}");
                assert!(delay <= nominal * 3 / 2, "attempt={attempt} delay={delay:?}");
            }
        }
    }

    #[test]
    fn default_policy_retries_three_times_from_200ms() {
        let config = RetryConfig::default();

        assert!(config.allows_retry(2));
        assert!(!config.allows_retry(3));
        assert!(matches!(
            config.backoff,
            Backoff::Exponential { base, max, .. }
                if base == Duration::from_millis(200) && max == Duration::from_secs(3)
        ));
    }

    #[test]
    fn disabled_policy_never_retries() {
        assert!(!RetryConfig::no_retry().allows_retry(0));
        assert!(RetryConfig::fixed(Duration::from_millis(5), 2).allows_retry(1));
    }
}
