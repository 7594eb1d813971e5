//! Retry pacing for rolled-back batches.

use crate::config::BackoffConfig;
use std::time::Duration;

/// Attempt-indexed delay schedule built from [`BackoffConfig`].
///
/// Early attempts use the configured delay sequence verbatim; once the
/// sequence is exhausted the last entry grows by `backoff_multiplier` per
/// additional attempt. Optional proportional jitter is applied before capping
/// at `max_backoff_ms`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: Vec<Duration>,
    multiplier: f64,
    max_delay: Duration,
    jitter_enabled: bool,
    jitter_max_percentage: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delays: config
                .default_backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            multiplier: config.backoff_multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            jitter_enabled: config.jitter_enabled,
            jitter_max_percentage: config.jitter_max_percentage.clamp(0.0, 1.0),
        }
    }

    /// Total number of attempts a batch is allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the attempt following failure number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base = match self.delays.get(attempt as usize - 1) {
            Some(delay) => *delay,
            None => {
                let last = self
                    .delays
                    .last()
                    .copied()
                    .unwrap_or(Duration::from_millis(100));
                let extra = attempt as usize - self.delays.len();
                last.mul_f64(self.multiplier.powi(extra as i32))
            }
        };

        let jittered = if self.jitter_enabled && self.jitter_max_percentage > 0.0 {
            let jitter = fastrand::f64() * self.jitter_max_percentage;
            base.mul_f64(1.0 + jitter)
        } else {
            base
        };

        jittered.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy_without_jitter() -> RetryPolicy {
        RetryPolicy::from_config(&BackoffConfig {
            max_attempts: 5,
            default_backoff_ms: vec![50, 100, 250],
            max_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            jitter_enabled: false,
            jitter_max_percentage: 0.1,
        })
    }

    #[test]
    fn test_sequence_then_exponential_growth() {
        let policy = policy_without_jitter();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(1_000));
    }

    #[test]
    fn test_cap_applies() {
        let policy = policy_without_jitter();
        assert_eq!(policy.delay_for_attempt(12), Duration::from_millis(1_000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let policy = policy_without_jitter();
        assert_eq!(policy.delay_for_attempt(0), policy.delay_for_attempt(1));
    }

    #[test]
    fn test_empty_sequence_falls_back() {
        let policy = RetryPolicy::from_config(&BackoffConfig {
            max_attempts: 3,
            default_backoff_ms: Vec::new(),
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_enabled: false,
            jitter_max_percentage: 0.0,
        });
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    }

    proptest! {
        #[test]
        fn prop_jittered_delay_within_bounds(attempt in 1u32..20) {
            let config = BackoffConfig {
                max_attempts: 20,
                default_backoff_ms: vec![50, 100, 250],
                max_backoff_ms: 60_000,
                backoff_multiplier: 2.0,
                jitter_enabled: true,
                jitter_max_percentage: 0.25,
            };
            let policy = RetryPolicy::from_config(&config);
            let base = RetryPolicy::from_config(&BackoffConfig {
                jitter_enabled: false,
                ..config.clone()
            })
            .delay_for_attempt(attempt);

            let delay = policy.delay_for_attempt(attempt);
            prop_assert!(delay >= base.min(Duration::from_millis(60_000)));
            prop_assert!(delay <= base.mul_f64(1.25).min(Duration::from_millis(60_000)));
        }

        #[test]
        fn prop_delays_monotonic_without_jitter(attempt in 1u32..19) {
            let policy = policy_without_jitter();
            prop_assert!(policy.delay_for_attempt(attempt) <= policy.delay_for_attempt(attempt + 1));
        }
    }
}
