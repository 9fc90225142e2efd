//! Backoff policies and retry execution for upload operations.
//!
//! Transient repository failures (connection resets, 5xx responses) are
//! retried with a bounded, optionally jittered backoff. Permanent failures
//! (auth errors, missing repositories) must stop immediately, so the
//! executor accepts a per-error retryability verdict from the caller.
//!
//! # Example
//!
//! ```
//! use buildinfo_retry::{BackoffConfig, BackoffKind, delay_for_attempt};
//! use std::time::Duration;
//!
//! let config = BackoffConfig {
//!     kind: BackoffKind::Exponential,
//!     max_attempts: 4,
//!     base_delay: Duration::from_millis(250),
//!     max_delay: Duration::from_secs(10),
//!     jitter: 0.0,
//! };
//! assert_eq!(delay_for_attempt(&config, 3), Duration::from_secs(1));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// No delay between attempts.
    Immediate,
    /// Delay doubles each attempt (default).
    #[default]
    Exponential,
    /// Delay grows linearly with the attempt number.
    Linear,
    /// Same delay every attempt.
    Constant,
}

/// Bounded backoff configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Growth curve for the delay.
    #[serde(default)]
    pub kind: BackoffKind,
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for the growth curve.
    #[serde(default = "default_base_delay")]
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Hard cap on any single delay.
    #[serde(default = "default_max_delay")]
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Jitter factor: 0.0 = none, 0.5 = delay scaled by 0.5..=1.5.
    #[serde(default)]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential,
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: 0.0,
        }
    }
}

/// Compute the delay before the retry following `attempt` (1-indexed).
pub fn delay_for_attempt(config: &BackoffConfig, attempt: u32) -> Duration {
    let delay = match config.kind {
        BackoffKind::Immediate => Duration::ZERO,
        BackoffKind::Exponential => {
            let pow = attempt.saturating_sub(1).min(16);
            config.base_delay.saturating_mul(2_u32.saturating_pow(pow))
        }
        BackoffKind::Linear => config.base_delay.saturating_mul(attempt),
        BackoffKind::Constant => config.base_delay,
    };

    let capped = delay.min(config.max_delay);
    if config.jitter > 0.0 {
        apply_jitter(capped, config.jitter)
    } else {
        capped
    }
}

/// Scale a delay by a random factor in `(1 - jitter)..=(1 + jitter)`.
fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    use rand::RngExt;

    let mut rng = rand::rng();
    let random_value: f64 = rng.random();
    let factor = 1.0 - jitter + (random_value * 2.0 * jitter);
    let millis = (delay.as_millis() as f64 * factor).round() as u64;
    Duration::from_millis(millis)
}

/// An error together with the caller's retryability verdict.
#[derive(Debug)]
pub struct Classified<E> {
    /// The underlying error.
    pub error: E,
    /// Whether another attempt could plausibly succeed.
    pub retryable: bool,
}

impl<E> Classified<E> {
    /// A transient error worth retrying.
    pub fn retryable(error: E) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    /// A permanent error that must stop the retry loop.
    pub fn permanent(error: E) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// Runs fallible operations under a backoff configuration.
#[derive(Debug, Clone)]
pub struct Retrier {
    config: BackoffConfig,
}

impl Retrier {
    /// Create a retrier with the given configuration.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// The configuration this retrier runs under.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Run an operation, retrying every failure up to `max_attempts`.
    ///
    /// The operation receives the current attempt number (starting at 1).
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_classified(|attempt| operation(attempt).map_err(Classified::retryable))
    }

    /// Run an operation, retrying only errors classified as retryable.
    ///
    /// A permanent classification returns the error immediately, no matter
    /// how many attempts remain.
    pub fn run_classified<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, Classified<E>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(result) => return Ok(result),
                Err(classified) => {
                    if !classified.retryable || attempt >= self.config.max_attempts {
                        return Err(classified.error);
                    }
                    std::thread::sleep(delay_for_attempt(&self.config, attempt));
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_delay(max_attempts: u32) -> BackoffConfig {
        BackoffConfig {
            kind: BackoffKind::Immediate,
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    #[test]
    fn exponential_delays_double_and_cap() {
        let config = BackoffConfig {
            kind: BackoffKind::Exponential,
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            jitter: 0.0,
        };

        assert_eq!(delay_for_attempt(&config, 1), Duration::from_secs(1));
        assert_eq!(delay_for_attempt(&config, 2), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(&config, 3), Duration::from_secs(4));
        assert_eq!(delay_for_attempt(&config, 4), Duration::from_secs(8));
        assert_eq!(delay_for_attempt(&config, 9), Duration::from_secs(8));
    }

    #[test]
    fn linear_delays_grow_with_attempt() {
        let config = BackoffConfig {
            kind: BackoffKind::Linear,
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: 0.0,
        };

        assert_eq!(delay_for_attempt(&config, 2), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(&config, 7), Duration::from_secs(5));
    }

    #[test]
    fn immediate_has_no_delay() {
        let config = no_delay(3);
        assert_eq!(delay_for_attempt(&config, 1), Duration::ZERO);
        assert_eq!(delay_for_attempt(&config, 5), Duration::ZERO);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = BackoffConfig {
            kind: BackoffKind::Constant,
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            jitter: 0.5,
        };

        for _ in 0..100 {
            let delay = delay_for_attempt(&config, 1);
            assert!(delay >= Duration::from_millis(5000));
            assert!(delay <= Duration::from_millis(15000));
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let retrier = Retrier::new(no_delay(5));
        let mut seen = 0;
        let result = retrier.run(|attempt| {
            seen = attempt;
            if attempt < 3 { Err("reset") } else { Ok("ok") }
        });
        assert_eq!(result, Ok("ok"));
        assert_eq!(seen, 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let retrier = Retrier::new(no_delay(3));
        let mut calls = 0;
        let result: Result<(), _> = retrier.run(|_| {
            calls += 1;
            Err("reset")
        });
        assert_eq!(result, Err("reset"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_errors_stop_immediately() {
        let retrier = Retrier::new(no_delay(5));
        let mut calls = 0;
        let result: Result<(), _> = retrier.run_classified(|_| {
            calls += 1;
            Err(Classified::permanent("401"))
        });
        assert_eq!(result, Err("401"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn config_deserializes_humantime_durations() {
        let config: BackoffConfig = serde_json::from_value(serde_json::json!({
            "kind": "exponential",
            "max_attempts": 5,
            "base_delay": "500ms",
            "max_delay": "30s",
        }))
        .unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn delay_never_exceeds_cap_without_jitter(
            attempt in 1u32..64,
            base_ms in 0u64..5_000,
            max_ms in 0u64..20_000,
        ) {
            let config = BackoffConfig {
                kind: BackoffKind::Exponential,
                max_attempts: 10,
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(max_ms),
                jitter: 0.0,
            };
            prop_assert!(delay_for_attempt(&config, attempt) <= config.max_delay);
        }

        #[test]
        fn delays_are_monotonic_for_exponential(attempt in 1u32..20) {
            let config = BackoffConfig {
                kind: BackoffKind::Exponential,
                max_attempts: 25,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_secs(3600),
                jitter: 0.0,
            };
            let a = delay_for_attempt(&config, attempt);
            let b = delay_for_attempt(&config, attempt + 1);
            prop_assert!(b >= a);
        }
    }
}
