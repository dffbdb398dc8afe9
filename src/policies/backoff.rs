//! # Spacing between unit start attempts.
//!
//! When the OS rejects a start request (background-start restrictions, a vendor
//! killer still tearing the previous unit down), the restarter retries a bounded
//! number of times. [`BackoffPolicy`] decides how long to wait before each retry:
//! `first × factor^attempt`, clamped to `max`, then jittered.
//!
//! The base delay depends only on the attempt number, so jitter never feeds
//! back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use keepvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(250));
//! assert_eq!(backoff.next(2), Duration::from_secs(1));
//! assert_eq!(backoff.next(9), Duration::from_secs(2));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay policy between unit start attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Short, doubling delays so a few immediate retries finish well inside
    /// one wake interval:
    /// - `first = 500ms`;
    /// - `factor = 2.0`;
    /// - `max = 5s`;
    /// - `jitter = Equal`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// A policy that never waits; used when retries should be back-to-back.
    pub const fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after the given (0-indexed) failed attempt.
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling(jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_doubles_until_capped() {
        let policy = doubling(JitterPolicy::None);
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_first_above_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            ..doubling(JitterPolicy::None)
        };
        assert_eq!(policy.next(0), Duration::from_secs(1));
    }

    #[test]
    fn test_equal_jitter_stays_in_upper_half() {
        let policy = doubling(JitterPolicy::Equal);
        for attempt in 0..8 {
            let base = doubling(JitterPolicy::None).next(attempt);
            let delay = policy.next(attempt);
            assert!(delay >= base / 2, "attempt {attempt}: {delay:?} < half of {base:?}");
            assert!(delay <= base, "attempt {attempt}: {delay:?} > {base:?}");
        }
    }

    #[test]
    fn test_immediate_never_waits() {
        let policy = BackoffPolicy::immediate();
        assert_eq!(policy.next(0), Duration::ZERO);
        assert_eq!(policy.next(7), Duration::ZERO);
    }
}
