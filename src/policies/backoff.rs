//! # Backoff delay calculation.
//!
//! The delay after failed attempt `n` (1-indexed) is
//! `base_delay × backoff_factor^(n−1) × jitter`, clamped to `max_delay`.
//! Because the base is derived purely from the attempt number, jitter output never
//! feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use opvisor::{FixedJitter, RetryPolicy};
//!
//! let policy = RetryPolicy {
//!     max_retries: 3,
//!     base_delay: Duration::from_millis(1_000),
//!     max_delay: Duration::from_millis(30_000),
//!     backoff_factor: 2.0,
//! };
//!
//! // After the first failure: 1000ms × 2^0
//! assert_eq!(policy.next_delay(1, &FixedJitter(1.0)), Duration::from_millis(1_000));
//!
//! // After the third failure with half jitter: 1000ms × 2^2 × 0.5
//! assert_eq!(policy.next_delay(3, &FixedJitter(0.5)), Duration::from_millis(2_000));
//!
//! // After the tenth failure: 512s → capped at 30s
//! assert_eq!(policy.next_delay(10, &FixedJitter(1.0)), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::RetryPolicy;
use crate::policies::jitter::{self, JitterSource};

impl RetryPolicy {
    /// Computes the delay to wait after failed attempt `attempt` (1-indexed).
    ///
    /// ### Notes
    /// - `attempt = 0` is treated as `1`.
    /// - The jitter sample is clamped to `[0.5, 1.0]`.
    /// - Overflowing or non-finite products clamp to [`RetryPolicy::max_delay`].
    pub fn next_delay(&self, attempt: u32, jitter: &dyn JitterSource) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let multiplier = jitter::clamp(jitter.sample());

        let max_secs = self.max_delay.as_secs_f64();
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exp) * multiplier;

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{FixedJitter, NoJitter, RandomJitter};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let policy = policy();
        assert_eq!(policy.next_delay(1, &NoJitter), Duration::from_millis(1_000));
        assert_eq!(policy.next_delay(2, &NoJitter), Duration::from_millis(2_000));
        assert_eq!(policy.next_delay(3, &NoJitter), Duration::from_millis(4_000));
        assert_eq!(policy.next_delay(4, &NoJitter), Duration::from_millis(8_000));
        assert_eq!(policy.next_delay(5, &NoJitter), Duration::from_millis(16_000));
        assert_eq!(policy.next_delay(6, &NoJitter), Duration::from_millis(30_000));
    }

    #[test]
    fn test_attempt_zero_behaves_like_first() {
        assert_eq!(
            policy().next_delay(0, &NoJitter),
            policy().next_delay(1, &NoJitter)
        );
    }

    #[test]
    fn test_jitter_lower_bound_is_half() {
        let policy = policy();
        assert_eq!(policy.next_delay(2, &FixedJitter(0.5)), Duration::from_millis(1_000));
        // Out-of-range samples are clamped, not trusted.
        assert_eq!(policy.next_delay(2, &FixedJitter(0.0)), Duration::from_millis(1_000));
        assert_eq!(policy.next_delay(2, &FixedJitter(3.0)), Duration::from_millis(2_000));
    }

    #[test]
    fn test_random_jitter_bounds() {
        let policy = policy();
        for attempt in 1..=8 {
            let base = 1_000.0 * 2f64.powi(attempt as i32 - 1);
            let lo = Duration::from_secs_f64((base * 0.5 / 1_000.0).min(30.0));
            let hi = Duration::from_secs_f64((base / 1_000.0).min(30.0));
            for _ in 0..100 {
                let delay = policy.next_delay(attempt, &RandomJitter);
                assert!(delay >= lo, "attempt {attempt}: {delay:?} < {lo:?}");
                assert!(delay <= hi, "attempt {attempt}: {delay:?} > {hi:?}");
            }
        }
    }

    #[test]
    fn test_fractional_factor() {
        let policy = RetryPolicy::fast();
        assert_eq!(policy.next_delay(1, &NoJitter), Duration::from_millis(500));
        assert_eq!(policy.next_delay(2, &NoJitter), Duration::from_millis(750));
        assert_eq!(policy.next_delay(3, &NoJitter), Duration::from_millis(1_125));
    }

    #[test]
    fn test_base_above_max_clamps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(5),
            ..policy()
        };
        assert_eq!(policy.next_delay(1, &NoJitter), Duration::from_secs(5));
    }

    #[test]
    fn test_non_finite_overflow_clamps_to_max() {
        assert_eq!(
            policy().next_delay(u32::MAX, &NoJitter),
            Duration::from_millis(30_000)
        );
    }
}
