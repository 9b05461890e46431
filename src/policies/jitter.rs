//! # Jitter sources for retry delays.
//!
//! A [`JitterSource`] yields the multiplier applied to each backoff delay. The
//! executor clamps every sample to `[0.5, 1.0]`, so a delay never drops below half
//! of its exponential base and never exceeds it.
//!
//! - [`RandomJitter`]: uniform in `[0.5, 1.0]`, spreads concurrent retries apart
//! - [`FixedJitter`]: constant multiplier, for tests and reproducible runs
//! - [`NoJitter`]: always `1.0`

use std::fmt;

use rand::Rng;

/// Lowest multiplier a jitter sample is clamped to.
pub const JITTER_MIN: f64 = 0.5;
/// Highest multiplier a jitter sample is clamped to.
pub const JITTER_MAX: f64 = 1.0;

/// Source of delay multipliers.
///
/// Implementations must be cheap and thread-safe: one executor may serve many
/// concurrent calls.
pub trait JitterSource: Send + Sync + 'static {
    /// Next multiplier; expected in `[0.5, 1.0]`.
    fn sample(&self) -> f64;
}

/// Uniform jitter in `[0.5, 1.0]` from the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::rng().random_range(JITTER_MIN..=JITTER_MAX)
    }
}

/// Constant multiplier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// No randomization: delays follow the exponential curve exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self) -> f64 {
        JITTER_MAX
    }
}

impl<F> JitterSource for F
where
    F: Fn() -> f64 + Send + Sync + 'static,
{
    fn sample(&self) -> f64 {
        self()
    }
}

impl fmt::Debug for dyn JitterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JitterSource")
    }
}

/// Clamps a sample to `[0.5, 1.0]`; NaN becomes `1.0`.
#[inline]
pub(crate) fn clamp(sample: f64) -> f64 {
    if sample.is_nan() {
        JITTER_MAX
    } else {
        sample.clamp(JITTER_MIN, JITTER_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_jitter_stays_in_range() {
        let jitter = RandomJitter;
        for _ in 0..1_000 {
            let s = jitter.sample();
            assert!((JITTER_MIN..=JITTER_MAX).contains(&s), "sample {s}");
        }
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(0.1), 0.5);
        assert_eq!(clamp(1.7), 1.0);
        assert_eq!(clamp(0.75), 0.75);
        assert_eq!(clamp(f64::NAN), 1.0);
    }

    #[test]
    fn test_closures_are_sources() {
        let jitter = || 0.6;
        assert_eq!(jitter.sample(), 0.6);
    }
}
