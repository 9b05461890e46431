//! # Run a single attempt of an operation.
//!
//! Awaits one invocation of the caller's operation and turns a failure into an
//! [`AttemptRecord`], classified once so every later decision of the retry loop
//! reads the same category.
//!
//! ## Flow
//! ```text
//! Success:
//!   op() → Ok(value) → Ok(value)
//!
//! Failure:
//!   op() → Err(failure) → classify(failure) → Err(AttemptRecord{attempt, failure, category})
//! ```

use std::future::Future;
use std::time::Duration;

use crate::classify::{self, ErrorCategory};
use crate::error::Failure;

/// One failed attempt.
///
/// Lives for the duration of one loop iteration: emitted to observers, then
/// either dropped (retry) or unpacked into the returned failure (terminal).
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// Attempt number (starting from 1).
    pub attempt: u32,
    /// Failure returned by the operation, untouched.
    pub failure: Failure,
    /// Classification of `failure`.
    pub category: ErrorCategory,
    /// Delay chosen before the next attempt (`None` when the loop stops here).
    pub delay_before_next: Option<Duration>,
}

impl AttemptRecord {
    /// Classifies `failure` and records it for `attempt`.
    pub fn new(attempt: u32, failure: Failure) -> Self {
        let category = classify::classify(&failure);
        Self {
            attempt,
            failure,
            category,
            delay_before_next: None,
        }
    }
}

/// Awaits one attempt.
///
/// ### Rules
/// - The future is awaited exactly once; no timeout is applied here.
/// - The failure is never wrapped, only paired with its category.
pub async fn run_once<T, Fut>(attempt: u32, fut: Fut) -> Result<T, AttemptRecord>
where
    Fut: Future<Output = Result<T, Failure>>,
{
    fut.await.map_err(|failure| AttemptRecord::new(attempt, failure))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_is_classified_once() {
        let res: Result<(), _> =
            run_once(2, async { Err(Failure::backend("57014", "statement timeout")) }).await;
        let record = res.unwrap_err();
        assert_eq!(record.attempt, 2);
        assert_eq!(record.category, ErrorCategory::StorageSlow);
        assert_eq!(record.failure, Failure::backend("57014", "statement timeout"));
        assert_eq!(record.delay_before_next, None);
    }

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let res = run_once(1, async { Ok::<_, Failure>(7) }).await;
        assert_eq!(res, Ok(7));
    }
}
