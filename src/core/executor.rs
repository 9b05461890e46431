//! # RetryExecutor: retry loop for one remote operation.
//!
//! Invokes a caller-supplied async operation until it succeeds, fails with a
//! non-retryable category, or runs out of attempts:
//! - attempts per [`RetryPolicy::max_attempts`],
//! - delays per [`RetryPolicy::next_delay`] with an injectable [`JitterSource`],
//! - classification per [`classify`](crate::classify::classify),
//! - events to an [`ObserverSet`].
//!
//! ## Event flow
//! For each attempt, the executor emits:
//! ```text
//! AttemptStarting → [operation] → Succeeded          (Ok)
//!                               → AttemptFailed      (Err)
//!
//! After AttemptFailed:
//!   → Exhausted                                    (no attempts left)
//!   → NonRetryable                                 (category not retryable)
//!   → [on_retry] → RetryScheduled → [sleep] → next attempt
//!                  (CallbackPanicked if on_retry panics)
//! ```
//!
//! ## Architecture
//! ```text
//! execute(name, op, policy)
//!
//! loop {
//!   ├─► attempt += 1
//!   ├─► emit AttemptStarting
//!   ├─► run_once(op()) ──► Ok(value) ──► emit Succeeded, return Ok(value)
//!   │        │
//!   │        └─► Err(record) ──► emit AttemptFailed
//!   └─► decide(attempt, category, policy)
//!         ├─► Exhausted    → emit Exhausted,    return Err(original failure)
//!         ├─► NonRetryable → emit NonRetryable, return Err(original failure)
//!         └─► Retry(delay) → on_retry(attempt, &failure)
//!                            emit RetryScheduled
//!                            sleep(delay)
//! }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**; no task is spawned.
//! - The returned failure is always the one the operation produced, never wrapped.
//! - Observer and callback panics are caught; they never change the outcome.
//! - Dropping the returned future abandons the call, including a pending sleep.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::classify::ErrorCategory;
use crate::config::Config;
use crate::core::attempt::{AttemptRecord, run_once};
use crate::error::Failure;
use crate::events::{Event, EventKind};
use crate::observers::{Observe, ObserverSet, panic_message};
use crate::policies::{JitterSource, NoJitter, PolicyPreset, RandomJitter, RetryPolicy};

/// Callback invoked before each retry with the failed attempt number and its failure.
pub type RetryCallback = dyn Fn(u32, &Failure) + Send + Sync;

/// Outcome of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Wait, then run the next attempt.
    Retry(Duration),
    /// The category is not retryable.
    NonRetryable,
    /// The attempt was the last one allowed.
    Exhausted,
}

/// Decides what follows failed attempt `attempt`.
///
/// Exhaustion is checked before retryability, so a non-retryable failure on the
/// last attempt reports [`Decision::Exhausted`].
pub(crate) fn decide(
    attempt: u32,
    category: ErrorCategory,
    policy: &RetryPolicy,
    jitter: &dyn JitterSource,
) -> Decision {
    if attempt >= policy.max_attempts() {
        Decision::Exhausted
    } else if !category.is_retryable() {
        Decision::NonRetryable
    } else {
        Decision::Retry(policy.next_delay(attempt, jitter))
    }
}

/// Retry-with-backoff executor.
///
/// Cheap to clone; clones share observers, jitter source and callback.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use opvisor::{Config, Failure, FixedJitter, RetryExecutor, RetryPolicy};
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let exec = RetryExecutor::new(Config::default()).with_jitter(FixedJitter(1.0));
/// let calls = Arc::new(AtomicU32::new(0));
///
/// let res = exec
///     .execute(
///         "select from topicos",
///         || {
///             let calls = Arc::clone(&calls);
///             async move {
///                 if calls.fetch_add(1, Ordering::SeqCst) == 0 {
///                     Err(Failure::message("Network request failed"))
///                 } else {
///                     Ok(vec!["algebra", "biology"])
///                 }
///             }
///         },
///         RetryPolicy::standard(),
///     )
///     .await;
///
/// assert_eq!(res.unwrap().len(), 2);
/// assert_eq!(calls.load(Ordering::SeqCst), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct RetryExecutor {
    cfg: Arc<Config>,
    observers: ObserverSet,
    jitter: Arc<dyn JitterSource>,
    on_retry: Option<Arc<RetryCallback>>,
}

impl RetryExecutor {
    /// Creates an executor from `cfg`.
    ///
    /// With the `tracing-logger` feature a [`TracingLogger`](crate::TracingLogger)
    /// tagged with `cfg.component` is registered. Delays use [`RandomJitter`]
    /// unless `cfg.jitter` is false.
    pub fn new(cfg: Config) -> Self {
        let jitter: Arc<dyn JitterSource> = if cfg.jitter {
            Arc::new(RandomJitter)
        } else {
            Arc::new(NoJitter)
        };

        #[cfg(feature = "tracing-logger")]
        let observers = ObserverSet::new(vec![
            Arc::new(crate::observers::TracingLogger::new(cfg.component.clone())) as Arc<dyn Observe>,
        ]);
        #[cfg(not(feature = "tracing-logger"))]
        let observers = ObserverSet::default();

        Self {
            cfg: Arc::new(cfg),
            observers,
            jitter,
            on_retry: None,
        }
    }

    /// Replaces the observers.
    pub fn with_observers(mut self, observers: ObserverSet) -> Self {
        self.observers = observers;
        self
    }

    /// Adds one observer.
    pub fn with_observer(mut self, observer: impl Observe) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Replaces the jitter source.
    pub fn with_jitter(mut self, jitter: impl JitterSource) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    /// Sets the callback run before every retry of every call.
    ///
    /// A callback passed to [`execute_with`](Self::execute_with) takes precedence.
    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &Failure) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Configuration this executor was built from.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Registered observers.
    pub fn observers(&self) -> &ObserverSet {
        &self.observers
    }

    /// Runs `op` under `policy`.
    ///
    /// Returns the first success, or the failure of the attempt that ended the loop.
    pub async fn execute<T, F, Fut>(&self, name: &str, op: F, policy: RetryPolicy) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        self.execute_with(name, op, policy, None).await
    }

    /// Runs `op` under the configured policy of `preset`.
    pub async fn execute_preset<T, F, Fut>(
        &self,
        name: &str,
        op: F,
        preset: PolicyPreset,
    ) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        self.execute_with(name, op, self.cfg.policy(preset), None).await
    }

    /// Runs `op` under `policy`, calling `on_retry` before every retry.
    ///
    /// `None` falls back to the executor-wide callback, if any.
    pub async fn execute_with<T, F, Fut>(
        &self,
        name: &str,
        mut op: F,
        policy: RetryPolicy,
        on_retry: Option<&RetryCallback>,
    ) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let operation: Arc<str> = Arc::from(name);
        let max_attempts = policy.max_attempts();
        let callback = on_retry.or(self.on_retry.as_deref());
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.observers.emit(
                &Event::now(EventKind::AttemptStarting)
                    .with_operation(Arc::clone(&operation))
                    .with_attempt(attempt, max_attempts),
            );

            let mut record = match run_once(attempt, op()).await {
                Ok(value) => {
                    self.observers.emit(
                        &Event::now(EventKind::Succeeded)
                            .with_operation(Arc::clone(&operation))
                            .with_attempt(attempt, max_attempts)
                            .with_elapsed(started.elapsed()),
                    );
                    return Ok(value);
                }
                Err(record) => record,
            };
            self.observers
                .emit(&failure_event(EventKind::AttemptFailed, &operation, &record, max_attempts));

            match decide(attempt, record.category, &policy, self.jitter.as_ref()) {
                Decision::Exhausted => {
                    self.observers.emit(
                        &failure_event(EventKind::Exhausted, &operation, &record, max_attempts)
                            .with_elapsed(started.elapsed()),
                    );
                    return Err(record.failure);
                }
                Decision::NonRetryable => {
                    self.observers.emit(
                        &failure_event(EventKind::NonRetryable, &operation, &record, max_attempts)
                            .with_elapsed(started.elapsed()),
                    );
                    return Err(record.failure);
                }
                Decision::Retry(delay) => {
                    record.delay_before_next = Some(delay);
                    if let Some(callback) = callback {
                        self.run_callback(callback, &operation, &record, max_attempts);
                    }
                    self.observers.emit(
                        &failure_event(EventKind::RetryScheduled, &operation, &record, max_attempts)
                            .with_delay(delay),
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }

    fn run_callback(
        &self,
        callback: &RetryCallback,
        operation: &Arc<str>,
        record: &AttemptRecord,
        max_attempts: u32,
    ) {
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            callback(record.attempt, &record.failure)
        }));
        if let Err(payload) = res {
            self.observers.emit(
                &Event::now(EventKind::CallbackPanicked)
                    .with_operation(Arc::clone(operation))
                    .with_attempt(record.attempt, max_attempts)
                    .with_error(panic_message(payload.as_ref())),
            );
        }
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("cfg", &self.cfg)
            .field("observers", &self.observers)
            .field("jitter", &self.jitter)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

fn failure_event(
    kind: EventKind,
    operation: &Arc<str>,
    record: &AttemptRecord,
    max_attempts: u32,
) -> Event {
    Event::now(kind)
        .with_operation(Arc::clone(operation))
        .with_attempt(record.attempt, max_attempts)
        .with_category(record.category)
        .with_error(record.failure.as_message())
}
