//! # Events emitted by the retry executor.
//!
//! The [`EventKind`] enum classifies what happened during one `execute` call:
//! - **Attempt events**: an attempt starts or fails
//! - **Retry events**: a retry is scheduled, or the on-retry callback panicked
//! - **Terminal events**: the call succeeded, hit a non-retryable failure, or ran out of attempts
//!
//! The [`Event`] struct carries additional metadata such as the operation name,
//! attempt number, chosen delay, failure category and elapsed time.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Events of one `execute` call are emitted in order on the caller's task.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use opvisor::{ErrorCategory, Event, EventKind, LogLevel};
//!
//! let ev = Event::now(EventKind::RetryScheduled)
//!     .with_operation("insert into tarefas")
//!     .with_attempt(1, 4)
//!     .with_category(ErrorCategory::NetworkUnreachable)
//!     .with_delay(Duration::from_millis(750));
//!
//! assert_eq!(ev.level(), LogLevel::Debug);
//! assert_eq!(ev.message(), "waiting 750ms before retrying insert into tarefas");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde_json::{Map, Value, json};

use crate::classify::ErrorCategory;
use crate::events::LogLevel;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of executor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An attempt is about to invoke the operation.
    ///
    /// Sets: `operation`, `attempt`, `max_attempts`.
    AttemptStarting,

    /// An attempt failed.
    ///
    /// Sets: `operation`, `attempt`, `max_attempts`, `category`, `error`.
    AttemptFailed,

    /// Next attempt scheduled after a retryable failure.
    ///
    /// Sets: `operation`, `attempt` (failed attempt), `category`, `delay`, `error`.
    RetryScheduled,

    /// The on-retry callback panicked; the retry proceeds anyway.
    ///
    /// Sets: `operation`, `attempt`, `error` (panic message).
    CallbackPanicked,

    /// The operation returned a value.
    ///
    /// Sets: `operation`, `attempt` (successful attempt), `elapsed`.
    Succeeded,

    /// The failure is not retryable; the call stops with the remaining budget unused.
    ///
    /// Sets: `operation`, `attempt`, `category`, `error`, `elapsed`.
    NonRetryable,

    /// Every allowed attempt failed; the last failure is returned.
    ///
    /// Sets: `operation`, `attempt`, `category`, `error`, `elapsed`.
    Exhausted,
}

impl EventKind {
    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::AttemptStarting => "attempt_starting",
            EventKind::AttemptFailed => "attempt_failed",
            EventKind::RetryScheduled => "retry_scheduled",
            EventKind::CallbackPanicked => "callback_panicked",
            EventKind::Succeeded => "succeeded",
            EventKind::NonRetryable => "non_retryable",
            EventKind::Exhausted => "exhausted",
        }
    }
}

/// Executor event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the operation (`insert into tarefas`, `rpc get_streak`, ...).
    pub operation: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Attempts allowed by the policy (`max_retries + 1`).
    pub max_attempts: Option<u32>,
    /// Backoff delay before the next attempt.
    pub delay: Option<Duration>,
    /// Category of the failure that triggered this event.
    pub category: Option<ErrorCategory>,
    /// Failure message.
    pub error: Option<Arc<str>>,
    /// Time since the call started.
    pub elapsed: Option<Duration>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            operation: None,
            attempt: None,
            max_attempts: None,
            delay: None,
            category: None,
            error: None,
            elapsed: None,
        }
    }

    /// Attaches the operation name.
    #[inline]
    pub fn with_operation(mut self, operation: impl Into<Arc<str>>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attaches the attempt number and the attempt budget.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32, max_attempts: u32) -> Self {
        self.attempt = Some(attempt);
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Attaches a backoff delay.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attaches the failure category.
    #[inline]
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Attaches a failure message.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches the elapsed time of the call.
    #[inline]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Severity of this event.
    ///
    /// A success is `Info` when it needed retries and `Debug` otherwise.
    pub fn level(&self) -> LogLevel {
        match self.kind {
            EventKind::AttemptStarting | EventKind::RetryScheduled => LogLevel::Debug,
            EventKind::AttemptFailed | EventKind::CallbackPanicked => LogLevel::Warning,
            EventKind::Succeeded if self.attempt.unwrap_or(1) > 1 => LogLevel::Info,
            EventKind::Succeeded => LogLevel::Debug,
            EventKind::NonRetryable => LogLevel::Info,
            EventKind::Exhausted => LogLevel::Error,
        }
    }

    /// Human-readable one-line message.
    pub fn message(&self) -> String {
        let op = self.operation.as_deref().unwrap_or("operation");
        let attempt = self.attempt.unwrap_or(0);
        match self.kind {
            EventKind::AttemptStarting => format!(
                "attempt {attempt}/{} for {op}",
                self.max_attempts.unwrap_or(attempt)
            ),
            EventKind::AttemptFailed => format!("attempt {attempt} failed for {op}"),
            EventKind::RetryScheduled => format!(
                "waiting {}ms before retrying {op}",
                self.delay.unwrap_or_default().as_millis()
            ),
            EventKind::CallbackPanicked => {
                format!("on-retry callback panicked after attempt {attempt} of {op}")
            }
            EventKind::Succeeded if attempt > 1 => {
                format!("{op} succeeded after {} retries", attempt - 1)
            }
            EventKind::Succeeded => format!("{op} succeeded"),
            EventKind::NonRetryable => format!(
                "{} is not retryable, giving up on {op}",
                self.category.map(|c| c.code()).unwrap_or("UNKNOWN_ERROR")
            ),
            EventKind::Exhausted => format!("all {attempt} attempts failed for {op}"),
        }
    }

    /// Structured fields as a JSON object (only the fields that are set).
    pub fn data(&self) -> Value {
        let mut map = Map::new();
        map.insert("event".into(), json!(self.kind.as_label()));
        map.insert("seq".into(), json!(self.seq));
        if let Some(op) = &self.operation {
            map.insert("operation".into(), json!(op.as_ref()));
        }
        if let Some(attempt) = self.attempt {
            map.insert("attempt".into(), json!(attempt));
        }
        if let Some(max) = self.max_attempts {
            map.insert("max_attempts".into(), json!(max));
        }
        if let Some(delay) = self.delay {
            map.insert("delay_ms".into(), json!(delay.as_millis() as u64));
        }
        if let Some(category) = self.category {
            map.insert("category".into(), json!(category.code()));
        }
        if let Some(error) = &self.error {
            map.insert("error".into(), json!(error.as_ref()));
        }
        if let Some(elapsed) = self.elapsed {
            map.insert("elapsed_ms".into(), json!(elapsed.as_millis() as u64));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::now(EventKind::AttemptStarting);
        let b = Event::now(EventKind::AttemptStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_success_level_depends_on_attempt() {
        let first = Event::now(EventKind::Succeeded).with_attempt(1, 4);
        let later = Event::now(EventKind::Succeeded).with_attempt(3, 4);
        assert_eq!(first.level(), LogLevel::Debug);
        assert_eq!(later.level(), LogLevel::Info);
        assert_eq!(
            later.with_operation("select from topicos").message(),
            "select from topicos succeeded after 2 retries"
        );
    }

    #[test]
    fn test_data_only_contains_set_fields() {
        let ev = Event::now(EventKind::Exhausted)
            .with_operation("rpc get_streak")
            .with_attempt(4, 4)
            .with_category(ErrorCategory::NetworkSlow)
            .with_elapsed(Duration::from_millis(7_250));
        let data = ev.data();
        assert_eq!(data["event"], "exhausted");
        assert_eq!(data["category"], "NET_002");
        assert_eq!(data["elapsed_ms"], 7_250);
        assert!(data.get("delay_ms").is_none());
        assert_eq!(ev.level(), LogLevel::Error);
    }
}
