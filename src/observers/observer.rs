//! # Observer: user-facing event handlers
//!
//! The [`Observe`] trait is the main **extension point** for logging and telemetry.
//! Every [`Event`] the executor emits is handed to each registered observer.
//!
//! Implementing your own observer allows you to plug in:
//! - structured logging;
//! - metrics export;
//! - UI feedback (toasts, progress indicators).
//!
//! # High-level architecture:
//! ```text
//! Event flow:
//!   RetryExecutor ── emit(Event) ──► ObserverSet ──► Observe::on_event(&Event)
//!                                        │
//!              ┌─────────────────────────┼───────────────────────┐
//!              ▼                         ▼                       ▼
//!         TracingLogger             JournalWriter         CustomObserver
//!          (tracing)              (JSON lines file)        (user logic)
//! ```
//!
//! Any closure `Fn(LogLevel, &str, &Event)` is an observer as well, receiving the
//! event's level, message and the event itself as structured data.
//!
//! # Example: custom observer
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use opvisor::{Event, EventKind, Observe};
//!
//! #[derive(Default)]
//! struct RetryCounter(AtomicU32);
//!
//! impl Observe for RetryCounter {
//!     fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::RetryScheduled {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! let counter = RetryCounter::default();
//! counter.on_event(&Event::now(EventKind::RetryScheduled));
//! assert_eq!(counter.0.load(Ordering::Relaxed), 1);
//! ```

use crate::events::{Event, LogLevel};

/// Contract for event observers.
///
/// Called synchronously on the task running `execute`. Implementations should
/// return quickly; panics are caught by the [`ObserverSet`](crate::ObserverSet)
/// and never reach the retry loop.
pub trait Observe: Send + Sync + 'static {
    /// Handle a single event.
    fn on_event(&self, event: &Event);

    /// Human-readable name (for diagnostics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F> Observe for F
where
    F: Fn(LogLevel, &str, &Event) + Send + Sync + 'static,
{
    fn on_event(&self, event: &Event) {
        self(event.level(), &event.message(), event);
    }
}
