//! # ObserverSet: fan-out over multiple observers
//!
//! [`ObserverSet`] hands each [`Event`] to every registered observer, in
//! registration order.
//!
//! ## What it guarantees
//! - `emit(&Event)` never panics and never fails.
//! - Panics inside observers are caught and reported via `tracing` (isolation).
//! - Per-call FIFO: events of one `execute` call arrive in emission order.
//!
//! ## What it does **not** guarantee
//! - No ordering across concurrent `execute` calls.
//! - No buffering: a slow observer slows the call that emits to it.
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        ├──► catch_unwind(O1.on_event)
//!        ├──► catch_unwind(O2.on_event)
//!        └──► catch_unwind(ON.on_event)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::events::Event;

use super::Observe;

/// Ordered, shareable collection of observers.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn Observe>>,
}

impl ObserverSet {
    /// Creates a set from the given observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>) -> Self {
        Self { observers }
    }

    /// Appends an observer.
    pub fn push(&mut self, observer: Arc<dyn Observe>) {
        self.observers.push(observer);
    }

    /// Delivers one event to all observers.
    ///
    /// A panicking observer is skipped for this event; the others still run.
    pub fn emit(&self, event: &Event) {
        for observer in &self.observers {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(event)));
            if let Err(panic_err) = delivered {
                tracing::warn!(
                    observer = observer.name(),
                    event = event.kind.as_label(),
                    panic = %panic_message(panic_err.as_ref()),
                    "observer panicked"
                );
            }
        }
    }

    /// True if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.observers.iter().map(|o| o.name()))
            .finish()
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::events::{EventKind, LogLevel};

    struct Offline;

    impl Observe for Offline {
        fn on_event(&self, _event: &Event) {
            panic!("sink offline");
        }
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let set = ObserverSet::new(vec![
            Arc::new(Offline) as Arc<dyn Observe>,
            Arc::new(move |level: LogLevel, message: &str, _: &Event| {
                sink.lock().unwrap().push((level, message.to_string()));
            }) as Arc<dyn Observe>,
        ]);

        set.emit(
            &Event::now(EventKind::AttemptFailed)
                .with_operation("delete from tarefas")
                .with_attempt(1, 4),
        );

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(
                LogLevel::Warning,
                "attempt 1 failed for delete from tarefas".to_string()
            )]
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
