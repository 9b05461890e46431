//! # Example: custom_observer
//!
//! Demonstrates how to build and attach a custom event observer.
//!
//! Shows how to:
//! - Implement the [`Observe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for per-call retry metrics.
//! - Register a closure observer next to it.
//! - Wire both into [`RetryExecutor::with_observers`].
//!
//! ## Flow
//! ```text
//! RetryExecutor::execute()
//!     ├─► emit(AttemptStarting)
//!     ├─► op()
//!     │     ├─► emit(AttemptFailed)
//!     │     └─► emit(RetryScheduled | NonRetryable | Exhausted)
//!     ├─► emit(Succeeded)
//!     └─► ObserverSet::emit() ──► ConsoleObserver.on_event()
//!                             └─► |level, message, event| { ... }
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_observer
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use opvisor::{
    Config, Event, EventKind, Failure, FixedJitter, LogLevel, Observe, ObserverSet, RetryExecutor,
    RetryPolicy,
};

/// A simple console observer that prints every event.
/// In real life, you could export metrics, ship logs, or drive a toast.
struct ConsoleObserver;

impl Observe for ConsoleObserver {
    fn on_event(&self, ev: &Event) {
        let op = ev.operation.as_deref().unwrap_or("<unknown>");
        match ev.kind {
            // === Attempts ===
            EventKind::AttemptStarting => {
                println!(
                    "[obs] starting:  op={op} attempt={}/{}",
                    ev.attempt.unwrap_or(0),
                    ev.max_attempts.unwrap_or(0)
                );
            }
            EventKind::AttemptFailed => {
                println!(
                    "[obs] failed:    op={op} attempt={} category={} error={}",
                    ev.attempt.unwrap_or(0),
                    ev.category.map(|c| c.code()).unwrap_or("<none>"),
                    ev.error.as_deref().unwrap_or("<none>")
                );
            }

            // === Retries ===
            EventKind::RetryScheduled => {
                let delay = ev.delay.map(|d| format!("{}ms", d.as_millis())).unwrap_or_default();
                println!(
                    "[obs] retry:     op={op} after_attempt={} delay={delay}",
                    ev.attempt.unwrap_or(0)
                );
            }
            EventKind::CallbackPanicked => {
                println!(
                    "[obs] callback panicked: op={op} reason={}",
                    ev.error.as_deref().unwrap_or("<none>")
                );
            }

            // === Terminal ===
            EventKind::Succeeded => {
                println!(
                    "[obs] succeeded: op={op} attempts={} elapsed={:?}",
                    ev.attempt.unwrap_or(0),
                    ev.elapsed.unwrap_or_default()
                );
            }
            EventKind::NonRetryable => {
                println!(
                    "[obs] gave up:   op={op} category={}",
                    ev.category.map(|c| c.info().title).unwrap_or("<none>")
                );
            }
            EventKind::Exhausted => {
                println!(
                    "[obs] exhausted: op={op} attempts={} error={}",
                    ev.attempt.unwrap_or(0),
                    ev.error.as_deref().unwrap_or("<none>")
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Operation failing `failures` times with `failure` before succeeding.
fn flaky(
    calls: &Arc<AtomicU32>,
    failures: u32,
    failure: Failure,
) -> impl FnMut() -> std::future::Ready<Result<u32, Failure>> {
    let calls = Arc::clone(calls);
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            std::future::ready(Err(failure.clone()))
        } else {
            std::future::ready(Ok(n + 1))
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("custom_observer demo\n");

    // 1. Observers: a typed one and a closure counting warnings
    let warnings = Arc::new(AtomicU32::new(0));
    let counter = {
        let warnings = Arc::clone(&warnings);
        move |level: LogLevel, _message: &str, _ev: &Event| {
            if level >= LogLevel::Warning {
                warnings.fetch_add(1, Ordering::Relaxed);
            }
        }
    };
    let observers = ObserverSet::new(vec![
        Arc::new(ConsoleObserver) as Arc<dyn Observe>,
        Arc::new(counter) as Arc<dyn Observe>,
    ]);

    // 2. Executor with fixed jitter so the printed delays are stable
    let exec = RetryExecutor::new(Config::default())
        .with_observers(observers)
        .with_jitter(FixedJitter(1.0));
    let policy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(1),
        backoff_factor: 2.0,
    };

    // 3. Timeouts twice, then success
    let calls = Arc::new(AtomicU32::new(0));
    let timeout = Failure::exception("TimeoutError", "Request timeout after 30s");
    let attempts = exec
        .execute("select from tarefas", flaky(&calls, 2, timeout), policy)
        .await?;
    println!("[main] select finished on attempt {attempts}\n");

    // 4. Permission error: stops after one attempt
    let calls = Arc::new(AtomicU32::new(0));
    let denied = Failure::backend("42501", "permission denied for table tarefas");
    let res = exec
        .execute("update tarefas", flaky(&calls, u32::MAX, denied), policy)
        .await;
    println!("[main] update returned {:?}\n", res.map_err(|f| f.as_label()));

    // 5. Network down for good: runs out of attempts
    let calls = Arc::new(AtomicU32::new(0));
    let offline = Failure::exception("TypeError", "Failed to fetch");
    let res = exec
        .execute("rpc get_streak", flaky(&calls, u32::MAX, offline), policy)
        .await;
    println!("[main] rpc returned {:?}", res.map_err(|f| f.as_label()));

    println!("\nfinished, {} warning events", warnings.load(Ordering::Relaxed));
    Ok(())
}
