//! # Example: retry_with_backoff
//!
//! Demonstrates how [`RetryClient`] retries a failing insert according to a
//! [`RetryPolicy`], and how a non-retryable failure stops immediately.
//!
//! The backend drops the first two calls, showing how backoff delay and jitter
//! are applied between retries.
//!
//! ## Flow
//! ```text
//! RetryExecutor::execute("insert into tarefas")
//!   ├─► emit(AttemptStarting, attempt=1)
//!   ├─► op() → Err(TypeError: Failed to fetch)       → NET_001, retryable
//!   ├─► emit(AttemptFailed), emit(RetryScheduled{delay≈250..500ms})
//!   ├─► sleep(delay)
//!   ├─► retry → attempt=2
//!   │     ├─► op() → Envelope{error: 08006}           → NET_001, retryable
//!   │     ├─► emit(RetryScheduled{delay≈375..750ms})
//!   │     └─► sleep(delay)
//!   ├─► retry → attempt=3 → Ok(rows)
//!   └─► emit(Succeeded)
//!
//! RetryExecutor::execute("insert into tarefas")        (same id again)
//!   ├─► op() → Envelope{error: 23505}                 → DB_003, not retryable
//!   └─► emit(NonRetryable), return the original failure
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=opvisor=debug cargo run --example retry_with_backoff
//! ```

use std::sync::Arc;
use std::time::Duration;

use opvisor::{
    BackendError, Config, Failure, MemoryClient, RetryClient, RetryExecutor, RetryPolicy,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Route executor events to stdout (TracingLogger is registered by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("opvisor=debug")),
        )
        .init();

    // 2. A backend that fails twice: once thrown, once by value
    let backend = Arc::new(MemoryClient::new().with_table("tarefas", Vec::new()));
    backend.fail_next(Failure::exception("TypeError", "Failed to fetch"));
    backend.reject_next(BackendError::new("08006", "connection failure"));

    // 3. Executor tagged for the tasks screen
    let mut cfg = Config::default();
    cfg.component = "TASKS".into();
    let client = RetryClient::new(Arc::clone(&backend), RetryExecutor::new(cfg));

    // 4. A shorter policy than `standard` so the demo stays quick
    let policy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(5),
        backoff_factor: 1.5,
    };

    let task = json!({"id": 1, "titulo": "Revisar derivadas", "prioridade": "alta"});
    let rows = client.insert("tarefas", &task, Some(policy)).await?;
    println!("[main] inserted {rows} after {} calls", backend.calls());

    // 5. Same row again: duplicate key is not worth retrying
    match client.insert("tarefas", &task, Some(policy)).await {
        Ok(_) => println!("[main] unexpected success"),
        Err(failure) => {
            let info = failure.category().info();
            println!("[main] {} ({}): {}", info.title, info.code, failure.as_message());
        }
    }

    println!("[main] done after {} calls.", backend.calls());
    Ok(())
}
