//! # opvisor
//!
//! **Opvisor** is a small reliability layer for applications talking to a hosted
//! relational backend (auth, row-level security, relational storage).
//!
//! It wraps remote CRUD calls in a retry loop with jittered exponential backoff,
//! classifies every failure into a fixed set of semantic categories, and decides
//! from the category whether a retry is worthwhile. Around that core it offers
//! backend health checks, debounced draft auto-save and form validation.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ insert/update│   │    select    │   │  delete/rpc  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RetryClient<C: DataClient> (facade)                              │
//! │  - resolves the policy (explicit or the configured default preset)│
//! │  - turns Envelope{error} into Failure::Backend inside the closure │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RetryExecutor (retry loop)                                       │
//! │  - run_once(op()) ──► AttemptRecord{attempt, failure, category}   │
//! │  - classify(&Failure) ──► ErrorCategory ──► retryable?            │
//! │  - RetryPolicy::next_delay(attempt, &dyn JitterSource)            │
//! │  - on_retry callback, tokio::time::sleep                          │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ Events:                                          │
//!        │ - AttemptStarting / AttemptFailed                │
//!        │ - RetryScheduled / CallbackPanicked              │
//!        │ - Succeeded / NonRetryable / Exhausted           │
//!        ▼                                                  ▼
//! ┌──────────────────────────────┐            ┌───────────────────────┐
//! │ ObserverSet (catch_unwind)   │            │ DataClient (injected) │
//! └───┬──────────────┬───────────┘            └───────────────────────┘
//!     ▼              ▼
//! TracingLogger  JournalWriter  (custom Observe / closures)
//! ```
//!
//! ### Lifecycle of one call
//! ```text
//! execute(name, op, policy)
//!
//! loop {
//!   ├─► attempt += 1, emit AttemptStarting
//!   ├─► op().await
//!   │       ├─ Ok  ──► emit Succeeded, return value
//!   │       └─ Err ──► classify, emit AttemptFailed
//!   │                  ├─ attempt == max_retries + 1 ─► Exhausted, return failure
//!   │                  ├─ category not retryable     ─► NonRetryable, return failure
//!   │                  └─ otherwise:
//!   │                       ├─ delay = min(base × factor^(attempt−1) × jitter, max)
//!   │                       ├─ on_retry(attempt, &failure)
//!   │                       ├─ emit RetryScheduled{ delay }
//!   │                       └─ sleep(delay)
//! }
//! ```
//!
//! ## Features
//! | Area               | Description                                                  | Key types / traits                          |
//! |--------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Executor**       | Retry loop with backoff and classification.                  | [`RetryExecutor`], [`AttemptRecord`]        |
//! | **Policies**       | Named presets and jitter sources.                            | [`RetryPolicy`], [`PolicyPreset`], [`JitterSource`] |
//! | **Classification** | Failure categories with retryability and presentation data.  | [`ErrorCategory`], [`classify`]             |
//! | **Facade**         | Retrying CRUD over an injected client.                       | [`RetryClient`], [`DataClient`], [`Filters`] |
//! | **Observers**      | Structured events for logs and telemetry.                    | [`Observe`], [`Event`], [`ObserverSet`]     |
//! | **Health**         | Backend probes and periodic monitoring.                      | [`check_system_health`], [`HealthMonitor`]  |
//! | **Auto-save**      | Debounced form drafts with expiry.                           | [`AutoSaver`], [`DraftStore`]               |
//! | **Validation**     | Task and study-session form rules.                           | [`validate_task`], [`validate_study_session`] |
//! | **Configuration**  | Default preset, preset tuning, jitter toggle.                | [`Config`]                                  |
//!
//! ## Optional features
//! - `tracing-logger` _(default)_: exports [`TracingLogger`] and registers it on new executors.
//! - `journal`: exports [`JournalWriter`], a JSON-lines file observer.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use opvisor::{Config, Failure, Filters, MemoryClient, RetryClient, RetryExecutor, RetryPolicy};
//!
//! #[tokio::main(flavor = "current_thread", start_paused = true)]
//! async fn main() -> Result<(), Failure> {
//!     let backend = Arc::new(
//!         MemoryClient::new().with_table("tarefas", vec![json!({"id": 1, "titulo": "Lista 3"})]),
//!     );
//!     let client = RetryClient::new(Arc::clone(&backend), RetryExecutor::new(Config::default()));
//!
//!     // The first call drops on the floor; the retry succeeds.
//!     backend.fail_next(Failure::exception("TypeError", "Failed to fetch"));
//!     let rows = client
//!         .select("tarefas", "titulo", &Filters::new().eq("id", json!(1)), None)
//!         .await?;
//!     assert_eq!(rows, json!([{"titulo": "Lista 3"}]));
//!
//!     // Non-retryable failures come back unchanged after one attempt.
//!     let dup = client
//!         .insert("tarefas", &json!({"id": 1}), Some(RetryPolicy::critical()))
//!         .await;
//!     assert!(matches!(dup, Err(Failure::Backend { ref code, .. }) if code == "23505"));
//!     Ok(())
//! }
//! ```
mod autosave;
mod classify;
mod client;
mod config;
mod core;
mod error;
mod events;
mod health;
mod observers;
mod policies;
mod validate;

// ---- Public re-exports ----

pub use autosave::{
    AutoSaveOptions, AutoSaver, DEFAULT_DEBOUNCE, DEFAULT_MAX_AGE, DRAFT_VERSION, DraftEnvelope,
    DraftInfo, DraftStats, DraftStore, ExitMode, FileDraftStore, MemoryDraftStore, STORAGE_PREFIX,
};
pub use classify::{
    Action, ActionKind, CategoryInfo, ErrorCategory, Variant, classify, classify_code, is_retryable,
};
pub use client::{
    BackendError, DataClient, Envelope, Filter, FilterOp, Filters, MemoryClient, RetryClient,
    RpcHandler,
};
pub use config::Config;
pub use core::{AttemptRecord, RetryCallback, RetryExecutor};
pub use error::{ConfigError, DraftError, Failure};
pub use events::{Event, EventKind, LogLevel};
pub use health::{
    HealthCheckResult, HealthMonitor, HealthStatus, ListenerId, SystemHealth, check_system_health,
};
pub use observers::{Observe, ObserverSet};
pub use policies::{
    FixedJitter, JITTER_MAX, JITTER_MIN, JitterSource, NoJitter, PolicyPreset, RandomJitter,
    RetryPolicy,
};
pub use validate::{
    Rule, StudySessionDraft, TASK_CATEGORIES, TASK_PRIORITIES, TaskDraft, ValidStudySession,
    ValidTask, ValidationError, ValidationReport, validate_study_session, validate_task,
};

/// Store-wide draft utilities.
pub mod drafts {
    pub use crate::autosave::{all_keys, cleanup_expired, clear_all, stats, storage_key};
}

/// Individual health probes.
pub mod probes {
    pub use crate::health::{
        DEFAULT_INTERVAL, aggregate, check_connection, check_database_access, check_rls_policies,
    };
}

// Built-in logger observer forwarding to `tracing`.
// Enabled by default, disable with: `--no-default-features`
#[cfg(feature = "tracing-logger")]
pub use observers::TracingLogger;

// Optional: JSON-lines file journal observer.
// Enable with: `--features journal`
#[cfg(feature = "journal")]
pub use observers::{JournalEntry, JournalWriter};
