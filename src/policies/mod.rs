//! Retry policies.
//!
//! This module groups the knobs that control **how often** an operation is
//! retried and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`]  retry budget and delay curve (base / factor / max)
//! - [`PolicyPreset`] named policies (`critical`, `standard`, `fast`, `none`)
//! - [`JitterSource`] randomization of delays to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! RetryClient::insert(.., Option<RetryPolicy>)
//!      └─► RetryExecutor::execute(name, op, policy)
//!           - policy.max_retries decides exhausted/continue
//!           - policy.next_delay(attempt, jitter) schedules the next attempt
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` is the `standard` preset.
//! - The executor uses [`RandomJitter`] unless configured otherwise.

mod backoff;
mod jitter;
mod retry;

pub use jitter::{FixedJitter, JITTER_MAX, JITTER_MIN, JitterSource, NoJitter, RandomJitter};
pub use retry::{PolicyPreset, RetryPolicy};
