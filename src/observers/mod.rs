//! # Event observers for the retry executor.
//!
//! This module provides the [`Observe`] trait, the [`ObserverSet`] fan-out, and
//! built-in sinks for events emitted by the [`RetryExecutor`](crate::RetryExecutor).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   RetryExecutor ── emit(Event) ──► ObserverSet ──► Observe::on_event(&Event)
//!                                                        │
//!                                               ┌────────┴────────┬──────────┐
//!                                               ▼                 ▼          ▼
//!                                         TracingLogger     JournalWriter  Custom
//! ```
//!
//! ## Built-in observers
//! - [`TracingLogger`] (feature `tracing-logger`, on by default): forwards to `tracing`.
//! - [`JournalWriter`] (feature `journal`): JSON-lines file per component and day.

mod observer;
mod set;

#[cfg(feature = "journal")]
mod journal;
#[cfg(feature = "tracing-logger")]
mod tracing_logger;

pub use observer::Observe;
pub use set::ObserverSet;
pub(crate) use set::panic_message;

#[cfg(feature = "journal")]
pub use journal::{JournalEntry, JournalWriter};
#[cfg(feature = "tracing-logger")]
pub use tracing_logger::TracingLogger;
