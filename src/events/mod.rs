//! Executor events: types and severity.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`LogLevel`] severity shared by events and error categories
//!
//! ## Quick reference
//! - **Publisher**: `RetryExecutor` (one event per attempt, retry and terminal outcome).
//! - **Consumers**: every [`Observe`](crate::Observe) implementation registered
//!   on the executor, fanned out through [`ObserverSet`](crate::ObserverSet).

mod event;
mod level;

pub use event::{Event, EventKind};
pub use level::LogLevel;
