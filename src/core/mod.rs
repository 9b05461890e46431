//! Executor core: the retry loop.
//!
//! The public API of this module is [`RetryExecutor`], which runs one remote
//! operation under a [`RetryPolicy`](crate::RetryPolicy).
//!
//! Internal modules:
//! - [`attempt`]: awaits one attempt and classifies its failure;
//! - [`executor`]: the retry loop, backoff sleeps and event emission.

mod attempt;
mod executor;

pub use attempt::AttemptRecord;
pub use executor::{RetryCallback, RetryExecutor};
