//! Error classification.
//!
//! ## Contents
//! - [`ErrorCategory`] the fixed set of semantic failure categories
//! - [`CategoryInfo`] per-category record (code, retryable, log level, presentation)
//! - [`classify`] maps a [`Failure`](crate::Failure) to its category
//!
//! Adding a category means adding a variant and its record; the executor only
//! consults [`ErrorCategory::is_retryable`].

mod category;
mod classifier;

pub use category::{Action, ActionKind, CategoryInfo, ErrorCategory, Variant};
pub use classifier::{classify, classify_code, is_retryable};
