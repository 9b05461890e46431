//! Error types used by the executor, the facade and the draft store.
//!
//! This module defines three error enums:
//!
//! - [`Failure`]: what a remote operation fails with. The executor classifies
//!   it and, when it gives up, returns it to the caller **unchanged**.
//! - [`ConfigError`]: invalid retry configuration.
//! - [`DraftError`]: failures of the draft auto-save store.
//!
//! [`Failure`] provides helper methods (`as_label`, `as_message`) for logging,
//! plus [`Failure::category`] and [`Failure::is_retryable`].

use std::time::Duration;

use thiserror::Error;

use crate::classify::{self, ErrorCategory};
use crate::validate::ValidationError;

/// # Failure of a remote operation.
///
/// The shapes a backend call can fail with:
/// - a plain message ([`Failure::Message`]);
/// - a coded error reported by the relational backend ([`Failure::Backend`]);
/// - a named runtime exception such as a transport error ([`Failure::Exception`]);
/// - a rejected form input ([`Failure::Validation`]).
///
/// Classification is a single exhaustive match over these variants,
/// see [`classify`](crate::classify::classify).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Failure {
    /// Bare error string.
    #[error("{0}")]
    Message(String),

    /// Error envelope produced by the backend driver.
    #[error("backend error {code}: {message}")]
    Backend {
        /// Backend error code (`23505`, `PGRST301`, ...).
        code: String,
        /// Backend error message.
        message: String,
        /// Optional details attached by the backend.
        details: Option<String>,
        /// Optional hint attached by the backend.
        hint: Option<String>,
    },

    /// Named exception raised while performing the call.
    #[error("{name}: {message}")]
    Exception {
        /// Exception name (`TypeError`, `TimeoutError`, ...).
        name: String,
        /// Exception message.
        message: String,
    },

    /// Input rejected before it reached the backend.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl Failure {
    /// Builds a [`Failure::Message`].
    pub fn message(message: impl Into<String>) -> Self {
        Failure::Message(message.into())
    }

    /// Builds a [`Failure::Backend`] without details or hint.
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Failure::Backend {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    /// Builds a [`Failure::Exception`].
    pub fn exception(name: impl Into<String>, message: impl Into<String>) -> Self {
        Failure::Exception {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use opvisor::Failure;
    ///
    /// let err = Failure::backend("23505", "duplicate key");
    /// assert_eq!(err.as_label(), "failure_backend");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Failure::Message(_) => "failure_message",
            Failure::Backend { .. } => "failure_backend",
            Failure::Exception { .. } => "failure_exception",
            Failure::Validation(_) => "failure_validation",
        }
    }

    /// Returns a human-readable message with details about the failure.
    pub fn as_message(&self) -> String {
        match self {
            Failure::Message(msg) => msg.clone(),
            Failure::Backend {
                code,
                message,
                details,
                ..
            } => match details {
                Some(details) => format!("[{code}] {message} ({details})"),
                None => format!("[{code}] {message}"),
            },
            Failure::Exception { name, message } => format!("{name}: {message}"),
            Failure::Validation(err) => err.to_string(),
        }
    }

    /// Classifies this failure. Shorthand for [`classify::classify`].
    pub fn category(&self) -> ErrorCategory {
        classify::classify(self)
    }

    /// Indicates whether the failure's category is safe to retry.
    ///
    /// # Example
    /// ```
    /// use opvisor::Failure;
    ///
    /// assert!(Failure::message("Network request failed").is_retryable());
    /// assert!(!Failure::backend("42501", "permission denied").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// # Invalid retry configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `max_delay` is below `base_delay`.
    #[error("max_delay {max:?} is below base_delay {base:?}")]
    DelayBounds {
        /// Configured base delay.
        base: Duration,
        /// Configured maximum delay.
        max: Duration,
    },

    /// `backoff_factor` is below 1.0 or not finite.
    #[error("backoff_factor {0} must be finite and >= 1.0")]
    Factor(f64),

    /// No preset with this name exists.
    #[error("unknown retry preset {0:?}")]
    UnknownPreset(String),

    /// Configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::DelayBounds { .. } => "config_delay_bounds",
            ConfigError::Factor(_) => "config_factor",
            ConfigError::UnknownPreset(_) => "config_unknown_preset",
            ConfigError::Parse(_) => "config_parse",
        }
    }
}

/// # Errors produced by draft stores.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DraftError {
    /// Underlying storage failed.
    #[error("draft store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Draft could not be encoded or decoded.
    #[error("draft encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The auto-save worker is no longer running.
    #[error("auto-save worker stopped")]
    WorkerStopped,
}

impl DraftError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DraftError::Io(_) => "draft_io",
            DraftError::Encode(_) => "draft_encode",
            DraftError::WorkerStopped => "draft_worker_stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_includes_details() {
        let err = Failure::Backend {
            code: "23505".into(),
            message: "duplicate key value".into(),
            details: Some("Key (id)=(1) already exists.".into()),
            hint: None,
        };
        assert_eq!(
            err.as_message(),
            "[23505] duplicate key value (Key (id)=(1) already exists.)"
        );
    }

    #[test]
    fn test_display_is_not_wrapped() {
        let err = Failure::exception("TypeError", "Failed to fetch");
        assert_eq!(err.to_string(), "TypeError: Failed to fetch");
        assert_eq!(Failure::message("boom").to_string(), "boom");
    }

    #[test]
    fn test_config_error_labels() {
        let err = ConfigError::UnknownPreset("turbo".into());
        assert_eq!(err.as_label(), "config_unknown_preset");
        assert_eq!(err.to_string(), "unknown retry preset \"turbo\"");
    }
}
