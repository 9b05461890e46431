//! # Failure classification.
//!
//! [`classify`] maps a [`Failure`] to exactly one [`ErrorCategory`]. It is a pure
//! function of the failure's shape and content, never of execution history, and
//! it is total: anything unrecognised ends up as [`ErrorCategory::Unknown`].
//!
//! ```text
//! Message(text)       → keyword match ("authentication", "network", ...)
//! Backend { code }    → fixed backend code table (unmatched → StorageWriteFailure)
//! Exception { .. }    → name/message keyword match
//! Validation(err)     → by violated rule
//! ```

use crate::classify::ErrorCategory;
use crate::error::Failure;
use crate::validate::Rule;

/// Classifies a failure.
///
/// # Example
/// ```
/// use opvisor::{classify, ErrorCategory, Failure};
///
/// let dup = Failure::backend("23505", "network timeout while writing");
/// assert_eq!(classify(&dup), ErrorCategory::StorageValidationFailure);
///
/// let offline = Failure::message("Network request failed");
/// assert_eq!(classify(&offline), ErrorCategory::NetworkUnreachable);
/// ```
pub fn classify(failure: &Failure) -> ErrorCategory {
    match failure {
        Failure::Message(text) => classify_message(text),
        Failure::Backend { code, .. } => classify_code(code),
        Failure::Exception { name, message } => classify_exception(name, message),
        Failure::Validation(err) => match err.rule {
            Rule::Required => ErrorCategory::InputMissingRequired,
            Rule::InvalidDate => ErrorCategory::InputInvalidDate,
            Rule::InvalidDuration => ErrorCategory::InputInvalidDuration,
            Rule::TooLong | Rule::InvalidChoice => ErrorCategory::StorageValidationFailure,
        },
    }
}

/// Whether failures of `category` may be retried.
pub fn is_retryable(category: ErrorCategory) -> bool {
    category.is_retryable()
}

/// Maps a backend error code. Any code outside the table is a write failure.
pub fn classify_code(code: &str) -> ErrorCategory {
    match code {
        // invalid / expired JWT
        "PGRST116" | "PGRST301" => ErrorCategory::SessionExpired,
        // insufficient_privilege (row-level security)
        "42501" => ErrorCategory::AccessDenied,
        // unique_violation
        "23505" => ErrorCategory::StorageValidationFailure,
        // check_violation
        "23514" => ErrorCategory::InputInvalidDuration,
        // not_null_violation
        "23502" => ErrorCategory::InputMissingRequired,
        // connection_failure, sqlclient_unable_to_establish_sqlconnection
        "08006" | "08001" => ErrorCategory::NetworkUnreachable,
        // query_canceled (statement timeout)
        "57014" => ErrorCategory::StorageSlow,
        _ => ErrorCategory::StorageWriteFailure,
    }
}

fn classify_message(text: &str) -> ErrorCategory {
    let text = text.to_lowercase();
    if contains_any(&text, &["authentication", "unauthorized"]) {
        ErrorCategory::AuthenticationRequired
    } else if contains_any(&text, &["network", "fetch"]) {
        ErrorCategory::NetworkUnreachable
    } else {
        ErrorCategory::Unknown
    }
}

fn classify_exception(name: &str, message: &str) -> ErrorCategory {
    let name = name.to_lowercase();
    let message = message.to_lowercase();

    if name.contains("fetch") || message.contains("fetch") {
        ErrorCategory::NetworkUnreachable
    } else if contains_any(&message, &["authentication", "unauthorized"]) {
        ErrorCategory::AuthenticationRequired
    } else if contains_any(&message, &["required", "missing"]) {
        ErrorCategory::InputMissingRequired
    } else if message.contains("timeout") {
        ErrorCategory::NetworkSlow
    } else {
        ErrorCategory::Unknown
    }
}

#[inline]
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationError;

    #[test]
    fn test_backend_code_ignores_message() {
        for message in ["duplicate key", "network unreachable", "unauthorized", ""] {
            assert_eq!(
                classify(&Failure::backend("23505", message)),
                ErrorCategory::StorageValidationFailure
            );
        }
    }

    #[test]
    fn test_backend_code_table() {
        let cases = [
            ("PGRST116", ErrorCategory::SessionExpired),
            ("PGRST301", ErrorCategory::SessionExpired),
            ("42501", ErrorCategory::AccessDenied),
            ("23514", ErrorCategory::InputInvalidDuration),
            ("23502", ErrorCategory::InputMissingRequired),
            ("08006", ErrorCategory::NetworkUnreachable),
            ("08001", ErrorCategory::NetworkUnreachable),
            ("57014", ErrorCategory::StorageSlow),
            ("42P01", ErrorCategory::StorageWriteFailure),
            ("", ErrorCategory::StorageWriteFailure),
        ];
        for (code, expected) in cases {
            assert_eq!(classify_code(code), expected, "code {code:?}");
        }
    }

    #[test]
    fn test_message_keywords_are_case_insensitive() {
        assert_eq!(
            classify(&Failure::message("Network request failed")),
            ErrorCategory::NetworkUnreachable
        );
        assert_eq!(
            classify(&Failure::message("UNAUTHORIZED")),
            ErrorCategory::AuthenticationRequired
        );
        assert_eq!(
            classify(&Failure::message("Authentication needed to fetch")),
            ErrorCategory::AuthenticationRequired
        );
        assert_eq!(classify(&Failure::message("boom")), ErrorCategory::Unknown);
        assert_eq!(classify(&Failure::message("")), ErrorCategory::Unknown);
    }

    #[test]
    fn test_exception_rules_in_order() {
        let cases = [
            ("TypeError", "Failed to fetch", ErrorCategory::NetworkUnreachable),
            ("Error", "Unauthorized request", ErrorCategory::AuthenticationRequired),
            ("Error", "title is required", ErrorCategory::InputMissingRequired),
            ("Error", "Missing column", ErrorCategory::InputMissingRequired),
            ("TimeoutError", "Request timeout", ErrorCategory::NetworkSlow),
            ("RangeError", "out of range", ErrorCategory::Unknown),
        ];
        for (name, message, expected) in cases {
            assert_eq!(
                classify(&Failure::exception(name, message)),
                expected,
                "{name}: {message}"
            );
        }
    }

    #[test]
    fn test_validation_rules() {
        let failure = Failure::Validation(ValidationError {
            field: "due_date",
            rule: Rule::InvalidDate,
            message: "due date must be today or in the future".into(),
        });
        assert_eq!(classify(&failure), ErrorCategory::InputInvalidDate);
        assert!(!is_retryable(classify(&failure)));
    }
}
