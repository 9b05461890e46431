//! # Error categories and their presentation records.
//!
//! Each [`ErrorCategory`] maps to one static [`CategoryInfo`]: stable code,
//! retryability, log level and what to show the user. The table is data, not
//! control flow: the executor only ever asks [`ErrorCategory::is_retryable`].
//!
//! | Code            | Category                   | Retryable | Level    |
//! |-----------------|----------------------------|-----------|----------|
//! | `AUTH_001`      | authentication required    | no        | INFO     |
//! | `AUTH_002`      | session expired            | no        | WARNING  |
//! | `AUTH_003`      | access denied              | no        | CRITICAL |
//! | `DB_001`        | storage write failure      | yes       | ERROR    |
//! | `DB_002`        | storage slow               | yes       | WARNING  |
//! | `DB_003`        | storage validation failure | no        | WARNING  |
//! | `NET_001`       | network unreachable        | yes       | CRITICAL |
//! | `NET_002`       | network slow               | yes       | WARNING  |
//! | `VAL_001`       | input missing required     | no        | INFO     |
//! | `VAL_002`       | input invalid date         | no        | INFO     |
//! | `VAL_003`       | input invalid duration     | no        | INFO     |
//! | `UI_001`        | interface unresponsive     | yes       | DEBUG    |
//! | `UI_002`        | interface reset failure    | yes       | DEBUG    |
//! | `SYS_001`       | system unexpected          | no        | CRITICAL |
//! | `UNKNOWN_ERROR` | unknown                    | yes       | ERROR    |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::events::LogLevel;

/// Semantic category of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    AuthenticationRequired,
    SessionExpired,
    AccessDenied,
    StorageWriteFailure,
    StorageSlow,
    StorageValidationFailure,
    NetworkUnreachable,
    NetworkSlow,
    InputMissingRequired,
    InputInvalidDate,
    InputInvalidDuration,
    InterfaceUnresponsive,
    InterfaceResetFailure,
    SystemUnexpected,
    Unknown,
}

/// Visual tone of the message shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Default,
    Destructive,
    Warning,
    Success,
}

/// What the suggested action does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Navigate to a route.
    Navigate { href: &'static str },
    /// Reload the current page.
    Reload,
    /// Open a problem report addressed to support.
    ReportProblem { email: &'static str },
}

/// Suggested user action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Action {
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// Presentation and policy record of one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub variant: Variant,
    pub action: Option<Action>,
    pub retryable: bool,
    pub log_level: LogLevel,
}

const SIGN_IN: Action = Action {
    label: "Sign in",
    kind: ActionKind::Navigate {
        href: "/auth/login",
    },
};
const TRY_AGAIN: Action = Action {
    label: "Try again",
    kind: ActionKind::Reload,
};
const RELOAD: Action = Action {
    label: "Reload",
    kind: ActionKind::Reload,
};

static AUTH_001: CategoryInfo = CategoryInfo {
    code: "AUTH_001",
    title: "Sign in required",
    message: "You need to be signed in to do this.",
    variant: Variant::Default,
    action: Some(SIGN_IN),
    retryable: false,
    log_level: LogLevel::Info,
};

static AUTH_002: CategoryInfo = CategoryInfo {
    code: "AUTH_002",
    title: "Session expired",
    message: "Your session has expired. Redirecting to sign in...",
    variant: Variant::Warning,
    action: Some(Action {
        label: "Sign in now",
        kind: ActionKind::Navigate {
            href: "/auth/login",
        },
    }),
    retryable: false,
    log_level: LogLevel::Warning,
};

static AUTH_003: CategoryInfo = CategoryInfo {
    code: "AUTH_003",
    title: "Access denied",
    message: "You do not have permission for this operation.",
    variant: Variant::Destructive,
    action: None,
    retryable: false,
    log_level: LogLevel::Critical,
};

static DB_001: CategoryInfo = CategoryInfo {
    code: "DB_001",
    title: "Could not save",
    message: "Saving failed. Trying again...",
    variant: Variant::Destructive,
    action: Some(TRY_AGAIN),
    retryable: true,
    log_level: LogLevel::Error,
};

static DB_002: CategoryInfo = CategoryInfo {
    code: "DB_002",
    title: "Slow loading",
    message: "This is taking longer than usual.",
    variant: Variant::Warning,
    action: None,
    retryable: true,
    log_level: LogLevel::Warning,
};

static DB_003: CategoryInfo = CategoryInfo {
    code: "DB_003",
    title: "Invalid data",
    message: "Check the highlighted fields and try again.",
    variant: Variant::Destructive,
    action: None,
    retryable: false,
    log_level: LogLevel::Warning,
};

static NET_001: CategoryInfo = CategoryInfo {
    code: "NET_001",
    title: "No connection",
    message: "Check your internet connection.",
    variant: Variant::Destructive,
    action: Some(TRY_AGAIN),
    retryable: true,
    log_level: LogLevel::Critical,
};

static NET_002: CategoryInfo = CategoryInfo {
    code: "NET_002",
    title: "Slow connection",
    message: "This may take longer than usual.",
    variant: Variant::Warning,
    action: None,
    retryable: true,
    log_level: LogLevel::Warning,
};

static VAL_001: CategoryInfo = CategoryInfo {
    code: "VAL_001",
    title: "Required field",
    message: "Please fill in all required fields.",
    variant: Variant::Destructive,
    action: None,
    retryable: false,
    log_level: LogLevel::Info,
};

static VAL_002: CategoryInfo = CategoryInfo {
    code: "VAL_002",
    title: "Invalid date",
    message: "The date must be today or in the future.",
    variant: Variant::Destructive,
    action: None,
    retryable: false,
    log_level: LogLevel::Info,
};

static VAL_003: CategoryInfo = CategoryInfo {
    code: "VAL_003",
    title: "Invalid duration",
    message: "The estimated time must be between 5 and 480 minutes.",
    variant: Variant::Destructive,
    action: None,
    retryable: false,
    log_level: LogLevel::Info,
};

static UI_001: CategoryInfo = CategoryInfo {
    code: "UI_001",
    title: "Page not responding",
    message: "Reload the page to fix this.",
    variant: Variant::Warning,
    action: Some(RELOAD),
    retryable: true,
    log_level: LogLevel::Debug,
};

static UI_002: CategoryInfo = CategoryInfo {
    code: "UI_002",
    title: "Form did not reset",
    message: "Clear it manually or reload the page.",
    variant: Variant::Warning,
    action: None,
    retryable: true,
    log_level: LogLevel::Debug,
};

static SYS_001: CategoryInfo = CategoryInfo {
    code: "SYS_001",
    title: "Something went wrong",
    message: "Unexpected error. Our team has been notified.",
    variant: Variant::Destructive,
    action: Some(Action {
        label: "Report a problem",
        kind: ActionKind::ReportProblem {
            email: "suporte@dashboard.com",
        },
    }),
    retryable: false,
    log_level: LogLevel::Critical,
};

static UNKNOWN_ERROR: CategoryInfo = CategoryInfo {
    code: "UNKNOWN_ERROR",
    title: "Unknown error",
    message: "Something unexpected happened. Try reloading the page.",
    variant: Variant::Destructive,
    action: Some(RELOAD),
    retryable: true,
    log_level: LogLevel::Error,
};

impl ErrorCategory {
    /// Every category, in table order.
    pub const ALL: [ErrorCategory; 15] = [
        ErrorCategory::AuthenticationRequired,
        ErrorCategory::SessionExpired,
        ErrorCategory::AccessDenied,
        ErrorCategory::StorageWriteFailure,
        ErrorCategory::StorageSlow,
        ErrorCategory::StorageValidationFailure,
        ErrorCategory::NetworkUnreachable,
        ErrorCategory::NetworkSlow,
        ErrorCategory::InputMissingRequired,
        ErrorCategory::InputInvalidDate,
        ErrorCategory::InputInvalidDuration,
        ErrorCategory::InterfaceUnresponsive,
        ErrorCategory::InterfaceResetFailure,
        ErrorCategory::SystemUnexpected,
        ErrorCategory::Unknown,
    ];

    /// Presentation and policy record of this category.
    pub fn info(self) -> &'static CategoryInfo {
        match self {
            ErrorCategory::AuthenticationRequired => &AUTH_001,
            ErrorCategory::SessionExpired => &AUTH_002,
            ErrorCategory::AccessDenied => &AUTH_003,
            ErrorCategory::StorageWriteFailure => &DB_001,
            ErrorCategory::StorageSlow => &DB_002,
            ErrorCategory::StorageValidationFailure => &DB_003,
            ErrorCategory::NetworkUnreachable => &NET_001,
            ErrorCategory::NetworkSlow => &NET_002,
            ErrorCategory::InputMissingRequired => &VAL_001,
            ErrorCategory::InputInvalidDate => &VAL_002,
            ErrorCategory::InputInvalidDuration => &VAL_003,
            ErrorCategory::InterfaceUnresponsive => &UI_001,
            ErrorCategory::InterfaceResetFailure => &UI_002,
            ErrorCategory::SystemUnexpected => &SYS_001,
            ErrorCategory::Unknown => &UNKNOWN_ERROR,
        }
    }

    /// Stable code (`AUTH_001`, `NET_002`, ...).
    pub fn code(self) -> &'static str {
        self.info().code
    }

    /// Whether a failure of this category may succeed if retried.
    pub fn is_retryable(self) -> bool {
        self.info().retryable
    }

    /// Severity used when reporting this category.
    pub fn log_level(self) -> LogLevel {
        self.info().log_level
    }

    /// Looks up a category by its stable code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unknown error code {s:?}"))
    }
}

impl Serialize for ErrorCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_partition() {
        let retryable: Vec<_> = ErrorCategory::ALL
            .into_iter()
            .filter(|c| c.is_retryable())
            .map(ErrorCategory::code)
            .collect();
        assert_eq!(
            retryable,
            ["DB_001", "DB_002", "NET_001", "NET_002", "UI_001", "UI_002", "UNKNOWN_ERROR"]
        );
    }

    #[test]
    fn test_codes_round_trip() {
        for category in ErrorCategory::ALL {
            assert_eq!(ErrorCategory::from_code(category.code()), Some(category));
        }
        assert_eq!(ErrorCategory::from_code("NET_999"), None);
    }

    #[test]
    fn test_sign_in_action_for_authentication() {
        let info = ErrorCategory::AuthenticationRequired.info();
        let action = info.action.unwrap();
        assert_eq!(action.label, "Sign in");
        assert_eq!(
            action.kind,
            ActionKind::Navigate {
                href: "/auth/login"
            }
        );
        assert_eq!(
            ErrorCategory::InterfaceUnresponsive.info().action.unwrap().kind,
            ActionKind::Reload
        );
    }

    #[test]
    fn test_info_serializes_for_clients() {
        let json = serde_json::to_value(ErrorCategory::SessionExpired.info()).unwrap();
        assert_eq!(json["code"], "AUTH_002");
        assert_eq!(json["variant"], "warning");
        assert_eq!(json["log_level"], "WARNING");
        assert_eq!(json["action"]["type"], "navigate");
        assert_eq!(json["action"]["href"], "/auth/login");
    }
}
