//! # Form input validation.
//!
//! Validates task and study-session drafts before they are written through the
//! [`RetryClient`](crate::RetryClient). Every violated rule produces a
//! [`ValidationError`]; the first one converts into
//! [`Failure::Validation`](crate::Failure::Validation), which classifies into the
//! `input-*` categories:
//!
//! ```text
//! Rule::Required        → InputMissingRequired   (VAL_001)
//! Rule::InvalidDate     → InputInvalidDate       (VAL_002)
//! Rule::InvalidDuration → InputInvalidDuration   (VAL_003)
//! Rule::TooLong
//! Rule::InvalidChoice   → StorageValidationFailure (DB_003)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Failure;

const TITLE_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 1000;
const NOTES_MAX: usize = 500;
const TASK_MINUTES: (i64, i64) = (5, 480);
const SESSION_MINUTES: (i64, i64) = (1, 480);

/// Accepted task categories.
pub const TASK_CATEGORIES: [&str; 4] = ["estudo", "trabalho", "pessoal", "geral"];
/// Accepted task priorities.
pub const TASK_PRIORITIES: [&str; 3] = ["baixa", "media", "alta"];

/// Kind of rule a field violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Field is missing or blank.
    Required,
    /// Field is not a valid date, or the date is in the past.
    InvalidDate,
    /// A duration in minutes is out of range.
    InvalidDuration,
    /// Text exceeds its maximum length.
    TooLong,
    /// Value is not one of the accepted choices.
    InvalidChoice,
}

/// A single violated rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Violated rule.
    pub rule: Rule,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, rule: Rule, message: impl Into<String>) -> Self {
        Self {
            field,
            rule,
            message: message.into(),
        }
    }
}

/// All rules violated by one draft, in field order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Violations in field order.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Looks up the violation for `field`.
    pub fn field(&self, field: &str) -> Option<&ValidationError> {
        self.errors.iter().find(|e| e.field == field)
    }

    /// Converts the first violation into a [`Failure`].
    pub fn into_failure(mut self) -> Failure {
        Failure::Validation(self.errors.swap_remove(0))
    }

    fn check(errors: Vec<ValidationError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self { errors })
        }
    }
}

impl From<ValidationReport> for Failure {
    fn from(report: ValidationReport) -> Self {
        report.into_failure()
    }
}

/// Task form as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: String,
    pub estimated_minutes: Option<i64>,
    /// `YYYY-MM-DD`.
    pub due_date: Option<String>,
}

/// Task accepted by [`validate_task`], serialized with the backend's column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidTask {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "prioridade")]
    pub priority: String,
    #[serde(rename = "tempo_estimado")]
    pub estimated_minutes: Option<i64>,
    #[serde(rename = "data_vencimento")]
    pub due_date: NaiveDate,
}

/// Validates a task draft against `today`.
///
/// Title and description are trimmed; a blank description becomes `None`.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use opvisor::{validate_task, Rule, TaskDraft};
///
/// let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
/// let draft = TaskDraft {
///     title: "  Revisar cálculo ".into(),
///     category: "estudo".into(),
///     priority: "alta".into(),
///     estimated_minutes: Some(3),
///     due_date: Some("2024-03-10".into()),
///     ..Default::default()
/// };
///
/// let report = validate_task(&draft, today).unwrap_err();
/// assert_eq!(report.errors()[0].rule, Rule::InvalidDuration);
/// ```
pub fn validate_task(draft: &TaskDraft, today: NaiveDate) -> Result<ValidTask, ValidationReport> {
    let mut errors = Vec::new();

    let title = draft.title.trim();
    if title.is_empty() {
        errors.push(ValidationError::new("title", Rule::Required, "title is required"));
    } else if title.chars().count() > TITLE_MAX {
        errors.push(ValidationError::new(
            "title",
            Rule::TooLong,
            format!("title must be at most {TITLE_MAX} characters"),
        ));
    }

    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX) {
        errors.push(ValidationError::new(
            "description",
            Rule::TooLong,
            format!("description must be at most {DESCRIPTION_MAX} characters"),
        ));
    }

    if !TASK_CATEGORIES.contains(&draft.category.as_str()) {
        errors.push(ValidationError::new(
            "category",
            Rule::InvalidChoice,
            "select a valid category",
        ));
    }
    if !TASK_PRIORITIES.contains(&draft.priority.as_str()) {
        errors.push(ValidationError::new(
            "priority",
            Rule::InvalidChoice,
            "select a valid priority",
        ));
    }

    if let Some(minutes) = draft.estimated_minutes {
        let (lo, hi) = TASK_MINUTES;
        if !(lo..=hi).contains(&minutes) {
            errors.push(ValidationError::new(
                "estimated_minutes",
                Rule::InvalidDuration,
                format!("estimated time must be between {lo} and {hi} minutes"),
            ));
        }
    }

    let due_date = match draft.due_date.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push(ValidationError::new(
                "due_date",
                Rule::Required,
                "due date is required",
            ));
            None
        }
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) if date >= today => Some(date),
            Ok(_) => {
                errors.push(ValidationError::new(
                    "due_date",
                    Rule::InvalidDate,
                    "due date must be today or in the future",
                ));
                None
            }
            Err(_) => {
                errors.push(ValidationError::new(
                    "due_date",
                    Rule::InvalidDate,
                    format!("{raw:?} is not a valid date"),
                ));
                None
            }
        },
    };

    ValidationReport::check(errors)?;
    Ok(ValidTask {
        title: title.to_string(),
        description: description.map(str::to_string),
        category: draft.category.clone(),
        priority: draft.priority.clone(),
        estimated_minutes: draft.estimated_minutes,
        // Checked above: a missing date always produced an error.
        due_date: due_date.unwrap_or(today),
    })
}

/// Study session form as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StudySessionDraft {
    pub topic_id: String,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

/// Study session accepted by [`validate_study_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidStudySession {
    #[serde(rename = "topico_id")]
    pub topic_id: String,
    #[serde(rename = "duracao_minutos")]
    pub duration_minutes: i64,
    #[serde(rename = "observacoes")]
    pub notes: Option<String>,
}

/// Validates a study session draft.
pub fn validate_study_session(
    draft: &StudySessionDraft,
) -> Result<ValidStudySession, ValidationReport> {
    let mut errors = Vec::new();

    let topic_id = draft.topic_id.trim();
    if topic_id.is_empty() {
        errors.push(ValidationError::new(
            "topic_id",
            Rule::Required,
            "topic is required",
        ));
    }

    let (lo, hi) = SESSION_MINUTES;
    if !(lo..=hi).contains(&draft.duration_minutes) {
        errors.push(ValidationError::new(
            "duration_minutes",
            Rule::InvalidDuration,
            format!("duration must be between {lo} and {hi} minutes"),
        ));
    }

    let notes = draft
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if notes.is_some_and(|n| n.chars().count() > NOTES_MAX) {
        errors.push(ValidationError::new(
            "notes",
            Rule::TooLong,
            format!("notes must be at most {NOTES_MAX} characters"),
        ));
    }

    ValidationReport::check(errors)?;
    Ok(ValidStudySession {
        topic_id: topic_id.to_string(),
        duration_minutes: draft.duration_minutes,
        notes: notes.map(str::to_string),
    })
}
