//! # Data-access client abstraction.
//!
//! [`DataClient`] is the seam between the facade and a hosted relational backend.
//! A call either fails outright (`Err(Failure)`, a thrown transport error) or
//! returns an [`Envelope`] whose `error` reports a by-value backend error.
//!
//! Row selection is expressed with [`Filters`]:
//! ```
//! use serde_json::json;
//! use opvisor::Filters;
//!
//! let filters = Filters::new()
//!     .eq("user_id", json!("u-1"))
//!     .is_in("prioridade", vec![json!("alta"), json!("media")])
//!     .gte("tempo_estimado", json!(30))
//!     .limit(10);
//!
//! assert!(filters.matches(&json!({"user_id": "u-1", "prioridade": "alta", "tempo_estimado": 45})));
//! assert!(!filters.matches(&json!({"user_id": "u-1", "prioridade": "baixa", "tempo_estimado": 45})));
//! ```

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Failure;

/// Error object reported by the backend inside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendError {
    /// Backend error code (`23505`, `PGRST116`, ...).
    pub code: String,
    /// Backend error message.
    pub message: String,
    /// Optional details.
    #[serde(default)]
    pub details: Option<String>,
    /// Optional hint.
    #[serde(default)]
    pub hint: Option<String>,
}

impl BackendError {
    /// Creates an error without details or hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    /// Attaches details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<BackendError> for Failure {
    fn from(err: BackendError) -> Self {
        Failure::Backend {
            code: err.code,
            message: err.message,
            details: err.details,
            hint: err.hint,
        }
    }
}

/// Response of one backend call: payload or by-value error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Returned rows or function result.
    #[serde(default)]
    pub data: Value,
    /// Error reported by the backend.
    #[serde(default)]
    pub error: Option<BackendError>,
}

impl Envelope {
    /// Successful response.
    pub fn ok(data: Value) -> Self {
        Self { data, error: None }
    }

    /// Failed response.
    pub fn err(error: BackendError) -> Self {
        Self {
            data: Value::Null,
            error: Some(error),
        }
    }

    /// Payload, or the error as a [`Failure::Backend`].
    pub fn into_result(self) -> Result<Value, Failure> {
        match self.error {
            Some(err) => Err(err.into()),
            None => Ok(self.data),
        }
    }
}

/// Comparison applied to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", content = "value", tag = "op")]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// SQL `LIKE` pattern (`%` any run, `_` one character).
    Like(String),
    /// Case-insensitive `LIKE`.
    Ilike(String),
}

/// Condition on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    /// Evaluates the condition against a JSON row. A missing column never matches.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(value) = row.get(&self.column) else {
            return false;
        };
        match &self.op {
            FilterOp::Eq(expected) => value == expected,
            FilterOp::In(options) => options.contains(value),
            FilterOp::Gt(bound) => compare(value, bound) == Some(Ordering::Greater),
            FilterOp::Gte(bound) => matches!(
                compare(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt(bound) => compare(value, bound) == Some(Ordering::Less),
            FilterOp::Lte(bound) => {
                matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal))
            }
            FilterOp::Like(pattern) => value.as_str().is_some_and(|s| like(pattern, s)),
            FilterOp::Ilike(pattern) => value
                .as_str()
                .is_some_and(|s| like(&pattern.to_lowercase(), &s.to_lowercase())),
        }
    }
}

/// Conjunction of column conditions plus an optional row limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub conditions: Vec<Filter>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Filters {
    /// No conditions, no limit.
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, column: impl Into<String>, op: FilterOp) -> Self {
        self.conditions.push(Filter {
            column: column.into(),
            op,
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: Value) -> Self {
        self.with(column, FilterOp::Eq(value))
    }

    pub fn is_in(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.with(column, FilterOp::In(values))
    }

    pub fn gt(self, column: impl Into<String>, value: Value) -> Self {
        self.with(column, FilterOp::Gt(value))
    }

    pub fn gte(self, column: impl Into<String>, value: Value) -> Self {
        self.with(column, FilterOp::Gte(value))
    }

    pub fn lt(self, column: impl Into<String>, value: Value) -> Self {
        self.with(column, FilterOp::Lt(value))
    }

    pub fn lte(self, column: impl Into<String>, value: Value) -> Self {
        self.with(column, FilterOp::Lte(value))
    }

    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(column, FilterOp::Like(pattern.into()))
    }

    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(column, FilterOp::Ilike(pattern.into()))
    }

    /// Caps the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builds filters from a JSON object of `column → condition`.
    ///
    /// - an array selects rows whose column is one of its values (`in`);
    /// - an object maps operators (`gt`, `gte`, `lt`, `lte`, `like`, `ilike`) to
    ///   operands, any other key is an equality on its operand;
    /// - anything else is an equality.
    ///
    /// # Example
    /// ```
    /// use serde_json::json;
    /// use opvisor::Filters;
    ///
    /// let map = json!({"categoria": ["estudo", "trabalho"], "tempo_estimado": {"lt": 60}});
    /// let filters = Filters::from_json(map.as_object().unwrap());
    /// assert_eq!(filters.conditions.len(), 2);
    /// assert!(filters.matches(&json!({"categoria": "estudo", "tempo_estimado": 25})));
    /// ```
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let mut filters = Self::new();
        for (column, condition) in map {
            filters = match condition {
                Value::Array(values) => filters.is_in(column.as_str(), values.clone()),
                Value::Object(ops) => ops.iter().fold(filters, |f, (op, operand)| {
                    let col = column.as_str();
                    match op.as_str() {
                        "gt" => f.gt(col, operand.clone()),
                        "gte" => f.gte(col, operand.clone()),
                        "lt" => f.lt(col, operand.clone()),
                        "lte" => f.lte(col, operand.clone()),
                        "like" => f.like(col, operand_text(operand)),
                        "ilike" => f.ilike(col, operand_text(operand)),
                        _ => f.eq(col, operand.clone()),
                    }
                }),
                other => filters.eq(column.as_str(), other.clone()),
            };
        }
        filters
    }

    /// True if every condition holds for `row`.
    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

fn operand_text(operand: &Value) -> String {
    match operand {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL `LIKE` matching with `%` and `_` wildcards.
fn like(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some((star, start)) = backtrack {
            pi = star + 1;
            ti = start + 1;
            backtrack = Some((star, start + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '%')
}

/// # Remote data-access client.
///
/// One method per CRUD verb. `Err` models an exception thrown by the driver
/// (transport failure, timeout); by-value backend errors come back in
/// [`Envelope::error`].
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::{Value, json};
/// use opvisor::{DataClient, Envelope, Failure, Filters};
///
/// struct Offline;
///
/// #[async_trait]
/// impl DataClient for Offline {
///     async fn insert(&self, _: &str, _: Value) -> Result<Envelope, Failure> {
///         Err(Failure::exception("TypeError", "Failed to fetch"))
///     }
///     async fn update(&self, _: &str, _: Value, _: &Filters) -> Result<Envelope, Failure> {
///         Err(Failure::exception("TypeError", "Failed to fetch"))
///     }
///     async fn select(&self, _: &str, _: &str, _: &Filters) -> Result<Envelope, Failure> {
///         Ok(Envelope::ok(json!([])))
///     }
///     async fn delete(&self, _: &str, _: &Filters) -> Result<Envelope, Failure> {
///         Err(Failure::exception("TypeError", "Failed to fetch"))
///     }
///     async fn rpc(&self, _: &str, _: Value) -> Result<Envelope, Failure> {
///         Err(Failure::exception("TypeError", "Failed to fetch"))
///     }
/// }
/// ```
#[async_trait]
pub trait DataClient: Send + Sync + 'static {
    /// Inserts one row (object) or many rows (array).
    async fn insert(&self, table: &str, rows: Value) -> Result<Envelope, Failure>;

    /// Merges `values` into every row matching `filters`.
    async fn update(&self, table: &str, values: Value, filters: &Filters)
    -> Result<Envelope, Failure>;

    /// Selects `columns` (`*` or comma-separated) of rows matching `filters`.
    async fn select(&self, table: &str, columns: &str, filters: &Filters)
    -> Result<Envelope, Failure>;

    /// Deletes rows matching `filters`.
    async fn delete(&self, table: &str, filters: &Filters) -> Result<Envelope, Failure>;

    /// Calls a stored function.
    async fn rpc(&self, function: &str, params: Value) -> Result<Envelope, Failure>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::classify::ErrorCategory;

    #[test]
    fn test_envelope_error_becomes_backend_failure() {
        let env = Envelope::err(BackendError::new("23505", "duplicate key").with_details("id=1"));
        let failure = env.into_result().unwrap_err();
        assert_eq!(failure.category(), ErrorCategory::StorageValidationFailure);
        assert_eq!(failure.as_message(), "[23505] duplicate key (id=1)");
        assert_eq!(Envelope::ok(json!([1])).into_result(), Ok(json!([1])));
    }

    #[test]
    fn test_envelope_deserializes_partial_documents() {
        let env: Envelope =
            serde_json::from_str(r#"{"error":{"code":"PGRST116","message":"JWT expired"}}"#)
                .unwrap();
        assert_eq!(env.data, Value::Null);
        assert_eq!(env.error.unwrap().code, "PGRST116");
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("rev%", "revisão de cálculo"));
        assert!(like("%cálculo", "revisão de cálculo"));
        assert!(like("_ist%", "história"));
        assert!(like("%", ""));
        assert!(!like("rev_", "revisão"));
        assert!(!like("%física%", "química"));
    }

    #[test]
    fn test_ordering_filters_compare_numbers_and_strings() {
        let row = json!({"tempo_estimado": 45, "data_vencimento": "2024-03-10"});
        assert!(Filters::new().gt("tempo_estimado", json!(30)).matches(&row));
        assert!(Filters::new().lte("tempo_estimado", json!(45)).matches(&row));
        assert!(!Filters::new().lt("tempo_estimado", json!(45.0)).matches(&row));
        assert!(Filters::new().lt("data_vencimento", json!("2024-04-01")).matches(&row));
        assert!(!Filters::new().gt("tempo_estimado", json!("30")).matches(&row));
        assert!(!Filters::new().eq("missing", Value::Null).matches(&row));
    }

    #[test]
    fn test_from_json_mirrors_operator_objects() {
        let map = json!({
            "titulo": {"ilike": "%PROVA%"},
            "status": "pendente",
            "prioridade": ["alta"]
        });
        let filters = Filters::from_json(map.as_object().unwrap());
        let row = json!({"titulo": "Estudar para a prova", "status": "pendente", "prioridade": "alta"});
        assert!(filters.matches(&row));
        assert!(!filters.matches(&json!({"titulo": "Estudar", "status": "pendente", "prioridade": "alta"})));
    }
}
