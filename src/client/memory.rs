//! # MemoryClient: in-process [`DataClient`].
//!
//! Tables are vectors of JSON rows guarded by a mutex. Besides evaluating
//! [`Filters`], the client can be told to fail its next calls, which is how the
//! demos and tests reproduce flaky networks and backend rejections:
//!
//! ```text
//! fail_next(Failure)        → next call returns Err(failure)      (thrown)
//! reject_next(BackendError) → next call returns Envelope{error}   (by value)
//! with_latency(d)           → every call sleeps `d` first
//! ```
//!
//! Unknown tables answer `42P01`, unknown functions `PGRST202`, and inserting a
//! row whose `id` already exists, or repeats within the batch, answers `23505`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::{BackendError, DataClient, Envelope, Filters};
use crate::error::Failure;

/// Stored function handler.
pub type RpcHandler = dyn Fn(&Value) -> Result<Value, BackendError> + Send + Sync;

enum Injected {
    Throw(Failure),
    Reject(BackendError),
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryClient {
    tables: Mutex<BTreeMap<String, Vec<Value>>>,
    functions: Mutex<HashMap<String, Arc<RpcHandler>>>,
    injected: Mutex<VecDeque<Injected>>,
    latency: Option<Duration>,
    calls: AtomicU64,
}

impl MemoryClient {
    /// Empty backend without tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) a table with the given rows.
    pub fn with_table(self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        lock(&self.tables).insert(name.into(), rows);
        self
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Registers a stored function.
    pub fn register_rpc<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Value) -> Result<Value, BackendError> + Send + Sync + 'static,
    {
        lock(&self.functions).insert(name.into(), Arc::new(handler));
    }

    /// Makes the next call fail with `failure`.
    pub fn fail_next(&self, failure: Failure) {
        lock(&self.injected).push_back(Injected::Throw(failure));
    }

    /// Makes the next call answer with `error` in its envelope.
    pub fn reject_next(&self, error: BackendError) {
        lock(&self.injected).push_back(Injected::Reject(error));
    }

    /// Number of calls received so far, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a table.
    pub fn rows(&self, table: &str) -> Option<Vec<Value>> {
        lock(&self.tables).get(table).cloned()
    }

    /// Counts the call, waits the configured latency and pops an injected failure.
    async fn enter(&self) -> Result<Option<Envelope>, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let injected = lock(&self.injected).pop_front();
        match injected {
            Some(Injected::Throw(failure)) => Err(failure),
            Some(Injected::Reject(error)) => Ok(Some(Envelope::err(error))),
            None => Ok(None),
        }
    }

    fn with_rows<F>(&self, table: &str, f: F) -> Envelope
    where
        F: FnOnce(&mut Vec<Value>) -> Result<Value, BackendError>,
    {
        let mut tables = lock(&self.tables);
        let result = match tables.get_mut(table) {
            Some(rows) => f(rows),
            None => Err(missing_table(table)),
        };
        match result {
            Ok(data) => Envelope::ok(data),
            Err(err) => Envelope::err(err),
        }
    }
}

impl std::fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClient")
            .field("tables", &lock(&self.tables).keys().collect::<Vec<_>>())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl DataClient for MemoryClient {
    async fn insert(&self, table: &str, rows: Value) -> Result<Envelope, Failure> {
        if let Some(env) = self.enter().await? {
            return Ok(env);
        }
        let new_rows = match rows {
            Value::Array(rows) => rows,
            row => vec![row],
        };
        Ok(self.with_rows(table, |existing| {
            let mut seen: Vec<&Value> = Vec::new();
            for row in &new_rows {
                let Some(id) = row.get("id") else { continue };
                if seen.contains(&id) || existing.iter().any(|r| r.get("id") == Some(id)) {
                    return Err(BackendError::new(
                        "23505",
                        format!("duplicate key value violates unique constraint \"{table}_pkey\""),
                    )
                    .with_details(format!("Key (id)=({id}) already exists.")));
                }
                seen.push(id);
            }
            existing.extend(new_rows.iter().cloned());
            Ok(Value::Array(new_rows))
        }))
    }

    async fn update(
        &self,
        table: &str,
        values: Value,
        filters: &Filters,
    ) -> Result<Envelope, Failure> {
        if let Some(env) = self.enter().await? {
            return Ok(env);
        }
        let Value::Object(values) = values else {
            return Ok(Envelope::err(BackendError::new(
                "PGRST102",
                "update payload must be an object",
            )));
        };
        Ok(self.with_rows(table, |rows| {
            let mut updated = Vec::new();
            for row in rows.iter_mut().filter(|r| filters.matches(r)) {
                if let Value::Object(fields) = row {
                    fields.extend(values.clone());
                }
                updated.push(row.clone());
            }
            Ok(Value::Array(updated))
        }))
    }

    async fn select(
        &self,
        table: &str,
        columns: &str,
        filters: &Filters,
    ) -> Result<Envelope, Failure> {
        if let Some(env) = self.enter().await? {
            return Ok(env);
        }
        Ok(self.with_rows(table, |rows| {
            let limit = filters.limit.unwrap_or(usize::MAX);
            let selected = rows
                .iter()
                .filter(|r| filters.matches(r))
                .take(limit)
                .map(|r| project(r, columns))
                .collect();
            Ok(Value::Array(selected))
        }))
    }

    async fn delete(&self, table: &str, filters: &Filters) -> Result<Envelope, Failure> {
        if let Some(env) = self.enter().await? {
            return Ok(env);
        }
        Ok(self.with_rows(table, |rows| {
            let (removed, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|r| filters.matches(r));
            *rows = kept;
            Ok(Value::Array(removed))
        }))
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Envelope, Failure> {
        if let Some(env) = self.enter().await? {
            return Ok(env);
        }
        let handler = lock(&self.functions).get(function).cloned();
        let result = match handler {
            Some(handler) => handler(&params),
            None => Err(BackendError::new(
                "PGRST202",
                format!("Could not find the function public.{function} in the schema cache"),
            )),
        };
        Ok(match result {
            Ok(data) => Envelope::ok(data),
            Err(err) => Envelope::err(err),
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn missing_table(table: &str) -> BackendError {
    BackendError::new("42P01", format!("relation \"public.{table}\" does not exist"))
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut out = Map::new();
    for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(value) = row.get(column) {
            out.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::classify::ErrorCategory;

    fn tarefas() -> MemoryClient {
        MemoryClient::new().with_table(
            "tarefas",
            vec![
                json!({"id": 1, "titulo": "Revisar cálculo", "status": "pendente", "tempo_estimado": 60}),
                json!({"id": 2, "titulo": "Lista de física", "status": "concluida", "tempo_estimado": 30}),
            ],
        )
    }

    #[tokio::test]
    async fn test_select_projects_filters_and_limits() {
        let client = tarefas();
        let env = client
            .select("tarefas", "id, titulo", &Filters::new().eq("status", json!("pendente")))
            .await
            .unwrap();
        assert_eq!(env.data, json!([{"id": 1, "titulo": "Revisar cálculo"}]));

        let env = client.select("tarefas", "*", &Filters::new().limit(1)).await.unwrap();
        assert_eq!(env.data.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_ids() {
        let client = tarefas();
        let env = client
            .insert("tarefas", json!({"id": 2, "titulo": "Outra"}))
            .await
            .unwrap();
        let failure = env.into_result().unwrap_err();
        assert_eq!(failure.category(), ErrorCategory::StorageValidationFailure);
        assert_eq!(client.rows("tarefas").unwrap().len(), 2);

        let env = client
            .insert("tarefas", json!([{"id": 3, "titulo": "A"}, {"id": 3, "titulo": "B"}]))
            .await
            .unwrap();
        let failure = env.into_result().unwrap_err();
        assert_eq!(failure.category(), ErrorCategory::StorageValidationFailure);
        assert_eq!(client.rows("tarefas").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_touch_matching_rows() {
        let client = tarefas();
        let filters = Filters::new().eq("id", json!(1));

        let env = client
            .update("tarefas", json!({"status": "concluida"}), &filters)
            .await
            .unwrap();
        assert_eq!(env.data[0]["status"], "concluida");

        let env = client.delete("tarefas", &filters).await.unwrap();
        assert_eq!(env.data.as_array().unwrap().len(), 1);
        let left = client.rows("tarefas").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["id"], 2);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let client = tarefas();
        client.fail_next(Failure::exception("TypeError", "Failed to fetch"));
        client.reject_next(BackendError::new("57014", "statement timeout"));

        let thrown = client.select("tarefas", "*", &Filters::new()).await;
        assert_eq!(thrown, Err(Failure::exception("TypeError", "Failed to fetch")));

        let rejected = client.select("tarefas", "*", &Filters::new()).await.unwrap();
        assert_eq!(rejected.error.unwrap().code, "57014");

        assert!(client.select("tarefas", "*", &Filters::new()).await.is_ok());
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_unknown_table_and_function() {
        let client = MemoryClient::new();
        let env = client.select("profiles", "id", &Filters::new()).await.unwrap();
        assert_eq!(env.error.unwrap().code, "42P01");

        client.register_rpc("get_streak", |_| Ok(json!(4)));
        assert_eq!(client.rpc("get_streak", json!({})).await.unwrap().data, json!(4));
        let env = client.rpc("get_badges", json!({})).await.unwrap();
        assert_eq!(env.error.unwrap().code, "PGRST202");
    }
}
