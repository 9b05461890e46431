//! # RetryClient: CRUD facade over the retry executor.
//!
//! Wraps every [`DataClient`] call in [`RetryExecutor::execute`]:
//!
//! ```text
//! insert/update/select/delete/rpc(.., policy)
//!        │
//!        ▼
//! RetryExecutor::execute("insert into tarefas", op, policy.unwrap_or(default))
//!        │
//!        └─► op() = client.insert(..).await?.into_result()
//!                     │                        │
//!                  thrown error          Envelope{error} ──► Failure::Backend
//! ```
//!
//! Both failure shapes surface as a [`Failure`] inside the retried closure, so the
//! classifier decides uniformly. Only the payload is returned to the caller.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{DataClient, Filters};
use crate::core::RetryExecutor;
use crate::error::Failure;
use crate::policies::RetryPolicy;

/// Retrying facade over a shared [`DataClient`].
///
/// `policy = None` uses the executor's default preset (`standard` unless configured).
pub struct RetryClient<C: DataClient> {
    client: Arc<C>,
    executor: RetryExecutor,
}

impl<C: DataClient> Clone for RetryClient<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            executor: self.executor.clone(),
        }
    }
}

impl<C: DataClient> RetryClient<C> {
    /// Creates a facade over `client`.
    pub fn new(client: Arc<C>, executor: RetryExecutor) -> Self {
        Self { client, executor }
    }

    /// Underlying client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Executor running the calls.
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    fn policy(&self, policy: Option<RetryPolicy>) -> RetryPolicy {
        policy.unwrap_or_else(|| self.executor.config().default_policy())
    }

    /// Inserts one row or an array of rows.
    pub async fn insert<R>(
        &self,
        table: &str,
        rows: &R,
        policy: Option<RetryPolicy>,
    ) -> Result<Value, Failure>
    where
        R: Serialize + ?Sized,
    {
        let rows = encode(rows)?;
        self.executor
            .execute(
                &format!("insert into {table}"),
                || {
                    let rows = rows.clone();
                    async move { self.client.insert(table, rows).await?.into_result() }
                },
                self.policy(policy),
            )
            .await
    }

    /// Updates rows matching `filters` with `values`.
    pub async fn update<V>(
        &self,
        table: &str,
        values: &V,
        filters: &Filters,
        policy: Option<RetryPolicy>,
    ) -> Result<Value, Failure>
    where
        V: Serialize + ?Sized,
    {
        let values = encode(values)?;
        self.executor
            .execute(
                &format!("update {table}"),
                || {
                    let values = values.clone();
                    async move {
                        self.client
                            .update(table, values, filters)
                            .await?
                            .into_result()
                    }
                },
                self.policy(policy),
            )
            .await
    }

    /// Selects `columns` of rows matching `filters`.
    pub async fn select(
        &self,
        table: &str,
        columns: &str,
        filters: &Filters,
        policy: Option<RetryPolicy>,
    ) -> Result<Value, Failure> {
        self.executor
            .execute(
                &format!("select from {table}"),
                || async move {
                    self.client
                        .select(table, columns, filters)
                        .await?
                        .into_result()
                },
                self.policy(policy),
            )
            .await
    }

    /// [`select`](Self::select) decoding the rows into `T`.
    ///
    /// A payload that does not decode fails with `Failure::Exception{name: "DecodeError"}`
    /// and is not retried.
    pub async fn select_as<T>(
        &self,
        table: &str,
        columns: &str,
        filters: &Filters,
        policy: Option<RetryPolicy>,
    ) -> Result<Vec<T>, Failure>
    where
        T: DeserializeOwned,
    {
        decode(self.select(table, columns, filters, policy).await?)
    }

    /// Deletes rows matching `filters`.
    pub async fn delete(
        &self,
        table: &str,
        filters: &Filters,
        policy: Option<RetryPolicy>,
    ) -> Result<Value, Failure> {
        self.executor
            .execute(
                &format!("delete from {table}"),
                || async move { self.client.delete(table, filters).await?.into_result() },
                self.policy(policy),
            )
            .await
    }

    /// Calls a stored function.
    pub async fn rpc<P>(
        &self,
        function: &str,
        params: &P,
        policy: Option<RetryPolicy>,
    ) -> Result<Value, Failure>
    where
        P: Serialize + ?Sized,
    {
        let params = encode(params)?;
        self.executor
            .execute(
                &format!("rpc {function}"),
                || {
                    let params = params.clone();
                    async move { self.client.rpc(function, params).await?.into_result() }
                },
                self.policy(policy),
            )
            .await
    }

    /// [`rpc`](Self::rpc) decoding the result into `T`.
    pub async fn rpc_as<T, P>(
        &self,
        function: &str,
        params: &P,
        policy: Option<RetryPolicy>,
    ) -> Result<T, Failure>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        decode(self.rpc(function, params, policy).await?)
    }

    /// Single-attempt probe: can `profiles` be read?
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .select("profiles", "id", &Filters::new().limit(1))
            .await
        {
            Ok(env) => env.error.is_none(),
            Err(_) => false,
        }
    }
}

impl<C: DataClient> std::fmt::Debug for RetryClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryClient")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

fn encode<S: Serialize + ?Sized>(value: &S) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(|e| Failure::exception("EncodeError", e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Failure> {
    serde_json::from_value(value).map_err(|e| Failure::exception("DecodeError", e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::client::{BackendError, MemoryClient};
    use crate::config::Config;
    use crate::observers::ObserverSet;
    use crate::policies::{FixedJitter, PolicyPreset};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Topico {
        id: u32,
        nome: String,
    }

    fn facade(client: MemoryClient) -> RetryClient<MemoryClient> {
        let exec = RetryExecutor::new(Config::default())
            .with_observers(ObserverSet::default())
            .with_jitter(FixedJitter(1.0));
        RetryClient::new(Arc::new(client), exec)
    }

    fn topicos() -> MemoryClient {
        MemoryClient::new().with_table(
            "topicos",
            vec![
                json!({"id": 1, "nome": "Derivadas", "concluido": false}),
                json!({"id": 2, "nome": "Integrais", "concluido": true}),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_envelope_errors_are_retried_like_thrown_ones() {
        let api = facade(topicos());
        api.client().fail_next(Failure::exception("TypeError", "Failed to fetch"));
        api.client()
            .reject_next(BackendError::new("08006", "connection failure"));

        let rows: Vec<Topico> = api
            .select_as("topicos", "id,nome", &Filters::new().eq("concluido", json!(false)), None)
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![Topico {
                id: 1,
                nome: "Derivadas".into()
            }]
        );
        assert_eq!(api.client().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_insert_is_not_retried() {
        let api = facade(topicos());
        let res = api
            .insert(
                "topicos",
                &json!({"id": 2, "nome": "Integrais"}),
                Some(PolicyPreset::Critical.policy()),
            )
            .await;

        let failure = res.unwrap_err();
        assert!(matches!(&failure, Failure::Backend { code, .. } if code == "23505"));
        assert_eq!(api.client().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_delete_and_rpc_return_payloads() {
        let api = facade(topicos());
        api.client()
            .register_rpc("get_streak", |params| Ok(json!({"dias": params["base"]})));

        let updated = api
            .update(
                "topicos",
                &json!({"concluido": true}),
                &Filters::new().eq("id", json!(1)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated[0]["concluido"], true);

        let removed = api
            .delete("topicos", &Filters::new().eq("concluido", json!(true)), None)
            .await
            .unwrap();
        assert_eq!(removed.as_array().unwrap().len(), 2);

        #[derive(Deserialize)]
        struct Streak {
            dias: u32,
        }
        let streak: Streak = api
            .rpc_as("get_streak", &json!({"base": 5}), None)
            .await
            .unwrap();
        assert_eq!(streak.dias, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_errors_surface_as_exceptions() {
        let api = facade(topicos());
        let res: Result<Vec<u32>, _> = api.select_as("topicos", "*", &Filters::new(), None).await;
        assert!(matches!(res, Err(Failure::Exception { name, .. }) if name == "DecodeError"));
        assert_eq!(api.client().calls(), 1);
    }

    #[tokio::test]
    async fn test_health_check_probes_profiles_once() {
        let api = facade(topicos());
        assert!(!api.health_check().await);

        let api = facade(MemoryClient::new().with_table("profiles", vec![json!({"id": "u-1"})]));
        assert!(api.health_check().await);
        api.client().fail_next(Failure::message("Network request failed"));
        assert!(!api.health_check().await);
        assert_eq!(api.client().calls(), 2);
    }
}
