//! # Backend health probes.
//!
//! Each probe issues one cheap query through a [`DataClient`] and grades the
//! outcome by result and latency:
//!
//! | Service               | Query                       | Degraded above |
//! |-----------------------|-----------------------------|----------------|
//! | `supabase_connection` | `select id from profiles`   | 5 s            |
//! | `database_access`     | `select id from tarefas`    | 2 s            |
//! | `rls_policies`        | `select id from tarefas`    | 1 s            |
//!
//! The row-level-security probe also counts an authentication-shaped rejection as
//! healthy: it shows the policies are enforced.
//!
//! [`check_system_health`] runs all probes concurrently and aggregates them:
//! any `down` → `down`, else any `degraded` → `degraded`, else `healthy`.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::classify::ErrorCategory;
use crate::client::{DataClient, Filters};
use crate::error::Failure;

/// Health of one service or of the whole system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

impl HealthStatus {
    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub service: String,
    pub status: HealthStatus,
    #[serde(rename = "latency_ms", with = "millis")]
    pub latency: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    fn new(service: &str, status: HealthStatus, latency: Duration, error: Option<String>) -> Self {
        Self {
            service: service.to_string(),
            status,
            latency,
            error,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated health of every probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub checks: Vec<HealthCheckResult>,
    pub timestamp: DateTime<Utc>,
}

impl SystemHealth {
    /// Aggregates probe results.
    pub fn from_checks(checks: Vec<HealthCheckResult>) -> Self {
        Self {
            overall: aggregate(&checks),
            checks,
            timestamp: Utc::now(),
        }
    }

    /// Number of probes with `status`.
    pub fn count(&self, status: HealthStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

/// Worst status wins; no checks is healthy.
pub fn aggregate(checks: &[HealthCheckResult]) -> HealthStatus {
    if checks.iter().any(|c| c.status == HealthStatus::Down) {
        HealthStatus::Down
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

fn graded(latency: Duration, threshold: Duration) -> HealthStatus {
    if latency > threshold {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Runs `select id from <table> limit 1` and returns its outcome with the latency.
async fn timed_select<C>(client: &C, table: &str) -> (Result<(), Failure>, Duration)
where
    C: DataClient + ?Sized,
{
    let started = Instant::now();
    let res = client
        .select(table, "id", &Filters::new().limit(1))
        .await
        .and_then(|env| env.into_result().map(|_| ()));
    (res, started.elapsed())
}

async fn check_table<C>(client: &C, service: &str, table: &str, threshold: Duration) -> HealthCheckResult
where
    C: DataClient + ?Sized,
{
    match timed_select(client, table).await {
        (Ok(()), latency) => HealthCheckResult::new(service, graded(latency, threshold), latency, None),
        (Err(failure), latency) => HealthCheckResult::new(
            service,
            HealthStatus::Down,
            latency,
            Some(failure.as_message()),
        ),
    }
}

/// Can the backend be reached at all?
pub async fn check_connection<C>(client: &C) -> HealthCheckResult
where
    C: DataClient + ?Sized,
{
    check_table(client, "supabase_connection", "profiles", Duration::from_secs(5)).await
}

/// Can the main table be read?
pub async fn check_database_access<C>(client: &C) -> HealthCheckResult
where
    C: DataClient + ?Sized,
{
    check_table(client, "database_access", "tarefas", Duration::from_secs(2)).await
}

/// Are row-level security policies answering?
pub async fn check_rls_policies<C>(client: &C) -> HealthCheckResult
where
    C: DataClient + ?Sized,
{
    const SERVICE: &str = "rls_policies";
    match timed_select(client, "tarefas").await {
        (Ok(()), latency) => {
            HealthCheckResult::new(SERVICE, graded(latency, Duration::from_secs(1)), latency, None)
        }
        (Err(failure), latency) if is_auth_rejection(&failure) => {
            HealthCheckResult::new(SERVICE, HealthStatus::Healthy, latency, None)
        }
        (Err(failure), latency) => HealthCheckResult::new(
            SERVICE,
            HealthStatus::Down,
            latency,
            Some(failure.as_message()),
        ),
    }
}

fn is_auth_rejection(failure: &Failure) -> bool {
    matches!(
        failure.category(),
        ErrorCategory::AuthenticationRequired
            | ErrorCategory::SessionExpired
            | ErrorCategory::AccessDenied
    ) || failure.as_message().contains("JWT")
}

/// Runs every probe concurrently and aggregates the results.
pub async fn check_system_health<C>(client: &C) -> SystemHealth
where
    C: DataClient + ?Sized,
{
    let (connection, database, rls) = futures::join!(
        check_connection(client),
        check_database_access(client),
        check_rls_policies(client),
    );
    let health = SystemHealth::from_checks(vec![connection, database, rls]);

    tracing::info!(
        overall = %health.overall,
        healthy = health.count(HealthStatus::Healthy),
        degraded = health.count(HealthStatus::Degraded),
        down = health.count(HealthStatus::Down),
        "health check completed"
    );
    health
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::{BackendError, MemoryClient};

    fn backend() -> MemoryClient {
        MemoryClient::new()
            .with_table("profiles", vec![json!({"id": "u-1"})])
            .with_table("tarefas", vec![json!({"id": 1})])
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_backend_is_healthy() {
        let health = check_system_health(&backend()).await;
        assert_eq!(health.overall, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 3);
        assert_eq!(health.count(HealthStatus::Healthy), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_thresholds_differ_per_probe() {
        let client = backend().with_latency(Duration::from_millis(2_500));
        let health = check_system_health(&client).await;

        let status = |service: &str| {
            health
                .checks
                .iter()
                .find(|c| c.service == service)
                .map(|c| c.status)
        };
        assert_eq!(status("supabase_connection"), Some(HealthStatus::Healthy));
        assert_eq!(status("database_access"), Some(HealthStatus::Degraded));
        assert_eq!(status("rls_policies"), Some(HealthStatus::Degraded));
        assert_eq!(health.overall, HealthStatus::Degraded);
        assert!(health.checks.iter().all(|c| c.latency >= Duration::from_millis(2_500)));
    }

    #[tokio::test]
    async fn test_missing_table_takes_system_down() {
        let client = MemoryClient::new().with_table("profiles", vec![]);
        let health = check_system_health(&client).await;

        assert_eq!(health.overall, HealthStatus::Down);
        let database = &health.checks[1];
        assert_eq!(database.service, "database_access");
        assert!(database.error.as_deref().unwrap().starts_with("[42P01]"));
    }

    #[tokio::test]
    async fn test_rls_counts_auth_rejection_as_enforced() {
        let client = backend();
        client.reject_next(BackendError::new("PGRST301", "JWT expired"));
        assert_eq!(check_rls_policies(&client).await.status, HealthStatus::Healthy);

        client.fail_next(Failure::exception("TypeError", "Failed to fetch"));
        let res = check_rls_policies(&client).await;
        assert_eq!(res.status, HealthStatus::Down);
        assert_eq!(res.error.as_deref(), Some("TypeError: Failed to fetch"));
    }

    #[test]
    fn test_result_serializes_latency_in_millis() {
        let res = HealthCheckResult::new(
            "database_access",
            HealthStatus::Degraded,
            Duration::from_millis(2_100),
            None,
        );
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["latency_ms"], 2_100);
        assert!(json.get("error").is_none());
    }
}
