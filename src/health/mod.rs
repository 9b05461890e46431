//! # Backend health checks.
//!
//! - [`check`]: probes and aggregation ([`check_system_health`]);
//! - [`monitor`]: [`HealthMonitor`], periodic checks with change listeners.

mod check;
mod monitor;

pub use check::{
    HealthCheckResult, HealthStatus, SystemHealth, aggregate, check_connection,
    check_database_access, check_rls_policies, check_system_health,
};
pub use monitor::{DEFAULT_INTERVAL, HealthMonitor, ListenerId};
