//! # HealthMonitor: periodic system health checks.
//!
//! Runs [`check_system_health`] on a background task: once immediately, then every
//! `interval` (default 60 s). The latest result is published on a
//! `tokio::sync::watch` channel; listeners are called only when the overall
//! status changes from one check to the next.
//!
//! ```text
//! start(client) ──► spawn ──► loop {
//!                               ├─► tick (first one immediate)
//!                               ├─► check_system_health(client)
//!                               ├─► watch::send_replace(Some(health))
//!                               └─► previous.overall != health.overall ─► listeners
//!                             }
//! stop() ──► cancel token ──► await task
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::DataClient;
use crate::health::{SystemHealth, check_system_health};
use crate::observers::panic_message;

/// Default period between checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Handle returned by [`HealthMonitor::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SystemHealth) + Send + Sync>;

struct Shared {
    latest: watch::Sender<Option<SystemHealth>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl Shared {
    fn record(&self, health: SystemHealth) {
        let previous = self
            .latest
            .send_replace(Some(health.clone()))
            .map(|h| h.overall);

        let Some(previous) = previous else {
            return;
        };
        if previous == health.overall {
            return;
        }
        tracing::warn!(
            previous = %previous,
            current = %health.overall,
            "health status changed"
        );

        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(&health))) {
                tracing::warn!(panic = %panic_message(payload.as_ref()), "health listener panicked");
            }
        }
    }
}

/// Periodic health checker.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use serde_json::json;
/// use opvisor::{HealthMonitor, HealthStatus, MemoryClient};
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let client = Arc::new(
///     MemoryClient::new()
///         .with_table("profiles", vec![json!({"id": "u-1"})])
///         .with_table("tarefas", vec![]),
/// );
/// let monitor = HealthMonitor::new(Duration::from_secs(30));
/// let mut updates = monitor.subscribe();
///
/// monitor.start(client);
/// updates.changed().await.unwrap();
/// assert_eq!(monitor.current().unwrap().overall, HealthStatus::Healthy);
///
/// monitor.stop().await;
/// # }
/// ```
pub struct HealthMonitor {
    interval: Duration,
    shared: Arc<Shared>,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl HealthMonitor {
    /// Creates a stopped monitor checking every `interval`.
    ///
    /// A zero interval is raised to one millisecond.
    pub fn new(interval: Duration) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            interval: interval.max(Duration::from_millis(1)),
            shared: Arc::new(Shared {
                latest,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
            running: Mutex::new(None),
        }
    }

    /// Period between checks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Registers a callback for overall status changes.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SystemHealth) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener; false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Last completed check.
    pub fn current(&self) -> Option<SystemHealth> {
        self.shared.latest.borrow().clone()
    }

    /// Receiver notified after every completed check.
    pub fn subscribe(&self) -> watch::Receiver<Option<SystemHealth>> {
        self.shared.latest.subscribe()
    }

    /// True while the background task runs.
    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Starts checking `client`. Returns false if already running.
    ///
    /// Must be called within a tokio runtime.
    pub fn start<C: DataClient>(&self, client: Arc<C>) -> bool {
        let mut running = lock(&self.running);
        if running.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            client,
            Arc::clone(&self.shared),
            self.interval,
            token.clone(),
        ));
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "health monitor started");
        *running = Some((token, handle));
        true
    }

    /// Stops the background task and waits for it to exit.
    ///
    /// An in-flight check is abandoned. The last result stays readable.
    pub async fn stop(&self) {
        let running = lock(&self.running).take();
        let Some((token, handle)) = running else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "health monitor task ended abnormally");
        }
        tracing::info!("health monitor stopped");
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some((token, _)) = lock(&self.running).take() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn run<C: DataClient>(
    client: Arc<C>,
    shared: Arc<Shared>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let health = tokio::select! {
            _ = token.cancelled() => break,
            health = check_system_health(client.as_ref()) => health,
        };
        shared.record(health);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::MemoryClient;
    use crate::error::Failure;
    use crate::health::HealthStatus;

    fn backend() -> Arc<MemoryClient> {
        Arc::new(
            MemoryClient::new()
                .with_table("profiles", vec![json!({"id": "u-1"})])
                .with_table("tarefas", vec![json!({"id": 1})]),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_listeners_fire_only_on_status_change() {
        let client = backend();
        let monitor = HealthMonitor::new(Duration::from_secs(60));
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        monitor.add_listener(move |h: &SystemHealth| sink.lock().unwrap().push(h.overall));
        let mut updates = monitor.subscribe();

        assert!(monitor.start(Arc::clone(&client)));
        assert!(!monitor.start(Arc::clone(&client)));

        // first check: no previous status, nothing to report
        updates.changed().await.unwrap();
        assert_eq!(monitor.current().unwrap().overall, HealthStatus::Healthy);

        for _ in 0..3 {
            client.fail_next(Failure::exception("TypeError", "Failed to fetch"));
        }
        updates.changed().await.unwrap();
        assert_eq!(monitor.current().unwrap().overall, HealthStatus::Down);

        updates.changed().await.unwrap();
        updates.changed().await.unwrap();

        assert_eq!(
            *changes.lock().unwrap(),
            vec![HealthStatus::Down, HealthStatus::Healthy]
        );
        assert_eq!(client.calls(), 12);

        monitor.stop().await;
        assert!(!monitor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_listener_is_not_called() {
        let client = backend();
        let monitor = HealthMonitor::new(Duration::from_secs(10));
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let id = monitor.add_listener(move |_: &SystemHealth| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(monitor.remove_listener(id));
        assert!(!monitor.remove_listener(id));

        let mut updates = monitor.subscribe();
        monitor.start(Arc::clone(&client));
        updates.changed().await.unwrap();
        for _ in 0..3 {
            client.fail_next(Failure::message("Network request failed"));
        }
        updates.changed().await.unwrap();

        assert_eq!(monitor.current().unwrap().overall, HealthStatus::Down);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_last_result_and_allows_restart() {
        let client = backend();
        let monitor = HealthMonitor::new(Duration::from_secs(5));
        let mut updates = monitor.subscribe();

        monitor.start(Arc::clone(&client));
        updates.changed().await.unwrap();
        monitor.stop().await;
        monitor.stop().await;

        let calls = client.calls();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.calls(), calls);
        assert!(monitor.current().is_some());

        assert!(monitor.start(client));
        assert!(monitor.is_running());
        monitor.stop().await;
    }
}
