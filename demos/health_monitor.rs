//! # Example: health_monitor
//!
//! Demonstrates the backend health probes and the periodic [`HealthMonitor`].
//!
//! Shows how to:
//! - Run a one-off [`check_system_health`] and print it as JSON.
//! - Register a listener for overall status changes.
//! - Follow every completed check through [`HealthMonitor::subscribe`].
//!
//! ## Flow
//! ```text
//! HealthMonitor::start(client)
//!     └─► loop every interval:
//!           ├─► join!(check_connection, check_database_access, check_rls_policies)
//!           ├─► aggregate() ──► Healthy | Degraded | Down
//!           ├─► watch::Sender::send_replace(Some(health))   (subscribers)
//!           └─► overall changed? ──► listeners(&health)
//!
//! tick 1: Healthy                (first result, no listener call)
//! tick 2: Down                   (injected network failure) ──► listener
//! tick 3: Healthy                ──► listener
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example health_monitor
//! ```

use std::sync::Arc;
use std::time::Duration;

use opvisor::{Failure, HealthMonitor, MemoryClient, check_system_health};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Backend with both probed tables and a little latency
    let client = Arc::new(
        MemoryClient::new()
            .with_table("profiles", vec![json!({"id": "u-1", "nome": "Ana"})])
            .with_table("tarefas", vec![json!({"id": 1, "titulo": "Lista 3"})])
            .with_latency(Duration::from_millis(20)),
    );

    // 2. One-off check
    let health = check_system_health(client.as_ref()).await;
    println!("[main] one-off check:\n{}\n", serde_json::to_string_pretty(&health)?);

    // 3. Monitor with a short interval and a change listener
    let monitor = HealthMonitor::new(Duration::from_millis(500));
    monitor.add_listener(|health| {
        println!("[listener] overall is now {}", health.overall);
    });
    let mut updates = monitor.subscribe();
    monitor.start(Arc::clone(&client));

    // 4. Follow three checks; break the network before the second one
    for tick in 1..=3 {
        updates.changed().await?;
        let summary = updates
            .borrow_and_update()
            .as_ref()
            .map(|h| {
                let failing: Vec<&str> = h
                    .checks
                    .iter()
                    .filter(|c| c.error.is_some())
                    .map(|c| c.service.as_str())
                    .collect();
                format!("{} failing={failing:?}", h.overall)
            })
            .unwrap_or_default();
        println!("[main] tick {tick}: {summary}");

        if tick == 1 {
            client.fail_next(Failure::exception("TypeError", "Failed to fetch"));
        }
    }

    // 5. Stop; the last result stays readable
    monitor.stop().await;
    println!(
        "\n[main] stopped (running={}), last overall={}",
        monitor.is_running(),
        monitor.current().map(|h| h.overall.to_string()).unwrap_or_default()
    );
    Ok(())
}
