//! # Example: draft_autosave
//!
//! Demonstrates debounced form drafts backed by files.
//!
//! Shows how to:
//! - Attach an [`AutoSaver`] to a form on a [`FileDraftStore`].
//! - Coalesce rapid edits into a single write.
//! - Restore the draft in a new session, validate it, and clear it on submit.
//!
//! ## Flow
//! ```text
//! session 1
//!   save_form(t)  save_form(t+100ms)  save_form(t+200ms)
//!        └──────────────┴─────────────────┴──► (quiet for debounce) ──► write
//!   shutdown(ExitMode::Flush)
//!
//! session 2
//!   AutoSaver::for_form() ──► cleanup_expired() ──► load()
//!        ├─► validate_task() ──► Ok(ValidTask) ──► clear()
//!        └─► Err(report)     ──► keep the draft
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=opvisor=debug cargo run --example draft_autosave
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use opvisor::drafts;
use opvisor::{AutoSaveOptions, AutoSaver, DraftStore, ExitMode, FileDraftStore, TaskDraft, validate_task};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

fn form(fields: Value) -> Map<String, Value> {
    match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("opvisor=info")),
        )
        .init();

    // 1. File-backed store in a scratch directory
    let dir = tempfile::tempdir()?;
    let store: Arc<dyn DraftStore> = Arc::new(FileDraftStore::open(dir.path())?);
    let options = AutoSaveOptions {
        debounce: Duration::from_millis(300),
        ..AutoSaveOptions::default()
    };

    // 2. Session 1: three quick edits, one write
    let due = (Utc::now().date_naive() + Days::new(3)).to_string();
    {
        let saver = AutoSaver::<Value>::for_form("nova_tarefa", Arc::clone(&store), options);
        for title in ["Rev", "Revisar", "Revisar derivadas"] {
            saver.save_form(&form(json!({
                "title": title,
                "description": "",
                "category": "estudo",
                "priority": "alta",
                "estimated_minutes": 45,
                "due_date": due,
            })))?;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        println!("[session 1] pending, has_draft={}", saver.has_draft());

        tokio::time::sleep(Duration::from_millis(400)).await;
        println!("[session 1] written, info={:?}", saver.draft_info());
        saver.shutdown(ExitMode::Flush).await?;
    }

    let stats = drafts::stats(store.as_ref())?;
    println!("[store] {} draft(s), {} bytes", stats.count, stats.total_size_bytes);

    // 3. Session 2: restore, validate, submit
    let saver = AutoSaver::<Value>::for_form("nova_tarefa", Arc::clone(&store), options);
    let Some(restored) = saver.load()? else {
        println!("[session 2] nothing to restore");
        return Ok(());
    };
    println!("[session 2] restored {restored}");

    let draft: TaskDraft = serde_json::from_value(restored)?;
    match validate_task(&draft, Utc::now().date_naive()) {
        Ok(task) => {
            println!("[session 2] submitting {}", serde_json::to_string(&task)?);
            saver.clear().await?;
        }
        Err(report) => {
            for err in report.errors() {
                println!("[session 2] invalid {err}");
            }
        }
    }

    println!(
        "[store] remaining drafts: {:?}",
        drafts::all_keys(store.as_ref())?
    );
    saver.shutdown(ExitMode::Drop).await?;
    Ok(())
}
