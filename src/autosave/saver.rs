//! # AutoSaver: debounced draft persistence.
//!
//! Each saver owns one background task holding a two-state timer:
//!
//! ```text
//!            save(d)                       save(d') (replaces d, restarts deadline)
//!   Idle ─────────────► Pending{deadline, d} ◄──┐
//!    ▲                    │   │   │             │
//!    │   deadline reached │   │   └─────────────┘
//!    ├────── write(d) ◄───┘   │
//!    │                        │ flush / force_save(d') / clear
//!    └────────────────────────┘
//!
//! shutdown(Flush) → write pending, stop
//! shutdown(Drop)  → discard pending, stop
//! drop(AutoSaver) → discard pending, stop
//! ```
//!
//! Commands reach the task over an unbounded channel; operations that report a
//! result (`force_save`, `flush`, `clear`, `shutdown`) wait on a oneshot reply.
//! Reads (`load`, `draft_info`, `cleanup_expired`) go straight to the store.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::autosave::draft::{
    self, DEFAULT_DEBOUNCE, DEFAULT_MAX_AGE, DRAFT_VERSION, DraftEnvelope, DraftStore,
};
use crate::error::DraftError;

/// What happens to a pending draft on shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitMode {
    /// Write the pending draft before stopping.
    Flush,
    /// Discard the pending draft.
    Drop,
}

/// Auto-save tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoSaveOptions {
    /// Quiet period before a debounced save is written.
    pub debounce: Duration,
    /// Drafts older than this are discarded.
    pub max_age: Duration,
    /// When false, saves are ignored and loads find nothing.
    pub enabled: bool,
}

impl Default for AutoSaveOptions {
    /// `debounce = 2s`, `max_age = 24h`, `enabled = true`.
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_age: DEFAULT_MAX_AGE,
            enabled: true,
        }
    }
}

/// Age and expiry of the current draft.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DraftInfo {
    pub saved_at: DateTime<Utc>,
    pub age: Duration,
    pub expired: bool,
}

type Reply = oneshot::Sender<Result<(), DraftError>>;

enum Command {
    Save(Value),
    ForceSave(Value, Reply),
    Flush(oneshot::Sender<Result<bool, DraftError>>),
    Clear(Reply),
    Shutdown(ExitMode, Reply),
}

enum State {
    Idle,
    Pending { deadline: Instant, draft: Value },
}

/// Shared between the handle and its task.
struct Slot {
    store: Arc<dyn DraftStore>,
    key: String,
    last_saved: Mutex<Option<DateTime<Utc>>>,
}

impl Slot {
    fn last_saved(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, draft: Value) -> Result<(), DraftError> {
        let envelope = DraftEnvelope::new(draft);
        let raw = serde_json::to_string(&envelope)?;
        self.store.set(&self.key, &raw)?;
        *self.last_saved() = envelope.saved_at();
        tracing::debug!(key = %self.key, timestamp = envelope.timestamp, "draft saved");
        Ok(())
    }

    fn remove(&self) -> Result<(), DraftError> {
        self.store.remove(&self.key)?;
        *self.last_saved() = None;
        Ok(())
    }

    /// Reads the stored envelope, removing it if expired, foreign or corrupted.
    fn read(&self, max_age: Duration) -> Result<Option<DraftEnvelope<Value>>, DraftError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        let envelope = match serde_json::from_str::<DraftEnvelope<Value>>(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(key = %self.key, error = %e, "corrupted draft removed");
                self.remove()?;
                return Ok(None);
            }
        };
        if envelope.is_expired(max_age) {
            tracing::info!(key = %self.key, age_ms = envelope.age().as_millis() as u64, "expired draft removed");
            self.remove()?;
            return Ok(None);
        }
        if envelope.version != DRAFT_VERSION {
            tracing::warn!(
                key = %self.key,
                version = %envelope.version,
                expected = DRAFT_VERSION,
                "incompatible draft removed"
            );
            self.remove()?;
            return Ok(None);
        }
        Ok(Some(envelope))
    }
}

/// Debounced draft writer for one form.
///
/// Must be created inside a tokio runtime. Dropping the saver discards a pending
/// draft; call [`shutdown`](Self::shutdown) to choose explicitly.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use opvisor::{AutoSaver, ExitMode, MemoryDraftStore};
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let store = Arc::new(MemoryDraftStore::new());
/// let saver = AutoSaver::<serde_json::Value>::new("nova_tarefa", store);
///
/// saver.save(json!({"titulo": "Revisar derivadas"})).unwrap();
/// saver.shutdown(ExitMode::Flush).await.unwrap();
///
/// assert_eq!(saver.load().unwrap(), Some(json!({"titulo": "Revisar derivadas"})));
/// # }
/// ```
pub struct AutoSaver<T> {
    slot: Arc<Slot>,
    options: AutoSaveOptions,
    commands: mpsc::UnboundedSender<Command>,
    _draft: PhantomData<fn(T) -> T>,
}

impl<T> AutoSaver<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Saver for draft `key` with default options.
    pub fn new(key: &str, store: Arc<dyn DraftStore>) -> Self {
        Self::with_options(key, store, AutoSaveOptions::default())
    }

    /// Saver for the form `form_key` (draft key `form_<form_key>`).
    pub fn for_form(form_key: &str, store: Arc<dyn DraftStore>, options: AutoSaveOptions) -> Self {
        Self::with_options(&format!("form_{form_key}"), store, options)
    }

    /// Saver for draft `key`.
    ///
    /// Picks up the timestamp of an existing draft and removes stale drafts of
    /// every key from the store.
    pub fn with_options(key: &str, store: Arc<dyn DraftStore>, options: AutoSaveOptions) -> Self {
        let slot = Arc::new(Slot {
            store,
            key: draft::storage_key(key),
            last_saved: Mutex::new(None),
        });

        match slot.read(options.max_age) {
            Ok(existing) => *slot.last_saved() = existing.and_then(|e| e.saved_at()),
            Err(e) => tracing::error!(key = %slot.key, error = %e, "draft lookup failed"),
        }
        if let Err(e) = draft::cleanup_expired(slot.store.as_ref(), options.max_age) {
            tracing::error!(error = %e, "draft cleanup failed");
        }

        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(Arc::clone(&slot), options.debounce, rx));

        Self {
            slot,
            options,
            commands,
            _draft: PhantomData,
        }
    }

    /// Full storage key (`autosave_...`).
    pub fn storage_key(&self) -> &str {
        &self.slot.key
    }

    pub fn options(&self) -> AutoSaveOptions {
        self.options
    }

    /// Schedules `draft` to be written after the debounce period.
    ///
    /// A later save replaces it and restarts the period.
    pub fn save(&self, draft: T) -> Result<(), DraftError> {
        if !self.options.enabled {
            return Ok(());
        }
        let draft = serde_json::to_value(draft)?;
        self.send(Command::Save(draft))
    }

    /// Cancels any pending draft and writes `draft` now.
    pub async fn force_save(&self, draft: T) -> Result<(), DraftError> {
        if !self.options.enabled {
            return Ok(());
        }
        let draft = serde_json::to_value(draft)?;
        let (tx, rx) = oneshot::channel();
        self.send(Command::ForceSave(draft, tx))?;
        rx.await.map_err(|_| DraftError::WorkerStopped)?
    }

    /// Writes the pending draft now. Returns false if nothing was pending.
    pub async fn flush(&self) -> Result<bool, DraftError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| DraftError::WorkerStopped)?
    }

    /// Discards the pending draft and removes the stored one.
    pub async fn clear(&self) -> Result<(), DraftError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Clear(tx))?;
        rx.await.map_err(|_| DraftError::WorkerStopped)??;
        tracing::info!(key = %self.slot.key, "draft cleared");
        Ok(())
    }

    /// Stops the background task, writing or discarding the pending draft.
    ///
    /// Later saves fail with [`DraftError::WorkerStopped`]; reads still work.
    pub async fn shutdown(&self, mode: ExitMode) -> Result<(), DraftError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(mode, tx))?;
        rx.await.map_err(|_| DraftError::WorkerStopped)?
    }

    /// Stored draft, if present, fresh and of the current version.
    ///
    /// Expired, incompatible and undecodable drafts are removed.
    pub fn load(&self) -> Result<Option<T>, DraftError> {
        if !self.options.enabled {
            return Ok(None);
        }
        let Some(envelope) = self.slot.read(self.options.max_age)? else {
            return Ok(None);
        };
        let saved_at = envelope.saved_at();
        match serde_json::from_value::<T>(envelope.data) {
            Ok(data) => {
                *self.slot.last_saved() = saved_at;
                tracing::info!(key = %self.slot.key, "draft restored");
                Ok(Some(data))
            }
            Err(e) => {
                tracing::error!(key = %self.slot.key, error = %e, "undecodable draft removed");
                self.slot.remove()?;
                Ok(None)
            }
        }
    }

    /// True once a draft has been written or restored and not cleared.
    pub fn has_draft(&self) -> bool {
        self.slot.last_saved().is_some()
    }

    /// Age of the last written or restored draft.
    pub fn draft_info(&self) -> Option<DraftInfo> {
        let saved_at = (*self.slot.last_saved())?;
        let age = draft::age_since(saved_at.timestamp_millis());
        Some(DraftInfo {
            saved_at,
            age,
            expired: age > self.options.max_age,
        })
    }

    /// Removes stale drafts of every key; returns how many were removed.
    pub fn cleanup_expired(&self) -> Result<usize, DraftError> {
        draft::cleanup_expired(self.slot.store.as_ref(), self.options.max_age)
    }

    fn send(&self, command: Command) -> Result<(), DraftError> {
        self.commands
            .send(command)
            .map_err(|_| DraftError::WorkerStopped)
    }
}

impl AutoSaver<Value> {
    /// Schedules the non-empty fields of `form`.
    ///
    /// Empty strings and nulls are skipped; returns false, and saves nothing,
    /// when no field remains.
    pub fn save_form(&self, form: &Map<String, Value>) -> Result<bool, DraftError> {
        let filled: Map<String, Value> = form
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Null) && v.as_str() != Some(""))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if filled.is_empty() {
            return Ok(false);
        }
        self.save(Value::Object(filled))?;
        Ok(true)
    }
}

impl<T> std::fmt::Debug for AutoSaver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSaver")
            .field("key", &self.slot.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

async fn run(slot: Arc<Slot>, debounce: Duration, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut state = State::Idle;

    loop {
        let deadline = match &state {
            State::Idle => None,
            State::Pending { deadline, .. } => Some(*deadline),
        };
        let command = match deadline {
            None => rx.recv().await,
            Some(deadline) => {
                tokio::select! {
                    command = rx.recv() => command,
                    _ = time::sleep_until(deadline) => {
                        if let State::Pending { draft, .. } = std::mem::replace(&mut state, State::Idle) {
                            if let Err(e) = slot.write(draft) {
                                tracing::error!(key = %slot.key, error = %e, "debounced draft save failed");
                            }
                        }
                        continue;
                    }
                }
            }
        };

        // Every handle is gone: the pending draft is dropped.
        let Some(command) = command else {
            break;
        };

        match command {
            Command::Save(draft) => {
                state = State::Pending {
                    deadline: Instant::now() + debounce,
                    draft,
                };
            }
            Command::ForceSave(draft, reply) => {
                state = State::Idle;
                let _ = reply.send(slot.write(draft));
            }
            Command::Flush(reply) => {
                let res = match std::mem::replace(&mut state, State::Idle) {
                    State::Pending { draft, .. } => slot.write(draft).map(|()| true),
                    State::Idle => Ok(false),
                };
                let _ = reply.send(res);
            }
            Command::Clear(reply) => {
                state = State::Idle;
                let _ = reply.send(slot.remove());
            }
            Command::Shutdown(mode, reply) => {
                let res = match (mode, std::mem::replace(&mut state, State::Idle)) {
                    (ExitMode::Flush, State::Pending { draft, .. }) => slot.write(draft),
                    _ => Ok(()),
                };
                let _ = reply.send(res);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::autosave::draft::{FileDraftStore, MemoryDraftStore};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Form {
        titulo: String,
        tempo_estimado: Option<u32>,
    }

    fn form(titulo: &str) -> Form {
        Form {
            titulo: titulo.to_string(),
            tempo_estimado: Some(45),
        }
    }

    fn stored(store: &MemoryDraftStore, key: &str) -> Option<Value> {
        let raw = store.get(key).unwrap()?;
        let envelope: DraftEnvelope<Value> = serde_json::from_str(&raw).unwrap();
        Some(envelope.data)
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_save_replaces_pending_and_restarts_deadline() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::new("nova_tarefa", store.clone());

        saver.save(form("Rev")).unwrap();
        time::sleep(Duration::from_secs(1)).await;
        saver.save(form("Revisar derivadas")).unwrap();

        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(stored(&store, "autosave_nova_tarefa"), None);
        assert!(!saver.has_draft());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            stored(&store, "autosave_nova_tarefa"),
            Some(json!({"titulo": "Revisar derivadas", "tempo_estimado": 45}))
        );
        assert!(saver.has_draft());
        assert_eq!(saver.load().unwrap(), Some(form("Revisar derivadas")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_cancels_pending_draft() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::new("sessao", store.clone());

        saver.save(form("pending")).unwrap();
        saver.force_save(form("forced")).await.unwrap();
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(saver.load().unwrap(), Some(form("forced")));
        assert!(!saver.flush().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending_immediately() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::new("sessao", store.clone());

        saver.save(form("agora")).unwrap();
        assert!(saver.flush().await.unwrap());
        assert_eq!(saver.load().unwrap(), Some(form("agora")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flush_or_drop() {
        let store = Arc::new(MemoryDraftStore::new());

        let kept = AutoSaver::new("kept", store.clone());
        kept.save(form("kept")).unwrap();
        kept.shutdown(ExitMode::Flush).await.unwrap();
        assert_eq!(kept.load().unwrap(), Some(form("kept")));
        assert!(matches!(
            kept.save(form("late")),
            Err(DraftError::WorkerStopped)
        ));

        let dropped = AutoSaver::new("dropped", store.clone());
        dropped.save(form("dropped")).unwrap();
        dropped.shutdown(ExitMode::Drop).await.unwrap();
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(dropped.load().unwrap(), None::<Form>);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_saver_discards_pending_draft() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::new("descartado", store.clone());
        saver.save(form("x")).unwrap();
        drop(saver);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get("autosave_descartado").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_discards_foreign_and_corrupted_drafts() {
        let store = Arc::new(MemoryDraftStore::new());
        let mut foreign = DraftEnvelope::new(json!({"titulo": "v0"}));
        foreign.version = "0.9.0".into();
        store
            .set("autosave_old_version", &serde_json::to_string(&foreign).unwrap())
            .unwrap();
        store
            .set("autosave_wrong_shape", r#"{"data":[1,2],"timestamp":0,"version":"1.0.0"}"#)
            .unwrap();

        let saver = AutoSaver::<Form>::new("old_version", store.clone());
        assert!(!saver.has_draft());
        assert_eq!(saver.load().unwrap(), None);
        assert_eq!(store.get("autosave_old_version").unwrap(), None);
        // timestamp 0 is long expired: removed by the constructor's cleanup
        assert_eq!(store.get("autosave_wrong_shape").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_payload_is_removed_on_load() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::<Value>::new("shape", store.clone());
        saver.force_save(json!([1, 2, 3])).await.unwrap();

        let typed = AutoSaver::<Form>::new("shape", store.clone());
        assert!(typed.has_draft());
        assert_eq!(typed.load().unwrap(), None);
        assert_eq!(store.get("autosave_shape").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_form_skips_empty_fields() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::for_form("nova_tarefa", store.clone(), AutoSaveOptions::default());
        assert_eq!(saver.storage_key(), "autosave_form_nova_tarefa");

        let empty = json!({"titulo": "", "descricao": null});
        assert!(!saver.save_form(empty.as_object().unwrap()).unwrap());

        let partial = json!({"titulo": "Lista 3", "descricao": "", "prioridade": "alta", "tempo": 0});
        assert!(saver.save_form(partial.as_object().unwrap()).unwrap());
        saver.flush().await.unwrap();

        assert_eq!(
            stored(&store, "autosave_form_nova_tarefa"),
            Some(json!({"titulo": "Lista 3", "prioridade": "alta", "tempo": 0}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_draft_info() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileDraftStore::open(dir.path()).unwrap());
        let saver = AutoSaver::new("checklist", store.clone());
        assert_eq!(saver.draft_info(), None);

        saver.force_save(form("Topicos")).await.unwrap();
        let info = saver.draft_info().unwrap();
        assert!(!info.expired);
        assert!(info.age < Duration::from_secs(60));

        saver.clear().await.unwrap();
        assert_eq!(saver.draft_info(), None);
        assert_eq!(store.get("autosave_checklist").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_saver_ignores_saves() {
        let store = Arc::new(MemoryDraftStore::new());
        let options = AutoSaveOptions {
            enabled: false,
            ..AutoSaveOptions::default()
        };
        let saver = AutoSaver::with_options("off", store.clone(), options);
        saver.save(form("x")).unwrap();
        saver.force_save(form("y")).await.unwrap();
        assert!(!saver.flush().await.unwrap());
        assert_eq!(store.keys().unwrap(), Vec::<String>::new());
        assert_eq!(saver.load().unwrap(), None);
    }
}
