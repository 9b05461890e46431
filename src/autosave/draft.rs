//! # Draft envelopes and draft stores.
//!
//! A draft is stored under `autosave_<key>` as a JSON envelope:
//!
//! ```text
//! {"data": <form>, "timestamp": 1710079331532, "version": "1.0.0"}
//! ```
//!
//! `timestamp` is milliseconds since the Unix epoch. Drafts older than the
//! configured max age (24 h by default), written by another version, or not
//! decodable are treated as absent and removed when read.
//!
//! Two [`DraftStore`]s are provided:
//! - [`MemoryDraftStore`]: a map behind a mutex;
//! - [`FileDraftStore`]: one `<key>.json` file per draft inside a directory.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DraftError;

/// Prefix of every draft key in a store.
pub const STORAGE_PREFIX: &str = "autosave_";
/// Envelope version written and accepted.
pub const DRAFT_VERSION: &str = "1.0.0";
/// Age after which a draft is discarded.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
/// Quiet period before a debounced save is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Stored form of a draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftEnvelope<T> {
    pub data: T,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub version: String,
}

impl<T> DraftEnvelope<T> {
    /// Wraps `data` with the current time and version.
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Utc::now().timestamp_millis(),
            version: DRAFT_VERSION.to_string(),
        }
    }

    /// Time the draft was written.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Time since the draft was written (zero if in the future).
    pub fn age(&self) -> Duration {
        age_since(self.timestamp)
    }

    /// True if older than `max_age`.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

pub(crate) fn age_since(timestamp_ms: i64) -> Duration {
    let elapsed = Utc::now().timestamp_millis().saturating_sub(timestamp_ms);
    Duration::from_millis(u64::try_from(elapsed).unwrap_or(0))
}

/// Storage key of draft `key`.
pub fn storage_key(key: &str) -> String {
    format!("{STORAGE_PREFIX}{key}")
}

/// # Key/value storage for drafts.
///
/// Keys are full storage keys (`autosave_...`). Implementations must tolerate
/// removing a missing key.
pub trait DraftStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError>;

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError>;

    fn remove(&self, key: &str) -> Result<(), DraftError>;

    /// Every key currently stored, draft or not.
    fn keys(&self) -> Result<Vec<String>, DraftError>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, DraftError> {
        Ok(self.entries().keys().cloned().collect())
    }
}

/// Directory-backed store: `<dir>/<key>.json`.
///
/// Bytes of a key outside `[A-Za-z0-9_-]` are written as `%XX` in the file name,
/// so distinct keys never share a file.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    /// Opens the store, creating `dir` if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(key)))
    }
}

/// Escapes `name` into a file stem: `[A-Za-z0-9_-]` is kept, every other byte
/// becomes `%XX`. The mapping is injective and reversed by [`decode_file_stem`].
pub(crate) fn encode_file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_file_stem`]; `None` for stems it cannot have produced.
pub(crate) fn decode_file_stem(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        if b == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(b);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

impl DraftStore for FileDraftStore {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        match fs::read_to_string(self.path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, DraftError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_file_stem)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Summary over every draft in a store.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DraftStats {
    pub count: usize,
    pub total_size_bytes: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Draft keys (without prefix) present in `store`.
pub fn all_keys(store: &dyn DraftStore) -> Result<Vec<String>, DraftError> {
    Ok(store
        .keys()?
        .into_iter()
        .filter_map(|k| k.strip_prefix(STORAGE_PREFIX).map(str::to_string))
        .collect())
}

/// Removes every draft; returns how many were removed.
pub fn clear_all(store: &dyn DraftStore) -> Result<usize, DraftError> {
    let keys = all_keys(store)?;
    for key in &keys {
        store.remove(&storage_key(key))?;
    }
    tracing::info!(count = keys.len(), "all drafts cleared");
    Ok(keys.len())
}

/// Removes drafts older than `max_age` and drafts that cannot be decoded.
pub fn cleanup_expired(store: &dyn DraftStore, max_age: Duration) -> Result<usize, DraftError> {
    let mut removed = 0;
    for key in all_keys(store)? {
        let key = storage_key(&key);
        let Some(raw) = store.get(&key)? else {
            continue;
        };
        let stale = match serde_json::from_str::<DraftEnvelope<Value>>(&raw) {
            Ok(envelope) => envelope.is_expired(max_age),
            Err(_) => true,
        };
        if stale {
            store.remove(&key)?;
            tracing::debug!(key = %key, "stale draft removed");
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(removed, "draft cleanup completed");
    }
    Ok(removed)
}

/// Counts drafts and their encoded size. Undecodable drafts count but carry no time.
pub fn stats(store: &dyn DraftStore) -> Result<DraftStats, DraftError> {
    let mut stats = DraftStats::default();
    for key in all_keys(store)? {
        stats.count += 1;
        let Some(raw) = store.get(&storage_key(&key))? else {
            continue;
        };
        stats.total_size_bytes += raw.len();
        let Ok(envelope) = serde_json::from_str::<DraftEnvelope<Value>>(&raw) else {
            continue;
        };
        if let Some(at) = envelope.saved_at() {
            stats.oldest = Some(stats.oldest.map_or(at, |o| o.min(at)));
            stats.newest = Some(stats.newest.map_or(at, |n| n.max(at)));
        }
    }
    Ok(stats)
}
