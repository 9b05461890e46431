//! # JournalWriter: JSON-lines log file
//!
//! Appends one JSON object per event to `<dir>/<component>_<YYYY-MM-DD>.log`
//! (component lower-cased and escaped like draft file names, date in UTC at
//! open time):
//!
//! ```text
//! {"timestamp":"2024-03-10T14:02:11.532Z","level":"WARNING","component":"TASKS","message":"attempt 1 failed for insert into tarefas","data":{...}}
//! ```
//!
//! Write errors are swallowed: a full disk must not change how a call is retried.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::autosave::encode_file_stem;
use crate::events::{Event, LogLevel};
use crate::observers::Observe;

/// One line of the journal.
#[derive(Debug, Serialize)]
pub struct JournalEntry<'a> {
    pub timestamp: String,
    pub level: LogLevel,
    pub component: &'a str,
    pub message: String,
    pub data: Value,
}

/// Observer appending JSON lines to a per-component, per-day file.
#[derive(Debug)]
pub struct JournalWriter {
    component: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl JournalWriter {
    /// Opens (or creates) today's journal for `component` inside `dir`.
    ///
    /// The directory is created if missing.
    pub fn open(dir: impl AsRef<Path>, component: impl Into<String>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let component = component.into();
        let day = Utc::now().format("%Y-%m-%d");
        let stem = encode_file_stem(&component.to_lowercase());
        let path = dir.join(format!("{stem}_{day}.log"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            component,
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_entry(&self, event: &Event) -> io::Result<()> {
        let timestamp: DateTime<Utc> = event.at.into();
        let entry = JournalEntry {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            level: event.level(),
            component: &self.component,
            message: event.message(),
            data: event.data(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("journal lock poisoned"))?;
        file.write_all(&line)
    }
}

impl Observe for JournalWriter {
    fn on_event(&self, event: &Event) {
        let _ = self.write_entry(event);
    }

    fn name(&self) -> &'static str {
        "JournalWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorCategory;
    use crate::events::EventKind;

    #[test]
    fn test_writes_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let journal = JournalWriter::open(dir.path().join("logs"), "TASKS").unwrap();

        journal.on_event(
            &Event::now(EventKind::AttemptFailed)
                .with_operation("insert into tarefas")
                .with_attempt(1, 4)
                .with_category(ErrorCategory::NetworkUnreachable)
                .with_error("Failed to fetch"),
        );
        journal.on_event(&Event::now(EventKind::Succeeded).with_attempt(2, 4));

        let file_name = journal.path().file_name().unwrap().to_string_lossy();
        assert!(file_name.starts_with("tasks_"), "{file_name}");

        let content = fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "WARNING");
        assert_eq!(lines[0]["component"], "TASKS");
        assert_eq!(lines[0]["data"]["category"], "NET_001");
        assert_eq!(lines[1]["level"], "INFO");
        assert!(lines[1]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_component_cannot_leave_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let journal = JournalWriter::open(&logs, "../Escape").unwrap();

        assert_eq!(journal.path().parent(), Some(logs.as_path()));
        let file_name = journal.path().file_name().unwrap().to_string_lossy();
        assert!(file_name.starts_with("%2E%2E%2Fescape_"), "{file_name}");

        journal.on_event(&Event::now(EventKind::Succeeded).with_attempt(1, 1));
        let content = fs::read_to_string(journal.path()).unwrap();
        assert!(content.contains("\"component\":\"../Escape\""));
    }
}
