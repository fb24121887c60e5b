use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

const RESERVED_KEYS: [&str; 3] = ["type", "session_id", "ts"];

/// One line of a session's `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl SessionEvent {
    /// Payload keys that collide with the envelope are dropped.
    pub fn new(event_type: &str, session_id: &str, mut payload: EventPayload) -> Self {
        for key in RESERVED_KEYS {
            payload.remove(key);
        }
        Self {
            event_type: event_type.to_string(),
            session_id: session_id.to_string(),
            ts: now_utc_iso(),
            payload,
        }
    }
}

/// Append-only JSONL writer shared by every clone. The file (and its parent
/// directory) is created on the first event.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<BufWriter<File>>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> Result<SessionEvent> {
        let event = SessionEvent::new(event_type, &self.inner.session_id, payload);
        let line = serde_json::to_string(&event).context("failed to encode event")?;

        let mut slot = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        if slot.is_none() {
            *slot = Some(self.open()?);
        }
        if let Some(file) = slot.as_mut() {
            writeln!(file, "{line}")
                .and_then(|_| file.flush())
                .with_context(|| format!("failed to append to {}", self.inner.path.display()))?;
        }
        Ok(event)
    }

    fn open(&self) -> Result<BufWriter<File>> {
        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed to open {}", self.inner.path.display()))?;
        Ok(BufWriter::new(file))
    }
}

/// Reads a JSONL event log back; blank lines are skipped.
pub fn read_events(path: &Path) -> Result<Vec<SessionEvent>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid event on line {} of {}", idx + 1, path.display()))
        })
        .collect()
}

pub(crate) fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
