use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::EventWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Destination for pipeline log entries.
///
/// Implementations may fail or even panic; [`Logger`] absorbs both.
pub trait LogSink: Send + Sync {
    fn record(&self, entry: &LogEntry) -> anyhow::Result<()>;
}

/// Cheaply cloneable handle the pipeline logs through.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::null()
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn null() -> Self {
        Self::new(Arc::new(NullSink))
    }

    pub fn log(&self, level: LogLevel, message: &str, data: Option<Value>) {
        let entry = LogEntry {
            level,
            message: message.to_string(),
            data,
        };
        let sink = Arc::clone(&self.sink);
        // Sink errors and panics never reach the caller.
        let _ = panic::catch_unwind(AssertUnwindSafe(move || sink.record(&entry)));
    }

    pub fn info(&self, message: &str, data: impl Into<Option<Value>>) {
        self.log(LogLevel::Info, message, data.into());
    }

    pub fn error(&self, message: &str, data: impl Into<Option<Value>>) {
        self.log(LogLevel::Error, message, data.into());
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn record(&self, _entry: &LogEntry) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Bounded in-memory log, newest last. Backs the generation log panel.
#[derive(Debug)]
pub struct MemorySink {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_capacity(500)
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, message: &str) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.message == message)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn record(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        Ok(())
    }
}

/// Forwards every entry to each inner sink; one failing sink does not starve the rest.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutSink {
    pub fn push(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }
}

impl LogSink for FanoutSink {
    fn record(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || sink.record(entry)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    first_err.get_or_insert(err);
                }
                Err(_) => {
                    first_err.get_or_insert_with(|| anyhow::anyhow!("log sink panicked"));
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl LogSink for EventWriter {
    fn record(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let mut payload = Map::new();
        payload.insert(
            "level".to_string(),
            Value::String(entry.level.as_str().to_string()),
        );
        payload.insert("message".to_string(), Value::String(entry.message.clone()));
        payload.insert(
            "data".to_string(),
            entry.data.clone().unwrap_or(Value::Null),
        );
        self.emit("log", payload)?;
        Ok(())
    }
}
