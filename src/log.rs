use std::io::{stderr, stdout, Write};
use std::sync::{Arc, Mutex};

use humantime::format_rfc3339;
use serde_json::{json, Value};

/// Severity levels of the engine log channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(name: &str) -> Option<LogLevel> {
        match name {
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub data: Value,
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, data: Value) -> Self {
        let now = std::time::SystemTime::now();
        Self {
            level,
            message: message.into(),
            data,
            timestamp: format_rfc3339(now).to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "level": self.level.as_str(),
            "message": self.message,
            "data": self.data,
            "timestamp": self.timestamp,
        })
    }
}

/// Destination for engine log entries. Sinks are shared between the engine
/// and the embedding code, so emission works through a shared reference.
pub trait LogSink {
    fn emit(&self, entry: &LogEntry);
}

/// Writes one JSON line per entry, errors to stderr and the rest to stdout.
pub struct StdSink;

impl LogSink for StdSink {
    fn emit(&self, entry: &LogEntry) {
        if let Ok(serialized) = serde_json::to_string(&entry.to_json()) {
            if entry.level == LogLevel::Error {
                let _ = writeln!(stderr(), "{serialized}");
            } else {
                let _ = writeln!(stdout(), "{serialized}");
            }
        }
    }
}

/// Captures entries in memory. Test suites inspect the captured list instead
/// of scraping process output.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("log sink poisoned").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|entry| entry.message)
            .collect()
    }

    pub fn has(&self, level: LogLevel, message: &str) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.level == level && entry.message == message)
    }
}

impl LogSink for MemorySink {
    fn emit(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .expect("log sink poisoned")
            .push(entry.clone());
    }
}
