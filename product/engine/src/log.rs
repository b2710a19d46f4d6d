//! JSON-lines event log shared by every stage of a request.
//!
//! Each line is `{"ts_ms", "request_id", "level", "event", "data"}`. Writes
//! are best effort: a failing sink never fails the request.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const LOG_ROTATE_BYTES: u64 = 5 * 1024 * 1024;
const LOG_MAX_BACKUPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
enum Sink {
    Stderr,
    File(PathBuf),
    Memory(Arc<Mutex<Vec<String>>>),
    Discard,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    request_id: String,
    sink: Sink,
}

impl EventLog {
    pub fn stderr() -> Self {
        Self::with_sink(Sink::Stderr)
    }

    /// Appends to `path`, rotating it once it grows past a few MiB.
    pub fn file(path: PathBuf) -> Self {
        Self::with_sink(Sink::File(path))
    }

    /// Keeps lines in memory; see [`EventLog::lines`].
    pub fn memory() -> Self {
        Self::with_sink(Sink::Memory(Arc::new(Mutex::new(Vec::new()))))
    }

    pub fn discard() -> Self {
        Self::with_sink(Sink::Discard)
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            request_id: String::new(),
            sink,
        }
    }

    /// Same sink, lines tagged with `request_id`.
    pub fn for_request(&self, request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            sink: self.sink.clone(),
        }
    }

    pub fn info(&self, event: &str, data: serde_json::Value) {
        self.log(Level::Info, event, data);
    }

    pub fn warn(&self, event: &str, data: serde_json::Value) {
        self.log(Level::Warn, event, data);
    }

    pub fn error(&self, event: &str, data: serde_json::Value) {
        self.log(Level::Error, event, data);
    }

    pub fn log(&self, level: Level, event: &str, data: serde_json::Value) {
        let line = serde_json::json!({
            "ts_ms": now_ms(),
            "request_id": self.request_id,
            "level": level.as_str(),
            "event": event,
            "data": data
        })
        .to_string();

        match &self.sink {
            Sink::Stderr => {
                let _ = writeln!(std::io::stderr().lock(), "{line}");
            }
            Sink::File(path) => {
                let _ = append_line(path, &line);
            }
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
            Sink::Discard => {}
        }
    }

    /// Lines captured by a memory sink. Empty for every other sink.
    pub fn lines(&self) -> Vec<String> {
        match &self.sink {
            Sink::Memory(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Event names captured by a memory sink, in order.
    pub fn events(&self) -> Vec<String> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter_map(|v| v.get("event").and_then(|e| e.as_str()).map(str::to_string))
            .collect()
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    rotate_if_needed(path)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?
        .write_all(format!("{line}\n").as_bytes())
}

fn rotate_if_needed(path: &Path) -> std::io::Result<()> {
    let len = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return Ok(()),
    };
    if len < LOG_ROTATE_BYTES {
        return Ok(());
    }

    for idx in (1..LOG_MAX_BACKUPS).rev() {
        let from = backup_path(path, idx);
        if from.exists() {
            std::fs::rename(&from, backup_path(path, idx + 1))?;
        }
    }
    std::fs::rename(path, backup_path(path, 1))
}

fn backup_path(path: &Path, idx: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{idx}"));
    PathBuf::from(name)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
