//! Pipeline log broadcasting.
//!
//! Every log entry is echoed to stdout and broadcast to subscribers, so a
//! caller (or a test) can follow dataset runs as they happen.

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Dataset the entry belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            dataset: None,
            indent: 0,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all subscribers
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
    echo: AtomicBool,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            sender,
            echo: AtomicBool::new(true),
        }
    }

    /// Turn the stdout echo on or off. Subscribers are unaffected.
    pub fn set_echo(&self, enabled: bool) {
        self.echo.store(enabled, Ordering::Relaxed);
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        if self.echo.load(Ordering::Relaxed) {
            let prefix = match entry.level {
                LogLevel::Info => "   ",
                LogLevel::Success => "   ✓",
                LogLevel::Warning => "   ⚠️",
                LogLevel::Error => "   ❌",
            };
            let indent = "   ".repeat(entry.indent as usize);
            match &entry.dataset {
                Some(dataset) => println!("{}{} [{}] {}", indent, prefix, dataset, entry.message),
                None => println!("{}{} {}", indent, prefix, entry.message),
            }
        }

        // No receivers is fine.
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

/// Log an entry scoped to one dataset.
pub fn log_dataset(dataset: &str, entry: LogEntry) {
    LOG_BROADCASTER.log(entry.with_dataset(dataset));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_receives_entries() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.set_echo(false);
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::info("extracted 12 rows").with_dataset("adhesion_by_year"));
        broadcaster.log(LogEntry::error("boom").with_indent(1));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.level, LogLevel::Info);
        assert_eq!(first.dataset.as_deref(), Some("adhesion_by_year"));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.level, LogLevel::Error);
        assert_eq!(second.indent, 1);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::success("loaded").with_dataset("adhesion_by_size");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "level": "success",
                "message": "loaded",
                "dataset": "adhesion_by_size",
                "indent": 0
            })
        );

        let plain = serde_json::to_value(LogEntry::info("x")).unwrap();
        assert!(plain.get("dataset").is_none());
    }
}
