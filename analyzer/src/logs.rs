//! Run log.
//!
//! Pipeline stages report progress through a global broadcaster that prints
//! each entry to stderr with a timestamp and keeps a bounded journal of the
//! run, which the CLI can include in the JSON dump.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Entries kept in the journal before the oldest are dropped.
const JOURNAL_CAPACITY: usize = 1000;

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
    pub level: LogLevel,
    pub message: String,
    /// Indentation level for nested steps
    #[serde(default)]
    pub indent: u8,
    pub at: DateTime<Local>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into(), indent: 0, at: Local::now() }
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

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Prints log entries and records them in the run journal
pub struct LogBroadcaster {
    journal: Mutex<VecDeque<LogEntry>>,
    quiet: AtomicBool,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        Self {
            journal: Mutex::new(VecDeque::with_capacity(JOURNAL_CAPACITY)),
            quiet: AtomicBool::new(false),
        }
    }

    /// Print an entry and append it to the journal
    pub fn log(&self, entry: LogEntry) {
        if entry.level == LogLevel::Error || !self.quiet.load(Ordering::Relaxed) {
            let prefix = match entry.level {
                LogLevel::Info => "   ",
                LogLevel::Success => "   ✓",
                LogLevel::Warning => "   ⚠️",
                LogLevel::Error => "   ❌",
            };
            let indent = "   ".repeat(entry.indent as usize);
            eprintln!(
                "{} {}{} {}",
                entry.at.format("%Y-%m-%d %H:%M:%S"),
                indent,
                prefix,
                entry.message
            );
        }

        if let Ok(mut journal) = self.journal.lock() {
            if journal.len() >= JOURNAL_CAPACITY {
                journal.pop_front();
            }
            journal.push_back(entry);
        }
    }

    /// Print errors only; the journal still records everything
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    /// Snapshot of the journal
    pub fn journal(&self) -> Vec<LogEntry> {
        self.journal
            .lock()
            .map(|journal| journal.iter().cloned().collect())
            .unwrap_or_default()
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

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_records_entries() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.set_quiet(true);
        broadcaster.log(LogEntry::info("reading"));
        broadcaster.log(LogEntry::warning("gap").with_indent(1));

        let journal = broadcaster.journal();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].level, LogLevel::Warning);
        assert_eq!(journal[1].indent, 1);
    }

    #[test]
    fn test_journal_is_bounded() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.set_quiet(true);
        for i in 0..JOURNAL_CAPACITY + 5 {
            broadcaster.log(LogEntry::info(format!("entry {}", i)));
        }

        let journal = broadcaster.journal();
        assert_eq!(journal.len(), JOURNAL_CAPACITY);
        assert_eq!(journal[0].message, "entry 5");
        let newest = format!("entry {}", JOURNAL_CAPACITY + 4);
        assert_eq!(journal[JOURNAL_CAPACITY - 1].message, newest);
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let json = serde_json::to_string(&LogLevel::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }
}
