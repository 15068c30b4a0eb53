//! Append-only log sinks for session errors and debug traces.
//!
//! Entries are written in the line format consumed by existing log readers:
//!
//! ```text
//! [dd/mm/yyyy HH:MM:SS]: <title>\r\n<message>\r\n\r\n
//! ```
//!
//! `FileLogSink` keys its files by calendar date (`errorlog-dd.mm.yyyy.log`).

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_LOG_DIR: &str = "logs/";

/// Title used for debug query traces.
pub const DEBUG_TITLE: &str = "DEBUG";

/// Destination for timestamped session log entries.
pub trait LogSink: Send + Sync {
    fn append(&self, timestamp: DateTime<Local>, title: &str, message: &str) -> std::io::Result<()>;
}

/// Render one entry in the compatibility line format.
pub fn format_entry(timestamp: DateTime<Local>, title: &str, message: &str) -> String {
    format!(
        "[{}]: {}\r\n{}\r\n\r\n",
        timestamp.format("%d/%m/%Y %H:%M:%S"),
        title,
        message
    )
}

/// Sink writing one file per day into a directory.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file for the given day.
    pub fn file_for(&self, timestamp: DateTime<Local>) -> PathBuf {
        self.dir
            .join(format!("errorlog-{}.log", timestamp.format("%d.%m.%Y")))
    }

    /// Verify the directory exists (creating it if needed) and accepts writes.
    pub fn check_writable(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let marker = self.dir.join(".write-check");
        fs::write(&marker, b"")?;
        fs::remove_file(marker)
    }
}

impl Default for FileLogSink {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_DIR)
    }
}

impl LogSink for FileLogSink {
    fn append(&self, timestamp: DateTime<Local>, title: &str, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(timestamp))?;
        file.write_all(format_entry(timestamp, title, message).as_bytes())
    }
}

/// A recorded log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub title: String,
    pub message: String,
}

/// Sink keeping entries in memory. Useful in tests.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, timestamp: DateTime<Local>, title: &str, message: &str) -> std::io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| std::io::Error::other("memory log sink lock poisoned"))?;
        entries.push(LogEntry {
            timestamp,
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2015, 3, 7, 9, 5, 2).unwrap()
    }

    #[test]
    fn test_format_entry() {
        let line = format_entry(fixed_time(), "Invalid SQL", "You have an error");
        assert_eq!(line, "[07/03/2015 09:05:02]: Invalid SQL\r\nYou have an error\r\n\r\n");
    }

    #[test]
    fn test_format_entry_empty_message() {
        let line = format_entry(fixed_time(), "Cannot select database", "");
        assert_eq!(line, "[07/03/2015 09:05:02]: Cannot select database\r\n\r\n\r\n");
    }

    #[test]
    fn test_file_name_keyed_by_date() {
        let sink = FileLogSink::new("/var/log/app");
        assert_eq!(
            sink.file_for(fixed_time()),
            PathBuf::from("/var/log/app/errorlog-07.03.2015.log")
        );
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = TempDir::new().unwrap();
        let sink = FileLogSink::new(dir.path());

        sink.append(fixed_time(), "first", "a").unwrap();
        sink.append(fixed_time(), "second", "b").unwrap();

        let content = fs::read_to_string(sink.file_for(fixed_time())).unwrap();
        assert_eq!(
            content,
            "[07/03/2015 09:05:02]: first\r\na\r\n\r\n[07/03/2015 09:05:02]: second\r\nb\r\n\r\n"
        );
    }

    #[test]
    fn test_check_writable_creates_dir() {
        let dir = TempDir::new().unwrap();
        let sink = FileLogSink::new(dir.path().join("nested/logs"));
        sink.check_writable().unwrap();
        assert!(sink.dir().is_dir());
        assert_eq!(fs::read_dir(sink.dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemoryLogSink::new();
        assert!(sink.is_empty());
        sink.append(fixed_time(), DEBUG_TITLE, "SELECT 1").unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "DEBUG");
        assert_eq!(entries[0].message, "SELECT 1");
    }
}
