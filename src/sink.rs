use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::event::{Failure, LogEntry, LogLevel};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Append-only text mirror of every consumed entry: `<timestamp> <level> <text>`.
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = format_line(&entry.timestamp, entry.level, &entry.text);
        self.write_line(&line);
    }

    pub fn write_failure(&mut self, failure: &Failure) {
        let text = format!("[{}] {}", failure.origin, failure.lines.join(" | "));
        let line = format_line(&failure.timestamp, LogLevel::Critical, &text);
        self.write_line(&line);
    }

    fn write_line(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let written = file.write_all(line.as_bytes()).and_then(|()| file.flush());
        if let Err(err) = written {
            log::error!(
                "writing to {} failed, file logging disabled: {err}",
                self.path.display()
            );
            self.file = None;
        }
    }
}

pub fn format_line(timestamp: &DateTime<Local>, level: LogLevel, text: &str) -> String {
    format!("{} {} {}\n", timestamp.format(TIMESTAMP_FORMAT), level, text)
}

#[cfg(test)]
mod test {
    use super::{format_line, FileSink};
    use crate::event::{Failure, LogEntry, LogLevel};
    use chrono::{Local, TimeZone};
    use std::fs;

    fn entry(text: &str) -> LogEntry {
        LogEntry {
            level: LogLevel::Warning,
            text: text.to_owned(),
            timestamp: Local::now(),
        }
    }

    #[test]
    fn formats_timestamp_level_text() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            format_line(&timestamp, LogLevel::Error, "disk full"),
            "2024-03-09 14:05:07.000 ERROR disk full\n"
        );
    }

    #[test]
    fn appends_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logging.log");
        let mut sink = FileSink::open(&path).unwrap();
        assert_eq!(sink.path(), path.as_path());
        for i in 0..20 {
            sink.write_entry(&entry(&format!("message {i}")));
        }
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 20);
        assert!(lines[0].ends_with(" WARNING message 0"));
        assert!(lines[19].ends_with(" WARNING message 19"));
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logging.log");
        FileSink::open(&path).unwrap().write_entry(&entry("one"));
        FileSink::open(&path).unwrap().write_entry(&entry("two"));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_error_disables_the_sink() {
        let mut sink = FileSink::open("/dev/full").unwrap();
        assert!(sink.is_active());
        sink.write_entry(&entry("no space"));
        assert!(!sink.is_active());
        sink.write_entry(&entry("ignored"));
        assert!(!sink.is_active());
    }

    #[test]
    fn failure_is_written_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logging.log");
        let mut sink = FileSink::open(&path).unwrap();
        sink.write_failure(&Failure {
            origin: "worker 3".to_owned(),
            lines: vec!["panicked at 'boom'".to_owned(), "  at main.rs:4".to_owned()],
            timestamp: Local::now(),
        });
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains(" CRITICAL [worker 3] panicked at 'boom' |   at main.rs:4"));
    }
}
