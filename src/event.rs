use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message as it was consumed. The timestamp is taken by the consumer, not the producer.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

/// A failure report pinned below the messages until newer ones push it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub origin: String,
    pub lines: Vec<String>,
    pub timestamp: DateTime<Local>,
}

/// Static display fields of a task, as given by `set_task`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskProgress {
    pub total: Option<u64>,
    pub prefix: String,
    pub suffix: String,
    pub display_time: bool,
    pub keep_alive: bool,
}

impl TaskProgress {
    pub fn new(total: impl Into<Option<u64>>) -> Self {
        Self {
            total: total.into(),
            ..Self::default()
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn display_time(mut self, display_time: bool) -> Self {
        self.display_time = display_time;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

/// Everything a producer can put on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Log {
        level: LogLevel,
        text: String,
    },
    Update {
        id: String,
        current: u64,
        #[serde(default)]
        total: Option<u64>,
    },
    SetTask {
        id: String,
        progress: TaskProgress,
    },
    Failure {
        origin: String,
        trace: String,
    },
    Configure(ConfigChange),
}
