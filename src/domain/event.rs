//! Log events emitted by control loops and the fleet supervisor

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Map onto the `log` facade
    pub fn as_log_level(&self) -> log::Level {
        match self {
            LogLevel::Info | LogLevel::Success => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Who an event is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Fleet,
    Device(String),
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Fleet => f.write_str("fleet"),
            LogSource::Device(address) => f.write_str(address),
        }
    }
}

/// A single message for the log sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub source: LogSource,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

impl LogEvent {
    pub fn new(source: LogSource, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            source,
            level,
            message: message.into(),
            timestamp: Local::now(),
        }
    }

    pub fn device(address: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(LogSource::Device(address.into()), level, message)
    }

    pub fn fleet(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(LogSource::Fleet, level, message)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.source,
            self.message
        )
    }
}
