//! Log sinks
//!
//! Every control loop and the supervisor report through a shared `LogSink`.
//! The production sink is a channel: loops push events without blocking and a
//! single writer task drains them, so that task is the only place where output
//! is serialized. Messages from one device keep their order; ordering across
//! devices is whatever the channel sees.

use std::sync::{Mutex, MutexGuard};

use colored::Colorize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{LogEvent, LogLevel, LogSource};

/// Destination for log events. Must tolerate concurrent callers.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Channel-backed sink; pair it with `spawn_writer`
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn emit(&self, event: LogEvent) {
        // Writer gone means we are shutting down
        let _ = self.tx.send(event);
    }
}

/// Drain events into the `log` facade and, if `echo` is set, the terminal.
/// The task ends once every `ChannelSink` clone has been dropped.
pub fn spawn_writer(mut rx: mpsc::UnboundedReceiver<LogEvent>, echo: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log::log!(target: "axetune::events", event.level.as_log_level(), "[{}] {}", event.source, event.message);
            if echo {
                println!("{}", render(&event));
            }
        }
    })
}

/// Terminal rendering: success green, warning yellow, error red
pub fn render(event: &LogEvent) -> String {
    let line = event.to_string();
    match event.level {
        LogLevel::Info => line.normal().to_string(),
        LogLevel::Success => line.green().to_string(),
        LogLevel::Warning => line.yellow().to_string(),
        LogLevel::Error => line.red().to_string(),
    }
}

/// In-memory sink for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    /// Messages about one device, in emission order
    pub fn messages_for(&self, address: &str) -> Vec<String> {
        let source = LogSource::Device(address.to_string());
        self.lock()
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Whether any event at `level` mentions `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lock().iter().any(|e| e.level == level && e.message.contains(needle))
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.lock().iter().filter(|e| e.level == level).count()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        self.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_sink_filters() {
        let sink = MemorySink::new();
        sink.emit(LogEvent::device("a", LogLevel::Info, "first"));
        sink.emit(LogEvent::device("b", LogLevel::Error, "boom"));
        sink.emit(LogEvent::device("a", LogLevel::Warning, "second"));

        assert_eq!(sink.messages_for("a"), vec!["first", "second"]);
        assert!(sink.contains(LogLevel::Error, "boom"));
        assert!(!sink.contains(LogLevel::Info, "boom"));
        assert_eq!(sink.count(LogLevel::Warning), 1);
    }

    #[test]
    fn test_render_keeps_message() {
        let event = LogEvent::fleet(LogLevel::Success, "Started");
        assert!(render(&event).contains("[fleet] Started"));
    }

    #[tokio::test]
    async fn test_channel_sink_preserves_per_device_order() {
        let (sink, mut rx) = ChannelSink::new();
        let sink = Arc::new(sink);

        let mut tasks = Vec::new();
        for device in ["a", "b", "c"] {
            let sink = sink.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..20 {
                    sink.emit(LogEvent::device(device, LogLevel::Info, i.to_string()));
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        drop(sink);

        let mut seen: std::collections::HashMap<String, Vec<u32>> = Default::default();
        while let Some(event) = rx.recv().await {
            seen.entry(event.source.to_string())
                .or_default()
                .push(event.message.parse().unwrap());
        }
        assert_eq!(seen.len(), 3);
        for numbers in seen.values() {
            assert_eq!(*numbers, (0..20).collect::<Vec<u32>>());
        }
    }

    #[tokio::test]
    async fn test_writer_ends_when_senders_drop() {
        let (sink, rx) = ChannelSink::new();
        let writer = spawn_writer(rx, false);
        sink.emit(LogEvent::fleet(LogLevel::Info, "hello"));
        drop(sink);
        tokio::time::timeout(std::time::Duration::from_secs(1), writer)
            .await
            .expect("writer did not finish")
            .unwrap();
    }
}
