//! Daily reset watcher
//!
//! Polls the wall clock and, when it reads the configured `HH:MM`, restarts
//! every known device. Acts at most once per calendar day: the date of the
//! last reset is remembered, and after a reset the watcher sleeps a debounce
//! period before polling again.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::client::DeviceClient;
use crate::coordination::StopToken;
use crate::domain::{GlobalSettings, LogEvent, LogLevel};
use crate::provider::ConfigProvider;
use crate::sink::LogSink;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    fn lock(&self) -> MutexGuard<'_, NaiveDateTime> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

/// Watcher timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Time between wall-clock checks
    pub poll_interval_ms: u64,
    /// Pause after a reset before polling resumes
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            debounce_ms: 60_000,
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Result of one wall-clock check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetCheck {
    Disabled,
    InvalidTime,
    NotDue,
    /// Time matches but today's reset already happened
    AlreadyReset,
    Triggered { restarted: usize, failed: usize },
}

pub struct DailyResetWatcher {
    client: Arc<dyn DeviceClient>,
    provider: Arc<dyn ConfigProvider>,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    config: WatcherConfig,
    settings: GlobalSettings,
    last_reset: Option<NaiveDate>,
}

impl DailyResetWatcher {
    pub fn new(
        client: Arc<dyn DeviceClient>,
        provider: Arc<dyn ConfigProvider>,
        sink: Arc<dyn LogSink>,
        clock: Arc<dyn Clock>,
        config: WatcherConfig,
        settings: GlobalSettings,
    ) -> Self {
        Self {
            client,
            provider,
            sink,
            clock,
            config,
            settings,
            last_reset: None,
        }
    }

    pub fn last_reset(&self) -> Option<NaiveDate> {
        self.last_reset
    }

    fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.emit(LogEvent::fleet(level, message));
    }

    /// Compare the clock against the reset time and restart the fleet if due
    pub async fn check(&mut self) -> ResetCheck {
        match self.provider.global_settings() {
            Ok(settings) => self.settings = settings,
            Err(e) => self.emit(LogLevel::Warning, format!("Could not reload settings for daily reset: {}", e)),
        }

        if !self.settings.daily_reset_enabled {
            return ResetCheck::Disabled;
        }

        let reset_at = match self.settings.reset_time() {
            Ok(t) => t,
            Err(e) => {
                self.emit(LogLevel::Error, e.to_string());
                return ResetCheck::InvalidTime;
            }
        };

        let now = self.clock.now();
        if now.hour() != reset_at.hour() || now.minute() != reset_at.minute() {
            return ResetCheck::NotDue;
        }
        if self.last_reset == Some(now.date()) {
            return ResetCheck::AlreadyReset;
        }
        self.last_reset = Some(now.date());

        self.emit(
            LogLevel::Warning,
            format!("Daily reset triggered at {}", now.format("%H:%M")),
        );
        self.restart_all().await
    }

    async fn restart_all(&self) -> ResetCheck {
        let devices = match self.provider.list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                self.emit(LogLevel::Error, format!("Daily reset could not list devices: {}", e));
                return ResetCheck::Triggered { restarted: 0, failed: 0 };
            }
        };

        let restarts = devices.iter().map(|d| self.client.restart(d.address()));
        let results = join_all(restarts).await;

        let mut restarted = 0;
        let mut failed = 0;
        for (device, result) in devices.iter().zip(results) {
            match result {
                Ok(confirmation) => {
                    restarted += 1;
                    self.sink
                        .emit(LogEvent::device(device.address(), LogLevel::Warning, confirmation));
                }
                Err(e) => {
                    failed += 1;
                    self.sink.emit(LogEvent::device(
                        device.address(),
                        LogLevel::Error,
                        format!("Daily restart failed: {}", e),
                    ));
                }
            }
        }
        ResetCheck::Triggered { restarted, failed }
    }

    /// Poll until stopped
    pub async fn run(mut self, mut stop: StopToken) {
        log::debug!("Daily reset watcher started");
        while !stop.is_stopped() {
            let wait = match self.check().await {
                ResetCheck::Triggered { .. } => self.config.debounce(),
                _ => self.config.poll_interval(),
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop.stopped() => break,
            }
        }
        log::debug!("Daily reset watcher stopped");
    }
}
