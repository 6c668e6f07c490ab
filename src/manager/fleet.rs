//! Fleet supervisor
//!
//! Starts one control loop per enabled device plus the daily reset watcher,
//! and stops them as a group. A start is all-or-nothing: every enabled
//! device's profile is validated before anything is spawned.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::DeviceClient;
use crate::coordination::StopSignal;
use crate::domain::{DeviceIdentity, DeviceRecord, GlobalSettings, LogEvent, LogLevel};
use crate::error::{Result, TunerError};
use crate::manager::daily_reset::{Clock, DailyResetWatcher, SystemClock, WatcherConfig};
use crate::provider::ConfigProvider;
use crate::runner::{ControlLoop, LoopState, LoopStatus};
use crate::sink::LogSink;

/// Supervisor-side record of one running loop
pub struct LoopHandle {
    identity: DeviceIdentity,
    stop: StopSignal,
    status: watch::Receiver<LoopStatus>,
    task: JoinHandle<LoopStatus>,
}

impl LoopHandle {
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn address(&self) -> &str {
        &self.identity.address
    }

    /// Latest published status
    pub fn status(&self) -> LoopStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> LoopState {
        self.status().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.status().consecutive_failures
    }

    /// Raise this loop's stop signal
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for the next status change; `false` once the loop is gone
    pub async fn changed(&mut self) -> bool {
        self.status.changed().await.is_ok()
    }

    /// Wait until the published status satisfies `f`
    pub async fn wait_for(&mut self, f: impl FnMut(&LoopStatus) -> bool) -> LoopStatus {
        if let Ok(status) = self.status.wait_for(f).await {
            return *status;
        }
        *self.status.borrow()
    }

    /// Wait for the loop task to finish
    pub async fn join(self) -> LoopStatus {
        match self.task.await {
            Ok(status) => status,
            Err(e) => {
                log::error!("Control loop for {} ended abnormally: {}", self.identity.address, e);
                LoopStatus {
                    state: LoopState::Stopped,
                    consecutive_failures: self.status.borrow().consecutive_failures,
                }
            }
        }
    }
}

/// Everything a running fleet consists of
pub struct FleetHandle {
    loops: Vec<LoopHandle>,
    watcher_stop: StopSignal,
    watcher: JoinHandle<()>,
    sink: Arc<dyn LogSink>,
}

impl FleetHandle {
    pub fn loops(&self) -> &[LoopHandle] {
        &self.loops
    }

    pub fn loops_mut(&mut self) -> &mut [LoopHandle] {
        &mut self.loops
    }

    pub fn get(&self, address: &str) -> Option<&LoopHandle> {
        self.loops.iter().find(|l| l.address() == address)
    }

    pub fn get_mut(&mut self, address: &str) -> Option<&mut LoopHandle> {
        self.loops.iter_mut().find(|l| l.address() == address)
    }

    /// Raise the stop signal of every loop and the watcher. Does not wait.
    pub fn stop(&self) {
        if self.watcher_stop.is_stopped() {
            return;
        }
        self.sink.emit(LogEvent::fleet(LogLevel::Info, "Stopping autotuning"));
        for handle in &self.loops {
            handle.stop();
        }
        self.watcher_stop.stop();
    }

    /// Stop everything and wait for the tasks to finish
    pub async fn shutdown(self) -> Vec<(String, LoopStatus)> {
        self.stop();

        let mut finished = Vec::with_capacity(self.loops.len());
        for handle in self.loops {
            let address = handle.address().to_string();
            finished.push((address, handle.join().await));
        }
        if let Err(e) = self.watcher.await {
            log::error!("Daily reset watcher ended abnormally: {}", e);
        }
        self.sink
            .emit(LogEvent::fleet(LogLevel::Success, "Autotuning stopped for all devices"));
        finished
    }
}

pub struct FleetSupervisor {
    client: Arc<dyn DeviceClient>,
    provider: Arc<dyn ConfigProvider>,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    watcher_config: WatcherConfig,
}

impl FleetSupervisor {
    pub fn new(client: Arc<dyn DeviceClient>, provider: Arc<dyn ConfigProvider>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            client,
            provider,
            sink,
            clock: Arc::new(SystemClock),
            watcher_config: WatcherConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_watcher_config(mut self, config: WatcherConfig) -> Self {
        self.watcher_config = config;
        self
    }

    fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.emit(LogEvent::fleet(level, message));
    }

    /// Check every enabled device's profile without starting anything
    pub fn validate(devices: &[DeviceRecord]) -> Result<Vec<&DeviceRecord>> {
        let enabled: Vec<&DeviceRecord> = devices.iter().filter(|d| d.enabled).collect();
        if enabled.is_empty() {
            return Err(TunerError::NoDevicesEnabled);
        }

        let issues: Vec<_> = enabled
            .iter()
            .filter_map(|d| d.tuning_profile().err())
            .flatten()
            .collect();
        if !issues.is_empty() {
            return Err(TunerError::IncompleteProfiles(issues));
        }
        Ok(enabled)
    }

    /// Start a loop for every enabled device and the daily reset watcher.
    ///
    /// Refuses the whole start, spawning nothing, if no device is enabled or
    /// any enabled device has missing or invalid profile fields. Must be
    /// called from within a tokio runtime.
    pub fn start(&self, devices: &[DeviceRecord], settings: &GlobalSettings) -> Result<FleetHandle> {
        self.emit(LogLevel::Info, "Checking settings");

        let enabled = match Self::validate(devices) {
            Ok(enabled) => enabled,
            Err(TunerError::IncompleteProfiles(issues)) => {
                for issue in &issues {
                    self.emit(LogLevel::Error, issue.to_string());
                }
                self.emit(LogLevel::Error, "Autotuning not started: fix the profiles above");
                return Err(TunerError::IncompleteProfiles(issues));
            }
            Err(e) => {
                self.emit(LogLevel::Error, e.to_string());
                return Err(e);
            }
        };

        self.emit(
            LogLevel::Info,
            format!("Starting autotuning for {} device(s)", enabled.len()),
        );

        let loops = enabled
            .into_iter()
            .map(|record| self.spawn_loop(record.clone(), settings.clone()))
            .collect();

        let watcher_stop = StopSignal::new();
        let watcher = DailyResetWatcher::new(
            self.client.clone(),
            self.provider.clone(),
            self.sink.clone(),
            self.clock.clone(),
            self.watcher_config.clone(),
            settings.clone(),
        );
        let watcher = tokio::spawn(watcher.run(watcher_stop.token()));

        self.emit(LogLevel::Success, "Autotuning started");
        Ok(FleetHandle {
            loops,
            watcher_stop,
            watcher,
            sink: self.sink.clone(),
        })
    }

    /// Start from whatever the config provider currently holds
    pub fn start_from_provider(&self) -> Result<FleetHandle> {
        let devices = self.provider.list_devices()?;
        let settings = self.provider.global_settings()?;
        self.start(&devices, &settings)
    }

    /// Stop every loop of a fleet. Does not wait.
    pub fn stop(&self, fleet: &FleetHandle) {
        fleet.stop();
    }

    fn spawn_loop(&self, record: DeviceRecord, settings: GlobalSettings) -> LoopHandle {
        let identity = record.identity.clone();
        let control_loop = ControlLoop::new(
            record,
            settings,
            self.client.clone(),
            self.provider.clone(),
            self.sink.clone(),
        );
        let status = control_loop.subscribe();
        let stop = StopSignal::new();
        let task = tokio::spawn(control_loop.run(stop.token()));
        log::debug!("Spawned control loop for {}", identity.address);

        LoopHandle {
            identity,
            stop,
            status,
            task,
        }
    }
}
