//! Per-device control loop
//!
//! Drives one device through `STARTING -> RUNNING <-> DEGRADED -> STOPPED`.
//! Each tick takes a fresh settings snapshot, polls the device, feeds the
//! flatline detector and, unless a restart took priority, asks the safety
//! policy for the next operating point.

use std::sync::Arc;

use tokio::sync::watch;

use crate::client::DeviceClient;
use crate::coordination::StopToken;
use crate::domain::{DeviceRecord, GlobalSettings, LogEvent, LogLevel, OperatingPoint, TelemetrySample, TuningProfile};
use crate::error::{Result, TunerError};
use crate::flatline::{FlatlineDetector, FlatlineStatus, FlatlineWindow};
use crate::policy::{Breach, Direction, Proposal, SafePairingTable, SafetyPolicy};
use crate::provider::ConfigProvider;
use crate::sink::LogSink;

/// Consecutive fetch failures before a loop is marked degraded
pub const DEGRADED_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    /// Device keeps failing; still polled, nothing proposed
    Degraded,
    Stopped,
}

/// Published view of a loop, observable from its handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopStatus {
    pub state: LoopState,
    pub consecutive_failures: u32,
}

impl LoopStatus {
    fn starting() -> Self {
        Self {
            state: LoopState::Starting,
            consecutive_failures: 0,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state != LoopState::Stopped
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Loop has no validated profile; nothing was done
    Inactive,
    FetchFailed { consecutive_failures: u32 },
    /// Flatline detected and a restart was issued (successfully or not)
    Restarted,
    Adjusted(OperatingPoint),
    ApplyFailed(OperatingPoint),
    Held,
    /// Ceilings breached with no lower permitted point
    Pinned(Vec<Breach>),
}

pub struct ControlLoop {
    record: DeviceRecord,
    profile: Option<TuningProfile>,
    client: Arc<dyn DeviceClient>,
    provider: Arc<dyn ConfigProvider>,
    sink: Arc<dyn LogSink>,
    settings: GlobalSettings,
    pairing: Option<SafePairingTable>,
    window: FlatlineWindow,
    status: watch::Sender<LoopStatus>,
}

impl ControlLoop {
    /// Create a loop in `Starting`; `settings` is the snapshot used until the provider supplies one
    pub fn new(
        record: DeviceRecord,
        settings: GlobalSettings,
        client: Arc<dyn DeviceClient>,
        provider: Arc<dyn ConfigProvider>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let window = FlatlineWindow::new(settings.flatline_window_len());
        let (status, _rx) = watch::channel(LoopStatus::starting());
        Self {
            record,
            profile: None,
            client,
            provider,
            sink,
            settings,
            pairing: None,
            window,
            status,
        }
    }

    pub fn address(&self) -> &str {
        self.record.address()
    }

    pub fn status(&self) -> LoopStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> LoopState {
        self.status().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.status().consecutive_failures
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.status.subscribe()
    }

    pub fn window(&self) -> &FlatlineWindow {
        &self.window
    }

    fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.emit(LogEvent::device(self.address(), level, message));
    }

    fn set_state(&self, state: LoopState) {
        self.status.send_modify(|s| s.state = state);
    }

    fn set_failures(&self, consecutive_failures: u32) {
        self.status.send_modify(|s| s.consecutive_failures = consecutive_failures);
    }

    /// Validate the profile and enter `Running`.
    ///
    /// An invalid profile stops the loop for good and is returned as
    /// `IncompleteProfiles`. A valid one with a start operating point has that
    /// point applied once before the first tick.
    pub async fn start(&mut self) -> Result<()> {
        let profile = match self.record.tuning_profile() {
            Ok(profile) => profile,
            Err(issues) => {
                let err = TunerError::IncompleteProfiles(issues);
                self.emit(LogLevel::Error, err.to_string());
                self.set_state(LoopState::Stopped);
                return Err(err);
            }
        };

        self.emit(
            LogLevel::Info,
            format!(
                "Autotuning {}: {}-{} MHz, {}-{} mV",
                self.record.identity.label(),
                profile.min_freq,
                profile.max_freq,
                profile.min_volt,
                profile.max_volt
            ),
        );

        let start = profile.start_point();
        self.profile = Some(profile);
        self.set_state(LoopState::Running);
        self.refresh_snapshot();

        if let Some(point) = start {
            self.apply_start_point(point).await;
        }
        Ok(())
    }

    async fn apply_start_point(&self, requested: OperatingPoint) {
        let Some(profile) = &self.profile else {
            return;
        };
        let mut point = profile.clamp(requested);

        if self.settings.enforce_safe_pairing {
            match self
                .pairing
                .as_ref()
                .and_then(|t| t.snap(point, Direction::Decrease, profile))
            {
                Some(snapped) => point = snapped,
                None => {
                    self.emit(
                        LogLevel::Warning,
                        format!("Start point {} has no safe pairing, leaving device as is", requested),
                    );
                    return;
                }
            }
        }

        match self.client.apply_settings(self.address(), point).await {
            Ok(()) => self.emit(LogLevel::Success, format!("Applied start settings {}", point)),
            Err(e) => self.emit(LogLevel::Error, format!("Failed to apply start settings {}: {}", point, e)),
        }
    }

    /// Take a settings and pairing snapshot, keeping the previous one if the provider fails
    fn refresh_snapshot(&mut self) {
        match self.provider.tuning_snapshot(&self.record.identity.device_type) {
            Ok(snapshot) => {
                self.settings = snapshot.settings;
                self.pairing = snapshot.pairing;
            }
            Err(e) => self.emit(
                LogLevel::Warning,
                format!("Could not reload settings, keeping previous values: {}", e),
            ),
        }
        self.window.resize(self.settings.flatline_window_len());
    }

    /// Run one tick
    pub async fn tick(&mut self) -> TickOutcome {
        if self.profile.is_none() {
            return TickOutcome::Inactive;
        }
        self.refresh_snapshot();

        let sample = match self.client.fetch_telemetry(self.address()).await {
            Ok(sample) => sample,
            Err(e) => return self.record_failure(e),
        };
        self.record_success();

        self.emit(LogLevel::Info, sample.summary());

        if FlatlineDetector::update(&mut self.window, sample.hashrate) == FlatlineStatus::Flatlined
            && self.settings.flatline_detection_enabled
        {
            return self.restart_flatlined(&sample).await;
        }

        let table = if self.settings.enforce_safe_pairing {
            self.pairing.as_ref()
        } else {
            None
        };

        let Some(profile) = &self.profile else {
            return TickOutcome::Inactive;
        };
        let proposal = SafetyPolicy::propose(&sample, profile, &self.settings, table);
        self.act_on(proposal, &sample).await
    }

    fn record_failure(&mut self, error: TunerError) -> TickOutcome {
        if !error.is_device_failure() {
            self.emit(LogLevel::Error, format!("Failed to read telemetry: {}", error));
            return TickOutcome::FetchFailed {
                consecutive_failures: self.consecutive_failures(),
            };
        }

        let failures = self.consecutive_failures().saturating_add(1);
        self.set_failures(failures);

        if failures >= DEGRADED_AFTER_FAILURES && self.state() == LoopState::Running {
            self.set_state(LoopState::Degraded);
            self.emit(
                LogLevel::Warning,
                format!("{} consecutive failures, device degraded: {}", failures, error),
            );
        } else {
            self.emit(LogLevel::Warning, format!("Failed to read telemetry: {}", error));
        }
        TickOutcome::FetchFailed {
            consecutive_failures: failures,
        }
    }

    fn record_success(&mut self) {
        if self.state() == LoopState::Degraded {
            self.emit(LogLevel::Success, "Device reachable again, resuming tuning");
            self.set_state(LoopState::Running);
        }
        if self.consecutive_failures() != 0 {
            self.set_failures(0);
        }
    }

    async fn restart_flatlined(&mut self, sample: &TelemetrySample) -> TickOutcome {
        self.emit(
            LogLevel::Warning,
            format!(
                "Hashrate stuck at {:.2} GH/s for {} readings, restarting",
                sample.hashrate,
                self.window.capacity()
            ),
        );
        match self.client.restart(self.address()).await {
            Ok(confirmation) => self.emit(LogLevel::Warning, confirmation),
            Err(e) => self.emit(LogLevel::Error, format!("Restart failed: {}", e)),
        }
        self.window.clear();
        TickOutcome::Restarted
    }

    async fn act_on(&mut self, proposal: Proposal, sample: &TelemetrySample) -> TickOutcome {
        match proposal {
            Proposal::NoChange => TickOutcome::Held,
            Proposal::Pinned { breaches } => {
                self.emit(
                    LogLevel::Warning,
                    format!(
                        "{} limit reached at {} with no lower permitted setting",
                        describe(&breaches),
                        sample.operating_point()
                    ),
                );
                TickOutcome::Pinned(breaches)
            }
            Proposal::Adjust {
                point,
                direction,
                breaches,
            } => {
                let reason = match direction {
                    Direction::Decrease => format!("{} limit reached, lowering", describe(&breaches)),
                    Direction::Increase => format!("Below target {:.1}°C, raising", self.settings.default_target_temp),
                };
                match self.client.apply_settings(self.address(), point).await {
                    Ok(()) => {
                        self.emit(LogLevel::Success, format!("{} to {}", reason, point));
                        TickOutcome::Adjusted(point)
                    }
                    Err(e) => {
                        self.emit(LogLevel::Error, format!("Failed to apply {}: {}", point, e));
                        TickOutcome::ApplyFailed(point)
                    }
                }
            }
        }
    }

    /// Start the loop and tick until stopped; returns the final status.
    ///
    /// The stop token is checked at the top of every tick. A stop raised
    /// mid-tick lets the in-flight device call finish.
    pub async fn run(mut self, mut stop: StopToken) -> LoopStatus {
        if self.start().await.is_err() {
            return self.status();
        }

        while !stop.is_stopped() {
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.tick_interval()) => {}
                _ = stop.stopped() => break,
            }
        }

        self.set_state(LoopState::Stopped);
        self.emit(LogLevel::Info, "Autotuning stopped");
        self.status()
    }
}

fn describe(breaches: &[Breach]) -> String {
    let names: Vec<String> = breaches.iter().map(|b| b.to_string()).collect();
    let joined = names.join("/");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Safety".to_string(),
    }
}
