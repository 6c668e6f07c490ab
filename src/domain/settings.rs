//! Process-wide tuning settings
//!
//! Read as an immutable snapshot at the top of every tick, so edits made by the
//! config provider land on the next tick and never mid-tick.

use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Smallest flatline window that can tell "stuck" from "one reading"
const MIN_FLATLINE_WINDOW: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Voltage step in mV
    pub voltage_step: u32,
    /// Frequency step in MHz
    pub frequency_step: u32,
    /// Seconds between ticks
    pub monitor_interval: u64,
    /// Target operating temperature in °C
    pub default_target_temp: f64,
    /// Band around the target and below the ceiling, in °C
    pub temp_tolerance: f64,
    pub enforce_safe_pairing: bool,
    pub daily_reset_enabled: bool,
    /// Local wall-clock time, `HH:MM`
    pub daily_reset_time: String,
    pub flatline_detection_enabled: bool,
    #[serde(alias = "flatline_hashrate_repeat_count")]
    pub flatline_repeat_count: usize,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            voltage_step: 10,
            frequency_step: 25,
            monitor_interval: 10,
            default_target_temp: 55.0,
            temp_tolerance: 2.0,
            enforce_safe_pairing: false,
            daily_reset_enabled: false,
            daily_reset_time: "03:00".to_string(),
            flatline_detection_enabled: true,
            flatline_repeat_count: 5,
        }
    }
}

impl GlobalSettings {
    /// Tick interval; never shorter than one second
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval.max(1))
    }

    /// Capacity of the per-device flatline window
    pub fn flatline_window_len(&self) -> usize {
        self.flatline_repeat_count.max(MIN_FLATLINE_WINDOW)
    }

    /// Parse `daily_reset_time` as a local `HH:MM`
    pub fn reset_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_reset_time.trim(), "%H:%M").map_err(|e| {
            TunerError::Configuration(format!("invalid daily_reset_time '{}': {}", self.daily_reset_time, e))
        })
    }
}
