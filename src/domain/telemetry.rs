//! Telemetry samples and operating points

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A (frequency, core voltage) pair a device can be asked to run at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// ASIC frequency in MHz
    pub frequency: u32,
    /// Core voltage in mV
    #[serde(rename = "coreVoltage")]
    pub core_voltage: u32,
}

impl OperatingPoint {
    pub fn new(frequency: u32, core_voltage: u32) -> Self {
        Self {
            frequency,
            core_voltage,
        }
    }
}

impl fmt::Display for OperatingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MHz @ {} mV", self.frequency, self.core_voltage)
    }
}

/// One telemetry poll
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    /// Applied frequency in MHz
    pub frequency: u32,
    /// Applied core voltage in mV
    pub core_voltage: u32,
    /// ASIC temperature in °C
    pub temp: f64,
    /// Voltage regulator temperature in °C
    pub vr_temp: f64,
    /// Hashrate in GH/s
    pub hashrate: f64,
    /// Power draw in W
    pub power: f64,
    pub fetched_at: DateTime<Utc>,
}

impl TelemetrySample {
    /// A sample at the given operating point with all sensor readings zeroed
    pub fn at(frequency: u32, core_voltage: u32) -> Self {
        Self {
            frequency,
            core_voltage,
            temp: 0.0,
            vr_temp: 0.0,
            hashrate: 0.0,
            power: 0.0,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_temp(mut self, temp: f64) -> Self {
        self.temp = temp;
        self
    }

    pub fn with_vr_temp(mut self, vr_temp: f64) -> Self {
        self.vr_temp = vr_temp;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    pub fn with_hashrate(mut self, hashrate: f64) -> Self {
        self.hashrate = hashrate;
        self
    }

    pub fn operating_point(&self) -> OperatingPoint {
        OperatingPoint::new(self.frequency, self.core_voltage)
    }

    /// One-line summary for logs and the `status` command
    pub fn summary(&self) -> String {
        format!(
            "{} MHz, {} mV, {:.1}°C (VR {:.1}°C), {:.2} GH/s, {:.2} W",
            self.frequency, self.core_voltage, self.temp, self.vr_temp, self.hashrate, self.power
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operating_point_display() {
        assert_eq!(OperatingPoint::new(525, 1150).to_string(), "525 MHz @ 1150 mV");
    }

    #[test]
    fn test_operating_point_wire_names() {
        let json = serde_json::to_value(OperatingPoint::new(490, 1166)).unwrap();
        assert_eq!(json["frequency"], 490);
        assert_eq!(json["coreVoltage"], 1166);
    }

    #[test]
    fn test_sample_builder() {
        let sample = TelemetrySample::at(500, 1150)
            .with_temp(61.5)
            .with_vr_temp(70.0)
            .with_power(14.2)
            .with_hashrate(1020.5);
        assert_eq!(sample.operating_point(), OperatingPoint::new(500, 1150));
        assert_eq!(sample.temp, 61.5);
        assert_eq!(sample.hashrate, 1020.5);
        assert!(sample.summary().contains("61.5°C"));
    }
}
