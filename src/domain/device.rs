//! Device records and tuning profiles
//!
//! A `DeviceRecord` is what the config provider hands us: identity plus a set of
//! optional profile fields. `TuningProfile` is the validated form a control loop
//! runs against.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::telemetry::OperatingPoint;

/// Immutable identity of a registered device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Network address (IP or host, optionally with scheme)
    pub address: String,
    /// Device model, used to pick a safe pairing table
    #[serde(rename = "type", default)]
    pub device_type: String,
    /// Display name
    #[serde(default)]
    pub nickname: String,
}

impl DeviceIdentity {
    pub fn new(address: impl Into<String>, device_type: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            device_type: device_type.into(),
            nickname: nickname.into(),
        }
    }

    /// Human-readable label: `nickname (address)` or just the address
    pub fn label(&self) -> String {
        if self.nickname.is_empty() {
            self.address.clone()
        } else {
            format!("{} ({})", self.nickname, self.address)
        }
    }
}

/// Profile fields as stored by the config provider; any of them may be absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub min_freq: Option<u32>,
    pub max_freq: Option<u32>,
    pub start_freq: Option<u32>,
    pub min_volt: Option<u32>,
    pub max_volt: Option<u32>,
    pub start_volt: Option<u32>,
    pub max_temp: Option<f64>,
    pub max_watts: Option<f64>,
    pub max_vr_temp: Option<f64>,
}

/// A device as registered with the config provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(flatten)]
    pub identity: DeviceIdentity,
    #[serde(flatten)]
    pub profile: ProfileFields,
    #[serde(default)]
    pub enabled: bool,
}

impl DeviceRecord {
    pub fn new(identity: DeviceIdentity, profile: ProfileFields) -> Self {
        Self {
            identity,
            profile,
            enabled: true,
        }
    }

    /// Mark the record enabled or disabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn address(&self) -> &str {
        &self.identity.address
    }

    /// Validate the stored fields, collecting every problem rather than stopping at the first
    pub fn tuning_profile(&self) -> Result<TuningProfile, Vec<ProfileIssue>> {
        let p = &self.profile;
        let address = self.address();
        let mut issues = Vec::new();

        let mut require_u32 = |field: ProfileField, value: Option<u32>| {
            if value.is_none() {
                issues.push(ProfileIssue::new(address, field, IssueKind::Missing));
            }
            value.unwrap_or_default()
        };
        let min_freq = require_u32(ProfileField::MinFreq, p.min_freq);
        let max_freq = require_u32(ProfileField::MaxFreq, p.max_freq);
        let min_volt = require_u32(ProfileField::MinVolt, p.min_volt);
        let max_volt = require_u32(ProfileField::MaxVolt, p.max_volt);

        let mut require_f64 = |field: ProfileField, value: Option<f64>| match value {
            Some(v) if v.is_finite() => v,
            Some(_) => {
                issues.push(ProfileIssue::new(address, field, IssueKind::Invalid("not a finite number".into())));
                0.0
            }
            None => {
                issues.push(ProfileIssue::new(address, field, IssueKind::Missing));
                0.0
            }
        };
        let max_temp = require_f64(ProfileField::MaxTemp, p.max_temp);
        let max_watts = require_f64(ProfileField::MaxWatts, p.max_watts);
        let max_vr_temp = require_f64(ProfileField::MaxVrTemp, p.max_vr_temp);

        // Range checks only make sense once both ends are known
        if let (Some(lo), Some(hi)) = (p.min_freq, p.max_freq) {
            if lo > hi {
                issues.push(ProfileIssue::new(
                    address,
                    ProfileField::MaxFreq,
                    IssueKind::Invalid(format!("{} is below min_freq {}", hi, lo)),
                ));
            } else if let Some(start) = p.start_freq {
                if !(lo..=hi).contains(&start) {
                    issues.push(ProfileIssue::new(
                        address,
                        ProfileField::StartFreq,
                        IssueKind::Invalid(format!("{} is outside {}..={}", start, lo, hi)),
                    ));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (p.min_volt, p.max_volt) {
            if lo > hi {
                issues.push(ProfileIssue::new(
                    address,
                    ProfileField::MaxVolt,
                    IssueKind::Invalid(format!("{} is below min_volt {}", hi, lo)),
                ));
            } else if let Some(start) = p.start_volt {
                if !(lo..=hi).contains(&start) {
                    issues.push(ProfileIssue::new(
                        address,
                        ProfileField::StartVolt,
                        IssueKind::Invalid(format!("{} is outside {}..={}", start, lo, hi)),
                    ));
                }
            }
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        Ok(TuningProfile {
            min_freq,
            max_freq,
            start_freq: p.start_freq,
            min_volt,
            max_volt,
            start_volt: p.start_volt,
            max_temp,
            max_watts,
            max_vr_temp,
        })
    }
}

/// Validated per-device tuning bounds
#[derive(Debug, Clone, PartialEq)]
pub struct TuningProfile {
    pub min_freq: u32,
    pub max_freq: u32,
    pub start_freq: Option<u32>,
    pub min_volt: u32,
    pub max_volt: u32,
    pub start_volt: Option<u32>,
    pub max_temp: f64,
    pub max_watts: f64,
    pub max_vr_temp: f64,
}

impl TuningProfile {
    /// Clamp an operating point into `[min_freq,max_freq] x [min_volt,max_volt]`
    pub fn clamp(&self, point: OperatingPoint) -> OperatingPoint {
        OperatingPoint {
            frequency: point.frequency.clamp(self.min_freq, self.max_freq),
            core_voltage: point.core_voltage.clamp(self.min_volt, self.max_volt),
        }
    }

    /// Whether the point lies inside the configured bounds
    pub fn contains(&self, point: OperatingPoint) -> bool {
        (self.min_freq..=self.max_freq).contains(&point.frequency)
            && (self.min_volt..=self.max_volt).contains(&point.core_voltage)
    }

    /// Configured start point, when both halves are present
    pub fn start_point(&self) -> Option<OperatingPoint> {
        Some(OperatingPoint::new(self.start_freq?, self.start_volt?))
    }
}

/// Names of the profile fields, as they appear in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    MinFreq,
    MaxFreq,
    StartFreq,
    MinVolt,
    MaxVolt,
    StartVolt,
    MaxTemp,
    MaxWatts,
    MaxVrTemp,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::MinFreq => "min_freq",
            ProfileField::MaxFreq => "max_freq",
            ProfileField::StartFreq => "start_freq",
            ProfileField::MinVolt => "min_volt",
            ProfileField::MaxVolt => "max_volt",
            ProfileField::StartVolt => "start_volt",
            ProfileField::MaxTemp => "max_temp",
            ProfileField::MaxWatts => "max_watts",
            ProfileField::MaxVrTemp => "max_vr_temp",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is wrong with a profile field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    Invalid(String),
}

/// One problem found while validating a device's profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileIssue {
    pub address: String,
    pub field: ProfileField,
    pub kind: IssueKind,
}

impl ProfileIssue {
    pub fn new(address: impl Into<String>, field: ProfileField, kind: IssueKind) -> Self {
        Self {
            address: address.into(),
            field,
            kind,
        }
    }
}

impl fmt::Display for ProfileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "{}: missing {}", self.address, self.field),
            IssueKind::Invalid(reason) => write!(f, "{}: invalid {} ({})", self.address, self.field, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fields() -> ProfileFields {
        ProfileFields {
            min_freq: Some(400),
            max_freq: Some(600),
            start_freq: Some(500),
            min_volt: Some(1100),
            max_volt: Some(1200),
            start_volt: Some(1150),
            max_temp: Some(60.0),
            max_watts: Some(15.0),
            max_vr_temp: Some(85.0),
        }
    }

    fn record(fields: ProfileFields) -> DeviceRecord {
        DeviceRecord::new(DeviceIdentity::new("10.0.0.5", "Gamma", "rig-1"), fields)
    }

    #[test]
    fn test_identity_label() {
        assert_eq!(DeviceIdentity::new("10.0.0.5", "Gamma", "rig-1").label(), "rig-1 (10.0.0.5)");
        assert_eq!(DeviceIdentity::new("10.0.0.5", "Gamma", "").label(), "10.0.0.5");
    }

    #[test]
    fn test_full_profile_validates() {
        let profile = record(full_fields()).tuning_profile().unwrap();
        assert_eq!(profile.min_freq, 400);
        assert_eq!(profile.max_volt, 1200);
        assert_eq!(profile.start_point(), Some(OperatingPoint::new(500, 1150)));
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let fields = ProfileFields {
            max_temp: None,
            max_watts: None,
            ..full_fields()
        };
        let issues = record(fields).tuning_profile().unwrap_err();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.kind == IssueKind::Missing));
        assert_eq!(issues[0].field, ProfileField::MaxTemp);
        assert_eq!(issues[1].field, ProfileField::MaxWatts);
    }

    #[test]
    fn test_start_fields_are_optional() {
        let fields = ProfileFields {
            start_freq: None,
            start_volt: None,
            ..full_fields()
        };
        let profile = record(fields).tuning_profile().unwrap();
        assert_eq!(profile.start_point(), None);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let fields = ProfileFields {
            min_freq: Some(700),
            ..full_fields()
        };
        let issues = record(fields).tuning_profile().unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, ProfileField::MaxFreq);
        assert!(matches!(issues[0].kind, IssueKind::Invalid(_)));
    }

    #[test]
    fn test_start_outside_bounds_rejected() {
        let fields = ProfileFields {
            start_volt: Some(1300),
            ..full_fields()
        };
        let issues = record(fields).tuning_profile().unwrap_err();
        assert_eq!(issues[0].field, ProfileField::StartVolt);
    }

    #[test]
    fn test_clamp_and_contains() {
        let profile = record(full_fields()).tuning_profile().unwrap();
        let clamped = profile.clamp(OperatingPoint::new(650, 1050));
        assert_eq!(clamped, OperatingPoint::new(600, 1100));
        assert!(profile.contains(clamped));
        assert!(!profile.contains(OperatingPoint::new(399, 1150)));
    }

    #[test]
    fn test_issue_display() {
        let issue = ProfileIssue::new("10.0.0.5", ProfileField::MaxVrTemp, IssueKind::Missing);
        assert_eq!(issue.to_string(), "10.0.0.5: missing max_vr_temp");
    }

    #[test]
    fn test_record_from_yaml() {
        let yaml = r#"
address: 192.168.1.40
type: Supra
nickname: shelf
min_freq: 400
max_freq: 575
min_volt: 1100
max_volt: 1250
max_temp: 65
max_watts: 20
max_vr_temp: 80
enabled: true
"#;
        let record: DeviceRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record.identity.address, "192.168.1.40");
        assert_eq!(record.identity.device_type, "Supra");
        assert!(record.enabled);
        assert_eq!(record.profile.start_freq, None);
        let profile = record.tuning_profile().unwrap();
        assert_eq!(profile.max_temp, 65.0);
    }
}
