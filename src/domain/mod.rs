//! Domain types for axetune
//!
//! This module contains the core domain types:
//! - DeviceIdentity / DeviceRecord / TuningProfile: what a device is and the bounds it is tuned within
//! - GlobalSettings: process-wide step sizes, intervals and feature toggles
//! - TelemetrySample / OperatingPoint: what a device reports and what we ask of it
//! - LogEvent: messages for the log sink

pub mod device;
pub mod event;
pub mod settings;
pub mod telemetry;

pub use device::{DeviceIdentity, DeviceRecord, IssueKind, ProfileField, ProfileFields, ProfileIssue, TuningProfile};
pub use event::{LogEvent, LogLevel, LogSource};
pub use settings::GlobalSettings;
pub use telemetry::{OperatingPoint, TelemetrySample};
