//! Error types for axetune
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::domain::ProfileIssue;

/// All error types that can occur while tuning a fleet
#[derive(Debug, Error)]
pub enum TunerError {
    /// Invalid configuration value (fatal to whatever consumed it)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One or more enabled devices have missing or invalid profile fields
    #[error("Tuning profiles are incomplete: {}", format_issues(.0))]
    IncompleteProfiles(Vec<ProfileIssue>),

    /// Start was requested but no device is enabled
    #[error("No devices are enabled for autotuning")]
    NoDevicesEnabled,

    /// Device unreachable or request timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Device answered with something we could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TunerError {
    /// Errors that count toward a loop's consecutive-failure counter
    pub fn is_device_failure(&self) -> bool {
        matches!(self, TunerError::Network(_) | TunerError::Protocol(_))
    }
}

fn format_issues(issues: &[ProfileIssue]) -> String {
    issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}

/// Result type alias for axetune operations
pub type Result<T> = std::result::Result<T, TunerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueKind, ProfileField};

    #[test]
    fn test_network_error() {
        let err = TunerError::Network("timed out".to_string());
        assert_eq!(err.to_string(), "Network error: timed out");
        assert!(err.is_device_failure());
    }

    #[test]
    fn test_protocol_error() {
        let err = TunerError::Protocol("missing field `temp`".to_string());
        assert_eq!(err.to_string(), "Protocol error: missing field `temp`");
        assert!(err.is_device_failure());
    }

    #[test]
    fn test_configuration_error_is_not_device_failure() {
        let err = TunerError::Configuration("bad reset time".to_string());
        assert!(!err.is_device_failure());
        assert!(!TunerError::NoDevicesEnabled.is_device_failure());
    }

    #[test]
    fn test_incomplete_profiles_lists_every_issue() {
        let err = TunerError::IncompleteProfiles(vec![
            ProfileIssue::new("10.0.0.5", ProfileField::MaxTemp, IssueKind::Missing),
            ProfileIssue::new("10.0.0.6", ProfileField::MinVolt, IssueKind::Missing),
        ]);
        let text = err.to_string();
        assert!(text.contains("10.0.0.5: missing max_temp"));
        assert!(text.contains("10.0.0.6: missing min_volt"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TunerError = io_err.into();
        assert!(matches!(err, TunerError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
