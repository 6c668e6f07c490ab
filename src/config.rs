use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;
use crate::domain::{DeviceRecord, GlobalSettings};
use crate::error::{Result, TunerError};
use crate::manager::WatcherConfig;
use crate::policy::SafePairingTable;

/// The on-disk configuration: miners, their profiles and the global settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub client: ClientConfig,
    pub settings: GlobalSettings,
    pub watcher: WatcherConfig,
    pub miners: Vec<DeviceRecord>,
    /// Safe pairing tables keyed by device type
    pub safe_pairs: HashMap<String, SafePairingTable>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            client: ClientConfig::default(),
            settings: GlobalSettings::default(),
            watcher: WatcherConfig::default(),
            miners: Vec::new(),
            safe_pairs: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, returning the config and the file it came from
    pub fn load(config_path: Option<&PathBuf>) -> eyre::Result<(Self, Option<PathBuf>)> {
        use eyre::Context;

        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            let config = Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()))?;
            return Ok((config, Some(path.clone())));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok((config, Some(primary_config))),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok((config, Some(fallback_config))),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok((Self::default(), None))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        log::debug!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.settings.voltage_step == 0 || config.settings.frequency_step == 0 {
            return Err(TunerError::Configuration(
                "voltage_step and frequency_step must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    /// Miners with autotuning switched on
    pub fn enabled_miners(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.miners.iter().filter(|m| m.enabled)
    }

    pub fn find_miner(&self, address: &str) -> Option<&DeviceRecord> {
        self.miners.iter().find(|m| m.address() == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperatingPoint;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
log_level: debug
client:
  timeout_ms: 2500
settings:
  voltage_step: 5
  monitor_interval: 15
  enforce_safe_pairing: true
  daily_reset_enabled: true
  daily_reset_time: "04:15"
miners:
  - address: 192.168.1.50
    type: BM1368
    nickname: Gamma
    enabled: true
    min_freq: 400
    max_freq: 600
    start_freq: 500
    min_volt: 1100
    max_volt: 1200
    start_volt: 1150
    max_temp: 60
    max_watts: 15
    max_vr_temp: 85
  - address: 192.168.1.51
    type: BM1366
safe_pairs:
  BM1368:
    - { frequency: 425, coreVoltage: 1100 }
    - { frequency: 500, coreVoltage: 1150 }
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, Some("info".to_string()));
        assert_eq!(config.client.timeout_ms, 5000);
        assert_eq!(config.settings, GlobalSettings::default());
        assert!(config.miners.is_empty());
        assert!(config.safe_pairs.is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.client.timeout_ms, 2500);
        assert_eq!(config.client.info_path, "/api/system/info");
        assert_eq!(config.settings.voltage_step, 5);
        assert_eq!(config.settings.frequency_step, 25);
        assert!(config.settings.enforce_safe_pairing);
        assert_eq!(config.settings.daily_reset_time, "04:15");

        assert_eq!(config.miners.len(), 2);
        let gamma = &config.miners[0];
        assert_eq!(gamma.identity.device_type, "BM1368");
        assert_eq!(gamma.identity.nickname, "Gamma");
        assert!(gamma.enabled);
        assert!(gamma.tuning_profile().is_ok());

        let other = &config.miners[1];
        assert!(!other.enabled);
        assert_eq!(other.profile.max_freq, None);

        let table = &config.safe_pairs["BM1368"];
        assert!(table.contains(OperatingPoint::new(500, 1150)));
    }

    #[test]
    fn test_enabled_and_find() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let enabled: Vec<_> = config.enabled_miners().map(|m| m.address()).collect();
        assert_eq!(enabled, vec!["192.168.1.50"]);
        assert!(config.find_miner("192.168.1.51").is_some());
        assert!(config.find_miner("10.0.0.1").is_none());
    }

    #[test]
    fn test_rejects_unsorted_pairs() {
        let yaml = r#"
safe_pairs:
  BM1368:
    - { frequency: 500, coreVoltage: 1150 }
    - { frequency: 425, coreVoltage: 1100 }
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_zero_step() {
        let yaml = "settings:\n  frequency_step: 0\n";
        assert!(matches!(Config::from_yaml(yaml), Err(TunerError::Configuration(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let path = file.path().to_path_buf();

        let (config, source) = Config::load(Some(&path)).unwrap();
        assert_eq!(config.miners.len(), 2);
        assert_eq!(source, Some(path));
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let path = PathBuf::from("/nonexistent/axetune.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
