//! Config provider
//!
//! Read-only source of the device list, the global settings and the safe
//! pairing tables. Loops ask for a fresh settings snapshot at the top of every
//! tick, so whatever the provider returns is picked up without a restart.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Config;
use crate::domain::{DeviceRecord, GlobalSettings};
use crate::error::Result;
use crate::policy::SafePairingTable;

pub trait ConfigProvider: Send + Sync {
    /// Every registered device, enabled or not
    fn list_devices(&self) -> Result<Vec<DeviceRecord>>;

    fn global_settings(&self) -> Result<GlobalSettings>;

    /// Safe pairing table for a device type, if one is configured
    fn safe_pairing_table(&self, device_type: &str) -> Result<Option<SafePairingTable>>;

    /// Settings and pairing table for one device type, taken together
    fn tuning_snapshot(&self, device_type: &str) -> Result<TuningSnapshot> {
        Ok(TuningSnapshot {
            settings: self.global_settings()?,
            pairing: self.safe_pairing_table(device_type)?,
        })
    }
}

/// What a control loop needs from the provider on each tick
#[derive(Debug, Clone, Default)]
pub struct TuningSnapshot {
    pub settings: GlobalSettings,
    pub pairing: Option<SafePairingTable>,
}

/// Re-reads a YAML config file on every call
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Config> {
        Config::load_from_file(&self.path)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.read()?.miners)
    }

    fn global_settings(&self) -> Result<GlobalSettings> {
        Ok(self.read()?.settings)
    }

    fn safe_pairing_table(&self, device_type: &str) -> Result<Option<SafePairingTable>> {
        Ok(self.read()?.safe_pairs.remove(device_type))
    }

    /// One file read for both values
    fn tuning_snapshot(&self, device_type: &str) -> Result<TuningSnapshot> {
        let mut config = self.read()?;
        Ok(TuningSnapshot {
            pairing: config.safe_pairs.remove(device_type),
            settings: config.settings,
        })
    }
}

/// In-memory provider; the held config can be edited while loops run
#[derive(Debug, Default)]
pub struct StaticConfigProvider {
    config: RwLock<Config>,
}

impl StaticConfigProvider {
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Config> {
        self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply an edit to the held config
    pub fn update(&self, edit: impl FnOnce(&mut Config)) {
        edit(&mut *self.write());
    }

    pub fn set_settings(&self, settings: GlobalSettings) {
        self.update(|c| c.settings = settings);
    }

    pub fn snapshot(&self) -> Config {
        self.read().clone()
    }
}

impl From<Config> for StaticConfigProvider {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.read().miners.clone())
    }

    fn global_settings(&self) -> Result<GlobalSettings> {
        Ok(self.read().settings.clone())
    }

    fn safe_pairing_table(&self, device_type: &str) -> Result<Option<SafePairingTable>> {
        Ok(self.read().safe_pairs.get(device_type).cloned())
    }

    fn tuning_snapshot(&self, device_type: &str) -> Result<TuningSnapshot> {
        let config = self.read();
        Ok(TuningSnapshot {
            settings: config.settings.clone(),
            pairing: config.safe_pairs.get(device_type).cloned(),
        })
    }
}
