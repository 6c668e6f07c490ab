//! HTTP client for AxeOS-style miner APIs
//!
//! Implements `DeviceClient` over the device's JSON REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::device::DeviceClient;
use crate::domain::{OperatingPoint, TelemetrySample};
use crate::error::{Result, TunerError};

/// Default request timeout
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Endpoint and timeout configuration for the HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_ms: u64,
    /// GET, returns system info JSON
    pub info_path: String,
    /// PATCH, accepts `{frequency, coreVoltage}`
    pub settings_path: String,
    /// POST, no body
    pub restart_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            info_path: "/api/system/info".to_string(),
            settings_path: "/api/system".to_string(),
            restart_path: "/api/system/restart".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The subset of the system info payload we tune against
#[derive(Debug, Deserialize)]
struct SystemInfo {
    frequency: f64,
    #[serde(rename = "coreVoltage")]
    core_voltage: f64,
    temp: f64,
    #[serde(rename = "vrTemp")]
    vr_temp: f64,
    #[serde(rename = "hashRate")]
    hash_rate: f64,
    power: f64,
}

/// reqwest-backed device client
pub struct HttpDeviceClient {
    client: Client,
    config: ClientConfig,
}

impl HttpDeviceClient {
    /// Create a client; every request is bounded by `config.timeout_ms`
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TunerError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self, address: &str, path: &str) -> String {
        base_url(address) + path
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn fetch_telemetry(&self, address: &str) -> Result<TelemetrySample> {
        let response = self
            .client
            .get(self.url(address, &self.config.info_path))
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TunerError::Protocol(format!("{}: unexpected HTTP status {}", address, status)));
        }

        let body = response.text().await.map_err(|e| transport_error(address, e))?;
        parse_system_info(&body)
    }

    async fn apply_settings(&self, address: &str, point: OperatingPoint) -> Result<()> {
        let response = self
            .client
            .patch(self.url(address, &self.config.settings_path))
            .json(&point)
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TunerError::Protocol(format!(
                "{}: settings rejected with HTTP status {}",
                address, status
            )));
        }
        Ok(())
    }

    async fn restart(&self, address: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url(address, &self.config.restart_path))
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TunerError::Network(format!(
                "{}: restart failed with HTTP status {}",
                address, status
            )));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("{}: could not read restart response body: {}", address, e);
                String::new()
            }
        };
        let body = body.trim();
        if body.is_empty() {
            Ok(format!("Restart command sent to {}", address))
        } else {
            Ok(format!("{}: {}", address, body))
        }
    }
}

/// `http://<address>` unless the address already carries a scheme
fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

fn transport_error(address: &str, e: reqwest::Error) -> TunerError {
    if e.is_timeout() {
        TunerError::Network(format!("{}: request timed out", address))
    } else if e.is_decode() {
        TunerError::Protocol(format!("{}: {}", address, e))
    } else {
        TunerError::Network(format!("{}: {}", address, e))
    }
}

/// Parse a system info body. Missing or non-numeric fields are protocol errors.
pub(crate) fn parse_system_info(body: &str) -> Result<TelemetrySample> {
    let info: SystemInfo =
        serde_json::from_str(body).map_err(|e| TunerError::Protocol(format!("malformed system info: {}", e)))?;

    let sample = TelemetrySample::at(
        whole_number("frequency", info.frequency)?,
        whole_number("coreVoltage", info.core_voltage)?,
    )
    .with_temp(finite("temp", info.temp)?)
    .with_vr_temp(finite("vrTemp", info.vr_temp)?)
    .with_hashrate(finite("hashRate", info.hash_rate)?)
    .with_power(finite("power", info.power)?);

    Ok(sample)
}

fn finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TunerError::Protocol(format!("{} is not a finite number", field)))
    }
}

fn whole_number(field: &str, value: f64) -> Result<u32> {
    let value = finite(field, value)?;
    if value < 0.0 || value > u32::MAX as f64 {
        return Err(TunerError::Protocol(format!("{} out of range: {}", field, value)));
    }
    Ok(value.round() as u32)
}
