//! Device client trait definition

use async_trait::async_trait;

use crate::domain::{OperatingPoint, TelemetrySample};
use crate::error::Result;

/// Access to one miner's network API.
///
/// Implementations bound every call with a timeout and never retry; failure
/// counting and backoff belong to the control loop. Errors are
/// `TunerError::Network` (unreachable, timed out) or `TunerError::Protocol`
/// (the device answered with something unusable).
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Read the current telemetry
    async fn fetch_telemetry(&self, address: &str) -> Result<TelemetrySample>;

    /// Ask the device to run at `point`. Fire-and-confirm: only the next poll
    /// tells whether it took effect.
    async fn apply_settings(&self, address: &str, point: OperatingPoint) -> Result<()>;

    /// Restart the device, returning a confirmation message
    async fn restart(&self, address: &str) -> Result<String>;
}
