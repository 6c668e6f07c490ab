//! Device Client Layer - miner network API
//!
//! This module provides:
//! - DeviceClient trait for the miner API seam
//! - HttpDeviceClient implementation over reqwest
//! - MockDeviceClient for tests and dry runs

pub mod device;
pub mod http;
pub mod mock;

pub use device::DeviceClient;
pub use http::{ClientConfig, HttpDeviceClient};
pub use mock::{MockCall, MockDeviceClient};
