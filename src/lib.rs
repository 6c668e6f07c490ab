//! axetune - fleet autotuner for network-attached ASIC miners
//!
//! Runs one control loop per miner that keeps frequency and core voltage as
//! high as the device's temperature and power limits allow, restarts miners
//! whose hashrate output has frozen, and optionally restarts the whole fleet
//! once a day.

pub mod client;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod flatline;
pub mod manager;
pub mod policy;
pub mod provider;
pub mod runner;
pub mod sink;

pub use error::{Result, TunerError};
