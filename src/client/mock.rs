//! Scripted in-memory device client
//!
//! Used by tests and dry runs. Each address can be given a queue of scripted
//! fetch results and a sticky "current" sample that tracks applied settings,
//! so a mock device behaves like hardware that obeys what it is told.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::device::DeviceClient;
use crate::domain::{OperatingPoint, TelemetrySample};
use crate::error::{Result, TunerError};

/// A call recorded by the mock, in order of arrival
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Fetch(String),
    Apply(String, OperatingPoint),
    Restart(String),
}

#[derive(Default)]
struct MockState {
    scripted: HashMap<String, VecDeque<Result<TelemetrySample>>>,
    current: HashMap<String, TelemetrySample>,
    failing_apply: HashSet<String>,
    failing_restart: HashSet<String>,
    calls: Vec<MockCall>,
}

#[derive(Default)]
pub struct MockDeviceClient {
    state: Mutex<MockState>,
}

impl MockDeviceClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sticky sample returned whenever nothing is scripted
    pub fn set_telemetry(&self, address: &str, sample: TelemetrySample) {
        self.state().current.insert(address.to_string(), sample);
    }

    /// Queue a one-shot fetch result
    pub fn push_telemetry(&self, address: &str, sample: TelemetrySample) {
        self.push_result(address, Ok(sample));
    }

    /// Queue a one-shot fetch failure
    pub fn push_failure(&self, address: &str, error: TunerError) {
        self.push_result(address, Err(error));
    }

    fn push_result(&self, address: &str, result: Result<TelemetrySample>) {
        self.state()
            .scripted
            .entry(address.to_string())
            .or_default()
            .push_back(result);
    }

    /// Make every `apply_settings` for this address fail
    pub fn fail_apply(&self, address: &str) {
        self.state().failing_apply.insert(address.to_string());
    }

    /// Make every `restart` for this address fail
    pub fn fail_restart(&self, address: &str) {
        self.state().failing_restart.insert(address.to_string());
    }

    /// All recorded calls
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Recorded calls for one address
    pub fn calls_for(&self, address: &str) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                MockCall::Fetch(a) | MockCall::Apply(a, _) | MockCall::Restart(a) => a == address,
            })
            .collect()
    }

    /// Operating points applied to one address, in order
    pub fn applied(&self, address: &str) -> Vec<OperatingPoint> {
        self.calls_for(address)
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Apply(_, point) => Some(point),
                _ => None,
            })
            .collect()
    }

    /// Number of restarts issued to one address
    pub fn restarts(&self, address: &str) -> usize {
        self.calls_for(address)
            .iter()
            .filter(|call| matches!(call, MockCall::Restart(_)))
            .count()
    }
}

#[async_trait]
impl DeviceClient for MockDeviceClient {
    async fn fetch_telemetry(&self, address: &str) -> Result<TelemetrySample> {
        let mut state = self.state();
        state.calls.push(MockCall::Fetch(address.to_string()));

        if let Some(result) = state.scripted.get_mut(address).and_then(|queue| queue.pop_front()) {
            return result;
        }
        state
            .current
            .get(address)
            .cloned()
            .ok_or_else(|| TunerError::Network(format!("{}: no route to host", address)))
    }

    async fn apply_settings(&self, address: &str, point: OperatingPoint) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::Apply(address.to_string(), point));

        if state.failing_apply.contains(address) {
            return Err(TunerError::Network(format!("{}: request timed out", address)));
        }
        if let Some(sample) = state.current.get_mut(address) {
            sample.frequency = point.frequency;
            sample.core_voltage = point.core_voltage;
        }
        Ok(())
    }

    async fn restart(&self, address: &str) -> Result<String> {
        let mut state = self.state();
        state.calls.push(MockCall::Restart(address.to_string()));

        if state.failing_restart.contains(address) {
            return Err(TunerError::Network(format!("{}: request timed out", address)));
        }
        Ok(format!("Restart command sent to {}", address))
    }
}
