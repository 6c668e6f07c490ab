//! Safe frequency/voltage pairing table
//!
//! An operator- or vendor-supplied list of the only operating points a device
//! model may ever run at. Entries ascend in frequency (at most one voltage per
//! frequency) and voltage never decreases as frequency rises.

use serde::{Deserialize, Serialize};

use crate::domain::{OperatingPoint, TuningProfile};
use crate::error::{Result, TunerError};
use crate::policy::safety::Direction;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<OperatingPoint>", into = "Vec<OperatingPoint>")]
pub struct SafePairingTable {
    pairs: Vec<OperatingPoint>,
}

impl SafePairingTable {
    /// Build a table, rejecting unsorted, duplicated or non-monotonic entries
    pub fn new(pairs: Vec<OperatingPoint>) -> Result<Self> {
        for w in pairs.windows(2) {
            let (a, b) = (w[0], w[1]);
            if b.frequency <= a.frequency {
                return Err(TunerError::Configuration(format!(
                    "safe pairs must ascend strictly by frequency: {} follows {}",
                    b, a
                )));
            }
            if b.core_voltage < a.core_voltage {
                return Err(TunerError::Configuration(format!(
                    "safe pair voltage decreases with frequency: {} follows {}",
                    b, a
                )));
            }
        }
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[OperatingPoint] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn contains(&self, point: OperatingPoint) -> bool {
        self.pairs.binary_search(&point).is_ok()
    }

    /// Snap a candidate onto the table.
    ///
    /// Picks the entry with the highest frequency not above the candidate's,
    /// considering only entries inside the profile bounds. When moving down,
    /// the entry's voltage must not exceed the candidate's either, so a
    /// decrease never raises voltage.
    pub fn snap(&self, candidate: OperatingPoint, direction: Direction, profile: &TuningProfile) -> Option<OperatingPoint> {
        self.pairs
            .iter()
            .copied()
            .filter(|p| profile.contains(*p))
            .filter(|p| p.frequency <= candidate.frequency)
            .filter(|p| direction == Direction::Increase || p.core_voltage <= candidate.core_voltage)
            .next_back()
    }
}

impl TryFrom<Vec<OperatingPoint>> for SafePairingTable {
    type Error = TunerError;

    fn try_from(pairs: Vec<OperatingPoint>) -> Result<Self> {
        Self::new(pairs)
    }
}

impl From<SafePairingTable> for Vec<OperatingPoint> {
    fn from(table: SafePairingTable) -> Self {
        table.pairs
    }
}
