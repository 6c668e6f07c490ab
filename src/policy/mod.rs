//! Tuning policy - what operating point a device should move to next

mod pairing;
mod safety;

pub use pairing::SafePairingTable;
pub use safety::{Breach, Direction, Proposal, SafetyPolicy};
