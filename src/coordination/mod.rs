//! Coordination between the supervisor and its loops

mod signals;

pub use signals::{StopSignal, StopToken};
