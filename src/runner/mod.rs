//! Control loop runner
//!
//! One `ControlLoop` per enabled device, each on its own task.

mod control_loop;

pub use control_loop::{ControlLoop, DEGRADED_AFTER_FAILURES, LoopState, LoopStatus, TickOutcome};
