//! Fleet management
//!
//! Owns the set of running control loops and the daily reset watcher.

mod daily_reset;
mod fleet;

pub use daily_reset::{Clock, DailyResetWatcher, FixedClock, ResetCheck, SystemClock, WatcherConfig};
pub use fleet::{FleetHandle, FleetSupervisor, LoopHandle};
