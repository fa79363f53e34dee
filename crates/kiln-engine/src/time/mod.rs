//! Time subsystem.
//!
//! Fixed-rate scheduling for the engine tick loop, independent of the window
//! runtime so it can be tested with synthetic timestamps.

mod tick_clock;

pub use tick_clock::{TickClock, TickTime};
