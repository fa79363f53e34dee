use crate::time::TickTime;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by the engine tick loop.
///
/// All callbacks run on the tick thread.
pub trait App: Send + 'static {
    /// Called once before the first tick. Returning `Exit` skips the loop.
    fn on_start(&mut self) -> AppControl {
        AppControl::Continue
    }

    /// Called once per tick.
    fn on_tick(&mut self, time: TickTime) -> AppControl;

    /// Called once after the last tick.
    fn on_stop(&mut self) {}
}
