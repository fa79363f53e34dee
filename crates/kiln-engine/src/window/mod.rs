//! Window + runtime loop.
//!
//! Owns the `winit` event loop and window, runs graphics initialization for the
//! window, and couples its lifetime to the tick engine.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
