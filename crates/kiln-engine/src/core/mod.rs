//! Core engine-facing contracts.
//!
//! [`App`] is what higher layers implement; [`Engine`] drives it from a fixed
//! tick thread and reports lifecycle through [`EngineEvent`]s.

mod app;
mod engine;
mod signal;

pub use app::{App, AppControl};
pub use engine::{Engine, EngineConfig, EngineEvent, EngineHandle};
pub use signal::StopSignal;
