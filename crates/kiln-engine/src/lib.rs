//! Kiln engine crate.
//!
//! GPU device selection and initialization, the window runtime that hosts it,
//! and the fixed-rate tick loop that drives applications.

pub mod content;
pub mod core;
pub mod device;
pub mod logging;
pub mod time;
pub mod window;
