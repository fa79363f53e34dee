use std::fmt;

use thiserror::Error;

/// Raw result code returned by a failing native call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NativeFailure {
    /// Numeric code as reported by the driver (e.g. a `VkResult`).
    pub code: i32,

    /// Name of the native call that failed.
    pub call: &'static str,
}

impl NativeFailure {
    pub fn new(call: &'static str, code: i32) -> Self {
        Self { code, call }
    }
}

impl fmt::Display for NativeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} returned {}", self.call, self.code)
    }
}

/// Errors raised by the device selection and initialization pipeline.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DeviceError {
    /// The graphics API could not be queried at all (driver absent, loader missing).
    #[error("graphics API unavailable: {0}")]
    PlatformQuery(String),

    /// No device satisfied the selection criteria.
    #[error("no compatible graphics device")]
    NotFound,

    /// Mutually exclusive selection flags were combined.
    #[error("invalid selection criteria: prefer-integrated and prefer-dedicated are mutually exclusive")]
    InvalidSelectionCriteria,

    /// The device lacks the listed extensions.
    #[error("device is missing required extensions: {}", .0.join(", "))]
    MissingExtensions(Vec<String>),

    /// A bind was attempted without a resolved graphics family.
    #[error("queue family assignment has no graphics family")]
    IncompleteQueueFamilies,

    #[error("logical device creation failed: {0}")]
    DeviceCreationFailed(NativeFailure),

    #[error("surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    #[error("surface query failed: {0}")]
    SurfaceQueryFailed(NativeFailure),

    /// A device from this binder is still live.
    #[error("a logical device is already bound; release it first")]
    AlreadyBound,
}

impl DeviceError {
    /// Whether the caller can reasonably retry with relaxed requirements.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeviceError::NotFound | DeviceError::MissingExtensions(_))
    }
}
