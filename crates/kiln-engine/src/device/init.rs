use super::selection::{DeviceQuery, SelectionCriteria};
use super::swapchain::PresentMode;

/// Device extension every presenting renderer needs.
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Initialization parameters for the GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Application name reported to the driver.
    pub app_name: String,

    /// Device selection policy.
    ///
    /// `PREFER_INTEGRATED` and `PREFER_DEDICATED` together fail initialization
    /// before the driver is touched.
    pub criteria: SelectionCriteria,

    /// Explicit device request; narrows candidates before `criteria` apply.
    pub device: Option<DeviceQuery>,

    /// Device extensions the logical device must enable.
    ///
    /// Devices lacking any of them are treated as unsuitable.
    pub required_device_extensions: Vec<String>,

    /// Instance extensions on top of the ones the window system requires.
    pub instance_extensions: Vec<String>,

    /// Enable validation layers and forward their messages to the logger.
    ///
    /// Diagnostic only; if the layers are not installed, initialization continues
    /// without them.
    pub enable_validation: bool,

    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Preferred present mode. FIFO is used when the surface lacks it.
    pub present_mode: PresentMode,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            app_name: "kiln".to_string(),
            criteria: SelectionCriteria::empty(),
            device: None,
            required_device_extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            instance_extensions: Vec::new(),
            enable_validation: cfg!(debug_assertions),
            prefer_srgb: true,
            present_mode: PresentMode::Fifo,
        }
    }
}
