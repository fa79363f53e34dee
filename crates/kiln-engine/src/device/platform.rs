use raw_window_handle::{HandleError, RawDisplayHandle, RawWindowHandle};

use super::error::{DeviceError, NativeFailure};
use super::record::{
    DeviceRecord, LogicalDeviceHandle, PhysicalDeviceHandle, QueueHandle, SurfaceHandle,
};
use super::swapchain::{PresentMode, SurfaceCapabilities, SurfaceFormat};

/// Window-side inputs the device pipeline needs.
///
/// The window must outlive every surface created from it.
pub trait SurfaceTarget {
    /// Raw display and window handles of the native window.
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError>;

    /// Current framebuffer size in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

impl SurfaceTarget for winit::window::Window {
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

        let display = self.display_handle()?.as_raw();
        let window = self.window_handle()?.as_raw();
        Ok((display, window))
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}

/// One queue-creation request: a single queue from `family` at `priority`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QueueRequest {
    pub family: u32,
    pub priority: f32,
}

/// Parameters for logical device creation.
#[derive(Debug, Clone)]
pub struct LogicalDeviceRequest<'a> {
    pub physical: PhysicalDeviceHandle,
    pub queues: &'a [QueueRequest],
    pub extensions: &'a [String],
}

/// Result of a successful logical device creation.
#[derive(Debug, Clone)]
pub struct CreatedDevice {
    pub device: LogicalDeviceHandle,

    /// Queue 0 of every requested family, in request order.
    pub queues: Vec<(u32, QueueHandle)>,
}

/// The native graphics API as seen by the device pipeline.
///
/// Implementations translate between driver objects and the engine's record
/// types. Queries take `&self`; anything that creates or destroys native objects
/// takes `&mut self`.
pub trait GraphicsPlatform {
    /// Lists physical device handles. Fails only if the API cannot be queried.
    fn physical_devices(&self) -> Result<Vec<PhysicalDeviceHandle>, DeviceError>;

    /// Reads the static properties of one physical device.
    fn describe(&self, device: PhysicalDeviceHandle) -> Result<DeviceRecord, DeviceError>;

    /// Whether queue family `family` of `device` can present to `surface`.
    fn supports_presentation(
        &self,
        device: PhysicalDeviceHandle,
        family: u32,
        surface: SurfaceHandle,
    ) -> Result<bool, NativeFailure>;

    fn create_surface(&mut self, target: &dyn SurfaceTarget) -> Result<SurfaceHandle, DeviceError>;

    /// Destroys a surface. Unknown handles are ignored.
    fn destroy_surface(&mut self, surface: SurfaceHandle);

    fn create_logical_device(
        &mut self,
        request: &LogicalDeviceRequest<'_>,
    ) -> Result<CreatedDevice, NativeFailure>;

    /// Destroys a logical device. Unknown handles are ignored.
    fn destroy_logical_device(&mut self, device: LogicalDeviceHandle);

    fn surface_capabilities(
        &self,
        device: PhysicalDeviceHandle,
        surface: SurfaceHandle,
    ) -> Result<SurfaceCapabilities, NativeFailure>;

    fn surface_formats(
        &self,
        device: PhysicalDeviceHandle,
        surface: SurfaceHandle,
    ) -> Result<Vec<SurfaceFormat>, NativeFailure>;

    fn present_modes(
        &self,
        device: PhysicalDeviceHandle,
        surface: SurfaceHandle,
    ) -> Result<Vec<PresentMode>, NativeFailure>;
}
