//! In-memory [`GraphicsPlatform`] for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use raw_window_handle::{
    HandleError, RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};

use super::error::{DeviceError, NativeFailure};
use super::platform::{
    CreatedDevice, GraphicsPlatform, LogicalDeviceRequest, QueueRequest, SurfaceTarget,
};
use super::record::{
    DeviceFeatures, DeviceRecord, DeviceType, LogicalDeviceHandle, MemoryHeap,
    PhysicalDeviceHandle, QueueCapabilities, QueueFamily, QueueHandle, SurfaceHandle,
};
use super::swapchain::{
    ColorSpace, Extent, PresentMode, SurfaceCapabilities, SurfaceFormat, TextureFormat,
};

const GIB: u64 = 1024 * 1024 * 1024;
const FIRST_HANDLE: u64 = 100;

#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub name: String,
    pub id: u32,
    pub vendor_id: u32,
    pub device_type: DeviceType,
    pub local_gib: u64,
    pub host_gib: Option<u64>,
    pub features: DeviceFeatures,
    pub extensions: Vec<String>,
    pub families: Vec<QueueCapabilities>,
    pub present_families: Vec<u32>,
    pub presentation_failure: Option<i32>,
    pub unreadable: bool,
}

impl FakeDevice {
    fn new(name: &str, device_type: DeviceType) -> Self {
        Self {
            name: name.to_string(),
            id: 0,
            vendor_id: 0,
            device_type,
            local_gib: 4,
            host_gib: None,
            features: DeviceFeatures::empty(),
            extensions: vec!["VK_KHR_swapchain".to_string()],
            families: vec![
                QueueCapabilities::GRAPHICS | QueueCapabilities::COMPUTE | QueueCapabilities::TRANSFER,
            ],
            present_families: vec![0],
            presentation_failure: None,
            unreadable: false,
        }
    }

    pub fn integrated(name: &str) -> Self {
        Self::new(name, DeviceType::Integrated)
    }

    pub fn discrete(name: &str) -> Self {
        Self::new(name, DeviceType::Discrete)
    }

    pub fn cpu(name: &str) -> Self {
        Self::new(name, DeviceType::Cpu)
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_features(mut self, features: DeviceFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_families(mut self, families: &[QueueCapabilities]) -> Self {
        self.families = families.to_vec();
        self
    }

    /// Families able to present to any surface.
    pub fn presenting(mut self, families: &[u32]) -> Self {
        self.present_families = families.to_vec();
        self
    }

    /// Presentation support queries for this device fail with `code`.
    pub fn failing_presentation(mut self, code: i32) -> Self {
        self.presentation_failure = Some(code);
        self
    }

    pub fn with_memory_gib(mut self, gib: u64) -> Self {
        self.local_gib = gib;
        self
    }

    pub fn with_host_memory_gib(mut self, gib: u64) -> Self {
        self.host_gib = Some(gib);
        self
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn with_vendor(mut self, vendor_id: u32) -> Self {
        self.vendor_id = vendor_id;
        self
    }

    pub fn record(&self, handle: u64) -> DeviceRecord {
        let mut memory_heaps = vec![MemoryHeap {
            size: self.local_gib * GIB,
            device_local: true,
        }];
        if let Some(host) = self.host_gib {
            memory_heaps.push(MemoryHeap {
                size: host * GIB,
                device_local: false,
            });
        }

        DeviceRecord {
            handle: PhysicalDeviceHandle::from_raw(handle),
            id: self.id,
            name: self.name.clone(),
            vendor_id: self.vendor_id,
            device_type: self.device_type,
            memory_heaps,
            features: self.features,
            extensions: self.extensions.iter().cloned().collect::<BTreeSet<_>>(),
            queue_families: self
                .families
                .iter()
                .map(|&capabilities| QueueFamily {
                    capabilities,
                    queue_count: 1,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    live_devices: BTreeSet<u64>,
    live_surfaces: BTreeSet<u64>,
    destroyed_devices: usize,
    destroyed_surfaces: usize,
    events: Vec<&'static str>,
    platform_dropped: bool,
}

/// Shared view of native object lifetimes; outlives the platform it watches.
#[derive(Debug, Clone, Default)]
pub struct Ledger(Rc<RefCell<LedgerState>>);

impl Ledger {
    pub fn live_devices(&self) -> usize {
        self.0.borrow().live_devices.len()
    }

    pub fn live_surfaces(&self) -> usize {
        self.0.borrow().live_surfaces.len()
    }

    pub fn destroyed_devices(&self) -> usize {
        self.0.borrow().destroyed_devices
    }

    pub fn destroyed_surfaces(&self) -> usize {
        self.0.borrow().destroyed_surfaces
    }

    /// Destruction events in order.
    pub fn events(&self) -> Vec<&'static str> {
        self.0.borrow().events.clone()
    }

    pub fn platform_dropped(&self) -> bool {
        self.0.borrow().platform_dropped
    }
}

pub struct FakePlatform {
    devices: RefCell<Vec<FakeDevice>>,
    driver: bool,
    enumerate_calls: Cell<usize>,
    describe_calls: Cell<usize>,
    presentation_queries: Cell<usize>,
    device_requests: Vec<Vec<QueueRequest>>,
    next_handle: u64,
    ledger: Ledger,

    pub fail_presentation_query: Option<i32>,
    /// Created devices hand back no queue for this family.
    pub omit_queue_family: Option<u32>,
    pub fail_device_creation: Option<i32>,
    pub fail_surface_creation: bool,
    /// One of `"capabilities"`, `"formats"`, `"present_modes"`.
    pub fail_surface_query: Option<&'static str>,

    pub surface_caps: SurfaceCapabilities,
    pub surface_formats_list: Vec<SurfaceFormat>,
    pub present_modes_list: Vec<PresentMode>,
}

impl FakePlatform {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices: RefCell::new(devices),
            driver: true,
            enumerate_calls: Cell::new(0),
            describe_calls: Cell::new(0),
            presentation_queries: Cell::new(0),
            device_requests: Vec::new(),
            next_handle: 1,
            ledger: Ledger::default(),
            fail_presentation_query: None,
            omit_queue_family: None,
            fail_device_creation: None,
            fail_surface_creation: false,
            fail_surface_query: None,
            surface_caps: SurfaceCapabilities {
                min_image_count: 2,
                max_image_count: Some(8),
                current_extent: None,
                min_extent: Extent::new(1, 1),
                max_extent: Extent::new(16384, 16384),
            },
            surface_formats_list: vec![SurfaceFormat {
                format: TextureFormat::B8G8R8A8_SRGB,
                color_space: ColorSpace::SRGB_NONLINEAR,
            }],
            present_modes_list: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    /// A platform whose driver cannot be queried at all.
    pub fn without_driver() -> Self {
        let mut platform = Self::new(Vec::new());
        platform.driver = false;
        platform
    }

    pub fn hot_plug(&self, device: FakeDevice) {
        self.devices.borrow_mut().push(device);
    }

    /// Records of every device, readable or not.
    pub fn records(&self) -> Vec<DeviceRecord> {
        self.devices
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, d)| d.record(FIRST_HANDLE + i as u64))
            .collect()
    }

    pub fn ledger(&self) -> Ledger {
        self.ledger.clone()
    }

    pub fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.get()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.get()
    }

    pub fn presentation_queries(&self) -> usize {
        self.presentation_queries.get()
    }

    pub fn device_requests(&self) -> Vec<Vec<QueueRequest>> {
        self.device_requests.clone()
    }

    pub fn live_devices(&self) -> usize {
        self.ledger.live_devices()
    }

    fn device(&self, handle: PhysicalDeviceHandle) -> Option<FakeDevice> {
        let index = handle.as_raw().checked_sub(FIRST_HANDLE)? as usize;
        self.devices.borrow().get(index).cloned()
    }

    fn surface_query(&self, call: &'static str) -> Result<(), NativeFailure> {
        if self.fail_surface_query == Some(call) {
            Err(NativeFailure::new(call, -1000000000))
        } else {
            Ok(())
        }
    }
}

impl Drop for FakePlatform {
    fn drop(&mut self) {
        let mut state = self.ledger.0.borrow_mut();
        state.events.push("drop platform");
        state.platform_dropped = true;
    }
}

impl GraphicsPlatform for FakePlatform {
    fn physical_devices(&self) -> Result<Vec<PhysicalDeviceHandle>, DeviceError> {
        if !self.driver {
            return Err(DeviceError::PlatformQuery("driver not installed".into()));
        }
        self.enumerate_calls.set(self.enumerate_calls.get() + 1);
        let count = self.devices.borrow().len() as u64;
        Ok((0..count)
            .map(|i| PhysicalDeviceHandle::from_raw(FIRST_HANDLE + i))
            .collect())
    }

    fn describe(&self, handle: PhysicalDeviceHandle) -> Result<DeviceRecord, DeviceError> {
        self.describe_calls.set(self.describe_calls.get() + 1);
        match self.device(handle) {
            Some(d) if !d.unreadable => Ok(d.record(handle.as_raw())),
            Some(d) => Err(DeviceError::PlatformQuery(format!("{} is unreadable", d.name))),
            None => Err(DeviceError::PlatformQuery(format!("unknown device {handle:?}"))),
        }
    }

    fn supports_presentation(
        &self,
        device: PhysicalDeviceHandle,
        family: u32,
        _surface: SurfaceHandle,
    ) -> Result<bool, NativeFailure> {
        self.presentation_queries
            .set(self.presentation_queries.get() + 1);
        let device = self.device(device);
        let failure = self
            .fail_presentation_query
            .or_else(|| device.as_ref().and_then(|d| d.presentation_failure));
        if let Some(code) = failure {
            return Err(NativeFailure::new("vkGetPhysicalDeviceSurfaceSupportKHR", code));
        }
        Ok(device.is_some_and(|d| d.present_families.contains(&family)))
    }

    fn create_surface(&mut self, target: &dyn SurfaceTarget) -> Result<SurfaceHandle, DeviceError> {
        if self.fail_surface_creation {
            return Err(DeviceError::SurfaceCreationFailed("unsupported window system".into()));
        }
        target
            .raw_handles()
            .map_err(|e| DeviceError::SurfaceCreationFailed(e.to_string()))?;

        let raw = self.next_handle;
        self.next_handle += 1;
        self.ledger.0.borrow_mut().live_surfaces.insert(raw);
        Ok(SurfaceHandle::from_raw(raw))
    }

    fn destroy_surface(&mut self, surface: SurfaceHandle) {
        let mut state = self.ledger.0.borrow_mut();
        if state.live_surfaces.remove(&surface.as_raw()) {
            state.destroyed_surfaces += 1;
            state.events.push("destroy surface");
        }
    }

    fn create_logical_device(
        &mut self,
        request: &LogicalDeviceRequest<'_>,
    ) -> Result<CreatedDevice, NativeFailure> {
        self.device_requests.push(request.queues.to_vec());
        if let Some(code) = self.fail_device_creation {
            return Err(NativeFailure::new("vkCreateDevice", code));
        }

        let raw = self.next_handle;
        self.next_handle += 1;
        self.ledger.0.borrow_mut().live_devices.insert(raw);

        Ok(CreatedDevice {
            device: LogicalDeviceHandle::from_raw(raw),
            queues: request
                .queues
                .iter()
                .filter(|q| self.omit_queue_family != Some(q.family))
                .map(|q| (q.family, QueueHandle::from_raw(raw * 100 + u64::from(q.family))))
                .collect(),
        })
    }

    fn destroy_logical_device(&mut self, device: LogicalDeviceHandle) {
        let mut state = self.ledger.0.borrow_mut();
        if state.live_devices.remove(&device.as_raw()) {
            state.destroyed_devices += 1;
            state.events.push("destroy device");
        }
    }

    fn surface_capabilities(
        &self,
        _device: PhysicalDeviceHandle,
        _surface: SurfaceHandle,
    ) -> Result<SurfaceCapabilities, NativeFailure> {
        self.surface_query("capabilities")?;
        Ok(self.surface_caps)
    }

    fn surface_formats(
        &self,
        _device: PhysicalDeviceHandle,
        _surface: SurfaceHandle,
    ) -> Result<Vec<SurfaceFormat>, NativeFailure> {
        self.surface_query("formats")?;
        Ok(self.surface_formats_list.clone())
    }

    fn present_modes(
        &self,
        _device: PhysicalDeviceHandle,
        _surface: SurfaceHandle,
    ) -> Result<Vec<PresentMode>, NativeFailure> {
        self.surface_query("present_modes")?;
        Ok(self.present_modes_list.clone())
    }
}

/// Headless stand-in for a native window.
#[derive(Debug, Copy, Clone)]
pub struct FakeWindow {
    pub width: u32,
    pub height: u32,
}

impl FakeWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl SurfaceTarget for FakeWindow {
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        Ok((
            RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
            RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
        ))
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
