//! Vulkan implementation of [`GraphicsPlatform`].
//!
//! [`VulkanPlatform`] owns the loader entry, the instance, an optional
//! validation messenger, and every logical device and surface created through
//! it. Native handles cross the trait boundary as raw `u64` values.

use std::collections::{HashMap, HashSet};
use std::ffi::{CStr, CString, c_char, c_void};
use std::fmt;

use ash::vk::{self, Handle};

use super::error::{DeviceError, NativeFailure};
use super::init::GpuInit;
use super::platform::{CreatedDevice, GraphicsPlatform, LogicalDeviceRequest, SurfaceTarget};
use super::record::{
    DeviceFeatures, DeviceRecord, DeviceType, LogicalDeviceHandle, MemoryHeap,
    PhysicalDeviceHandle, QueueCapabilities, QueueFamily, QueueHandle, SurfaceHandle,
};
use super::swapchain::{
    ColorSpace, Extent, PresentMode, SurfaceCapabilities, SurfaceFormat, TextureFormat,
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"kiln";

/// Log target for validation layer output.
pub const VALIDATION_LOG_TARGET: &str = "kiln::vulkan";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader hands us a valid callback payload for the duration of the call.
    let message = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();

    let kind = match kind {
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "general",
    };

    let level = match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Debug,
        _ => log::Level::Trace,
    };
    log::log!(target: VALIDATION_LOG_TARGET, level, "[{kind}] {message}");

    vk::FALSE
}

fn failure(call: &'static str) -> impl Fn(vk::Result) -> NativeFailure {
    move |r| NativeFailure::new(call, r.as_raw())
}

fn extension_names(extensions: &[String]) -> Result<Vec<CString>, NativeFailure> {
    extensions
        .iter()
        .map(|e| CString::new(e.as_str()))
        .collect::<Result<_, _>>()
        .map_err(|_| {
            NativeFailure::new("vkCreateDevice", vk::Result::ERROR_EXTENSION_NOT_PRESENT.as_raw())
        })
}

fn query_error(call: &'static str) -> impl Fn(vk::Result) -> DeviceError {
    move |r| DeviceError::PlatformQuery(format!("{call}: {r}"))
}

pub struct VulkanPlatform {
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_fns: ash::khr::surface::Instance,
    devices: HashMap<LogicalDeviceHandle, ash::Device>,
    surfaces: HashSet<SurfaceHandle>,
}

impl fmt::Debug for VulkanPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanPlatform")
            .field("instance", &self.instance.handle())
            .field("validation", &self.debug.is_some())
            .field("devices", &self.devices.len())
            .field("surfaces", &self.surfaces.len())
            .finish()
    }
}

impl VulkanPlatform {
    /// Loads the Vulkan library and creates an instance able to present to `target`.
    ///
    /// Validation is enabled only if requested and the layer is installed.
    pub fn load(init: &GpuInit, target: &dyn SurfaceTarget) -> Result<Self, DeviceError> {
        let (display, _) = target
            .raw_handles()
            .map_err(|e| DeviceError::PlatformQuery(format!("window handles unavailable: {e}")))?;

        // SAFETY: the loaded library outlives every object created from it; see Drop.
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| DeviceError::PlatformQuery(format!("could not load Vulkan: {e}")))?;

        // SAFETY: entry is live.
        let api_version = unsafe { entry.try_enumerate_instance_version() }
            .ok()
            .flatten()
            .unwrap_or(vk::API_VERSION_1_0);

        let mut extensions: Vec<*const c_char> =
            ash_window::enumerate_required_extensions(display)
                .map_err(query_error("vkEnumerateInstanceExtensionProperties"))?
                .to_vec();

        let extra: Vec<CString> = init
            .instance_extensions
            .iter()
            .map(|e| CString::new(e.as_str()))
            .collect::<Result<_, _>>()
            .map_err(|e| DeviceError::PlatformQuery(format!("bad extension name: {e}")))?;
        extensions.extend(extra.iter().map(|e| e.as_ptr()));

        // SAFETY: entry is live.
        let available = unsafe { entry.enumerate_instance_extension_properties(None) }
            .map_err(query_error("vkEnumerateInstanceExtensionProperties"))?;
        let is_available =
            |name: &CStr| available.iter().any(|p| p.extension_name_as_c_str() == Ok(name));

        let missing: Vec<String> = extensions
            .iter()
            // SAFETY: every pointer is a NUL-terminated name from ash_window or `extra`.
            .map(|&p| unsafe { CStr::from_ptr(p) })
            .filter(|name| !is_available(name))
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        if !missing.is_empty() {
            return Err(DeviceError::PlatformQuery(format!(
                "missing instance extensions: {missing:?}"
            )));
        }

        let validation = init.enable_validation && {
            // SAFETY: entry is live.
            let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
            let has_layer = layers
                .iter()
                .any(|l| l.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
            let has_utils = is_available(ash::ext::debug_utils::NAME);
            if !(has_layer && has_utils) {
                log::warn!("validation requested but {VALIDATION_LAYER:?} is not installed");
            }
            has_layer && has_utils
        };

        let mut layers: Vec<*const c_char> = Vec::new();
        if validation {
            layers.push(VALIDATION_LAYER.as_ptr());
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let app_name = CString::new(init.app_name.as_str()).unwrap_or_else(|_| c"kiln".to_owned());
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(api_version);

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: create_info and everything it points to are alive for the call.
        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(query_error("vkCreateInstance"))?;

        let debug = if validation {
            let utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));

            // SAFETY: utils was loaded from this instance.
            match unsafe { utils.create_debug_utils_messenger(&info, None) } {
                Ok(messenger) => Some((utils, messenger)),
                Err(e) => {
                    log::warn!("continuing without validation messenger: {e}");
                    None
                }
            }
        } else {
            None
        };

        let surface_fns = ash::khr::surface::Instance::new(&entry, &instance);

        log::info!(
            "Vulkan {}.{}.{} instance created (validation: {})",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
            vk::api_version_patch(api_version),
            debug.is_some()
        );

        Ok(Self {
            entry,
            instance,
            debug,
            surface_fns,
            devices: HashMap::new(),
            surfaces: HashSet::new(),
        })
    }

    /// The loaded `ash` device behind a bound handle.
    pub fn device(&self, handle: LogicalDeviceHandle) -> Option<&ash::Device> {
        self.devices.get(&handle)
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }
}

fn device_type(t: vk::PhysicalDeviceType) -> DeviceType {
    match t {
        vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceType::Integrated,
        vk::PhysicalDeviceType::DISCRETE_GPU => DeviceType::Discrete,
        vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceType::Virtual,
        vk::PhysicalDeviceType::CPU => DeviceType::Cpu,
        _ => DeviceType::Other,
    }
}

fn device_features(f: &vk::PhysicalDeviceFeatures) -> DeviceFeatures {
    let mut out = DeviceFeatures::empty();
    out.set(DeviceFeatures::GEOMETRY_SHADER, f.geometry_shader != 0);
    out.set(DeviceFeatures::TESSELLATION_SHADER, f.tessellation_shader != 0);
    out.set(DeviceFeatures::SAMPLER_ANISOTROPY, f.sampler_anisotropy != 0);
    out.set(DeviceFeatures::MULTI_DRAW_INDIRECT, f.multi_draw_indirect != 0);
    out.set(DeviceFeatures::FILL_MODE_NON_SOLID, f.fill_mode_non_solid != 0);
    out.set(DeviceFeatures::WIDE_LINES, f.wide_lines != 0);
    out.set(DeviceFeatures::SHADER_FLOAT64, f.shader_float64 != 0);
    out
}

fn queue_capabilities(flags: vk::QueueFlags) -> QueueCapabilities {
    let mut out = QueueCapabilities::empty();
    out.set(QueueCapabilities::GRAPHICS, flags.contains(vk::QueueFlags::GRAPHICS));
    out.set(QueueCapabilities::COMPUTE, flags.contains(vk::QueueFlags::COMPUTE));
    out.set(QueueCapabilities::TRANSFER, flags.contains(vk::QueueFlags::TRANSFER));
    out.set(
        QueueCapabilities::SPARSE_BINDING,
        flags.contains(vk::QueueFlags::SPARSE_BINDING),
    );
    out
}

fn present_mode(mode: vk::PresentModeKHR) -> PresentMode {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => PresentMode::Immediate,
        vk::PresentModeKHR::MAILBOX => PresentMode::Mailbox,
        vk::PresentModeKHR::FIFO => PresentMode::Fifo,
        vk::PresentModeKHR::FIFO_RELAXED => PresentMode::FifoRelaxed,
        other => PresentMode::Other(other.as_raw()),
    }
}

fn extent(e: vk::Extent2D) -> Extent {
    Extent::new(e.width, e.height)
}

impl GraphicsPlatform for VulkanPlatform {
    fn physical_devices(&self) -> Result<Vec<PhysicalDeviceHandle>, DeviceError> {
        // SAFETY: instance is live.
        let devices = unsafe { self.instance.enumerate_physical_devices() }
            .map_err(query_error("vkEnumeratePhysicalDevices"))?;
        Ok(devices
            .into_iter()
            .map(|d| PhysicalDeviceHandle::from_raw(d.as_raw()))
            .collect())
    }

    fn describe(&self, handle: PhysicalDeviceHandle) -> Result<DeviceRecord, DeviceError> {
        let pd = vk::PhysicalDevice::from_raw(handle.as_raw());

        // SAFETY: pd came from physical_devices on this instance.
        let (props, memory, features, families, extensions) = unsafe {
            (
                self.instance.get_physical_device_properties(pd),
                self.instance.get_physical_device_memory_properties(pd),
                self.instance.get_physical_device_features(pd),
                self.instance.get_physical_device_queue_family_properties(pd),
                self.instance
                    .enumerate_device_extension_properties(pd)
                    .map_err(query_error("vkEnumerateDeviceExtensionProperties"))?,
            )
        };

        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(DeviceRecord {
            handle,
            id: props.device_id,
            name,
            vendor_id: props.vendor_id,
            device_type: device_type(props.device_type),
            memory_heaps: memory
                .memory_heaps_as_slice()
                .iter()
                .map(|h| MemoryHeap {
                    size: h.size,
                    device_local: h.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL),
                })
                .collect(),
            features: device_features(&features),
            extensions: extensions
                .iter()
                .filter_map(|e| e.extension_name_as_c_str().ok())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
            queue_families: families
                .iter()
                .map(|f| QueueFamily {
                    capabilities: queue_capabilities(f.queue_flags),
                    queue_count: f.queue_count,
                })
                .collect(),
        })
    }

    fn supports_presentation(
        &self,
        device: PhysicalDeviceHandle,
        family: u32,
        surface: SurfaceHandle,
    ) -> Result<bool, NativeFailure> {
        // SAFETY: both handles were created from this instance.
        unsafe {
            self.surface_fns.get_physical_device_surface_support(
                vk::PhysicalDevice::from_raw(device.as_raw()),
                family,
                vk::SurfaceKHR::from_raw(surface.as_raw()),
            )
        }
        .map_err(failure("vkGetPhysicalDeviceSurfaceSupportKHR"))
    }

    fn create_surface(&mut self, target: &dyn SurfaceTarget) -> Result<SurfaceHandle, DeviceError> {
        let (display, window) = target
            .raw_handles()
            .map_err(|e| DeviceError::SurfaceCreationFailed(e.to_string()))?;

        // SAFETY: the caller keeps the window alive until the surface is destroyed.
        let surface = unsafe {
            ash_window::create_surface(&self.entry, &self.instance, display, window, None)
        }
        .map_err(|e| DeviceError::SurfaceCreationFailed(e.to_string()))?;

        let handle = SurfaceHandle::from_raw(surface.as_raw());
        self.surfaces.insert(handle);
        Ok(handle)
    }

    fn destroy_surface(&mut self, surface: SurfaceHandle) {
        if self.surfaces.remove(&surface) {
            // SAFETY: tracked surfaces were created from this instance and are destroyed once.
            unsafe {
                self.surface_fns
                    .destroy_surface(vk::SurfaceKHR::from_raw(surface.as_raw()), None)
            };
        }
    }

    fn create_logical_device(
        &mut self,
        request: &LogicalDeviceRequest<'_>,
    ) -> Result<CreatedDevice, NativeFailure> {
        let pd = vk::PhysicalDevice::from_raw(request.physical.as_raw());

        let priorities: Vec<[f32; 1]> = request.queues.iter().map(|q| [q.priority]).collect();
        let queue_infos: Vec<vk::DeviceQueueCreateInfo<'_>> = request
            .queues
            .iter()
            .zip(&priorities)
            .map(|(q, p)| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(q.family)
                    .queue_priorities(p)
            })
            .collect();

        let names = extension_names(request.extensions)?;
        let name_ptrs: Vec<*const c_char> = names.iter().map(|n| n.as_ptr()).collect();

        let info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&name_ptrs);

        // SAFETY: pd belongs to this instance; info and its pointees outlive the call.
        let device = unsafe { self.instance.create_device(pd, &info, None) }
            .map_err(failure("vkCreateDevice"))?;

        let queues = request
            .queues
            .iter()
            .map(|q| {
                // SAFETY: queue 0 of every requested family exists on the new device.
                let queue = unsafe { device.get_device_queue(q.family, 0) };
                (q.family, QueueHandle::from_raw(queue.as_raw()))
            })
            .collect();

        let handle = LogicalDeviceHandle::from_raw(device.handle().as_raw());
        self.devices.insert(handle, device);
        Ok(CreatedDevice { device: handle, queues })
    }

    fn destroy_logical_device(&mut self, device: LogicalDeviceHandle) {
        if let Some(device) = self.devices.remove(&device) {
            // SAFETY: nothing else holds this device; wait for queued work first.
            unsafe {
                if let Err(e) = device.device_wait_idle() {
                    log::warn!("vkDeviceWaitIdle failed before destroy: {e}");
                }
                device.destroy_device(None);
            }
        }
    }

    fn surface_capabilities(
        &self,
        device: PhysicalDeviceHandle,
        surface: SurfaceHandle,
    ) -> Result<SurfaceCapabilities, NativeFailure> {
        // SAFETY: both handles were created from this instance.
        let caps = unsafe {
            self.surface_fns.get_physical_device_surface_capabilities(
                vk::PhysicalDevice::from_raw(device.as_raw()),
                vk::SurfaceKHR::from_raw(surface.as_raw()),
            )
        }
        .map_err(failure("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;

        Ok(SurfaceCapabilities {
            min_image_count: caps.min_image_count,
            max_image_count: (caps.max_image_count != 0).then_some(caps.max_image_count),
            current_extent: (caps.current_extent.width != u32::MAX)
                .then(|| extent(caps.current_extent)),
            min_extent: extent(caps.min_image_extent),
            max_extent: extent(caps.max_image_extent),
        })
    }

    fn surface_formats(
        &self,
        device: PhysicalDeviceHandle,
        surface: SurfaceHandle,
    ) -> Result<Vec<SurfaceFormat>, NativeFailure> {
        // SAFETY: both handles were created from this instance.
        let formats = unsafe {
            self.surface_fns.get_physical_device_surface_formats(
                vk::PhysicalDevice::from_raw(device.as_raw()),
                vk::SurfaceKHR::from_raw(surface.as_raw()),
            )
        }
        .map_err(failure("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;

        Ok(formats
            .iter()
            .map(|f| SurfaceFormat {
                format: TextureFormat(f.format.as_raw()),
                color_space: ColorSpace(f.color_space.as_raw()),
            })
            .collect())
    }

    fn present_modes(
        &self,
        device: PhysicalDeviceHandle,
        surface: SurfaceHandle,
    ) -> Result<Vec<PresentMode>, NativeFailure> {
        // SAFETY: both handles were created from this instance.
        let modes = unsafe {
            self.surface_fns.get_physical_device_surface_present_modes(
                vk::PhysicalDevice::from_raw(device.as_raw()),
                vk::SurfaceKHR::from_raw(surface.as_raw()),
            )
        }
        .map_err(failure("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;

        Ok(modes.into_iter().map(present_mode).collect())
    }
}

impl Drop for VulkanPlatform {
    fn drop(&mut self) {
        if !self.devices.is_empty() || !self.surfaces.is_empty() {
            log::warn!(
                "dropping Vulkan platform with {} device(s) and {} surface(s) still alive",
                self.devices.len(),
                self.surfaces.len()
            );
        }

        for handle in self.devices.keys().copied().collect::<Vec<_>>() {
            self.destroy_logical_device(handle);
        }
        for surface in self.surfaces.iter().copied().collect::<Vec<_>>() {
            self.destroy_surface(surface);
        }

        // SAFETY: every child object is gone; this is the last use of the instance.
        unsafe {
            if let Some((utils, messenger)) = self.debug.take() {
                utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}
