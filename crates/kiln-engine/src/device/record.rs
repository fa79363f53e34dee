use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(u64);

        impl $name {
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }
    };
}

native_handle!(
    /// Opaque handle to a physical device, as handed out by the platform.
    PhysicalDeviceHandle
);
native_handle!(
    /// Opaque handle to a presentation surface.
    SurfaceHandle
);
native_handle!(
    /// Opaque handle to a created logical device.
    LogicalDeviceHandle
);
native_handle!(
    /// Opaque handle to a device queue.
    QueueHandle
);

/// Broad classification reported by the driver.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DeviceType {
    Integrated,
    Discrete,
    Virtual,
    Cpu,
    Other,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::Integrated => "integrated",
            DeviceType::Discrete => "discrete",
            DeviceType::Virtual => "virtual",
            DeviceType::Cpu => "cpu",
            DeviceType::Other => "other",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// Capabilities of a queue family.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct QueueCapabilities: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
        const SPARSE_BINDING = 1 << 3;
    }
}

bitflags! {
    /// Subset of optional device features the engine cares about.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct DeviceFeatures: u32 {
        const GEOMETRY_SHADER = 1 << 0;
        const TESSELLATION_SHADER = 1 << 1;
        const SAMPLER_ANISOTROPY = 1 << 2;
        const MULTI_DRAW_INDIRECT = 1 << 3;
        const FILL_MODE_NON_SOLID = 1 << 4;
        const WIDE_LINES = 1 << 5;
        const SHADER_FLOAT64 = 1 << 6;
    }
}

/// One memory heap of a device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryHeap {
    /// Heap size in bytes.
    pub size: u64,

    /// Whether the heap lives on the device (as opposed to host-visible system memory).
    pub device_local: bool,
}

/// One queue family of a device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueueFamily {
    pub capabilities: QueueCapabilities,
    pub queue_count: u32,
}

impl QueueFamily {
    pub fn supports(&self, caps: QueueCapabilities) -> bool {
        self.capabilities.contains(caps)
    }
}

/// Immutable snapshot of a physical device taken at enumeration time.
///
/// Records are cheap to clone; downstream stages receive copies and never write
/// back into the catalog.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeviceRecord {
    pub handle: PhysicalDeviceHandle,

    /// Driver-reported device id.
    pub id: u32,
    pub name: String,
    pub vendor_id: u32,
    pub device_type: DeviceType,

    pub memory_heaps: Vec<MemoryHeap>,
    pub features: DeviceFeatures,
    pub extensions: BTreeSet<String>,

    /// Queue families, indexed by family index.
    pub queue_families: Vec<QueueFamily>,
}

impl DeviceRecord {
    /// Sum of all device-local heap sizes, in bytes.
    ///
    /// Host-visible-only heaps do not count.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_heaps
            .iter()
            .filter(|h| h.device_local)
            .fold(0u64, |acc, h| acc.saturating_add(h.size))
    }

    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    /// Returns the requested extensions this device lacks, in request order.
    pub fn missing_extensions<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.supports_extension(name))
            .map(str::to_owned)
            .collect()
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (id {:#06x}, vendor {:#06x}, {})",
            self.name, self.id, self.vendor_id, self.device_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn record() -> DeviceRecord {
        DeviceRecord {
            handle: PhysicalDeviceHandle::from_raw(1),
            id: 0x1234,
            name: "test gpu".into(),
            vendor_id: 0x10de,
            device_type: DeviceType::Discrete,
            memory_heaps: vec![
                MemoryHeap { size: 4 * GIB, device_local: true },
                MemoryHeap { size: 16 * GIB, device_local: false },
                MemoryHeap { size: 2 * GIB, device_local: true },
            ],
            features: DeviceFeatures::empty(),
            extensions: ["VK_KHR_swapchain".to_string()].into_iter().collect(),
            queue_families: vec![],
        }
    }

    #[test]
    fn local_memory_ignores_host_heaps() {
        assert_eq!(record().device_local_memory(), 6 * GIB);
    }

    #[test]
    fn missing_extensions_keeps_request_order() {
        let missing = record().missing_extensions(&["b_ext", "VK_KHR_swapchain", "a_ext"]);
        assert_eq!(missing, vec!["b_ext".to_string(), "a_ext".to_string()]);
    }

    #[test]
    fn display_includes_name_and_type() {
        let s = record().to_string();
        assert!(s.starts_with("test gpu"));
        assert!(s.ends_with("discrete)"));
    }
}
