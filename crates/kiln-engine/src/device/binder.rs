use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::{DeviceError, NativeFailure};
use super::platform::{GraphicsPlatform, LogicalDeviceRequest, QueueRequest};
use super::queues::QueueFamilyAssignment;
use super::record::{DeviceRecord, LogicalDeviceHandle, QueueHandle};

/// Priority given to every created queue.
pub const DEFAULT_QUEUE_PRIORITY: f32 = 1.0;

type Listener = Box<dyn FnMut(&DeviceRecord) -> anyhow::Result<()>>;

/// A logical device created on the selected physical device.
///
/// Release it through [`DeviceBinder::release`] so the native device is destroyed
/// and the binder can bind again.
pub struct BoundDevice {
    record: DeviceRecord,
    families: QueueFamilyAssignment,
    device: LogicalDeviceHandle,
    graphics_queue: QueueHandle,
    present_queue: Option<QueueHandle>,
    extensions: Vec<String>,
    slot: Arc<AtomicBool>,
}

impl BoundDevice {
    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    pub fn families(&self) -> QueueFamilyAssignment {
        self.families
    }

    pub fn handle(&self) -> LogicalDeviceHandle {
        self.device
    }

    pub fn graphics_queue(&self) -> QueueHandle {
        self.graphics_queue
    }

    /// Presentation queue; equal to the graphics queue when the family is shared.
    pub fn present_queue(&self) -> Option<QueueHandle> {
        self.present_queue
    }

    pub fn enabled_extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl fmt::Debug for BoundDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundDevice")
            .field("device", &self.record.name)
            .field("handle", &self.device)
            .field("families", &self.families)
            .finish_non_exhaustive()
    }
}

impl Drop for BoundDevice {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

/// Creates logical devices and notifies device-selected listeners.
///
/// At most one [`BoundDevice`] from a given binder is live at a time.
pub struct DeviceBinder {
    listeners: Vec<Listener>,
    slot: Arc<AtomicBool>,
}

impl Default for DeviceBinder {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            slot: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl fmt::Debug for DeviceBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBinder")
            .field("listeners", &self.listeners.len())
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl DeviceBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer called after each successful bind.
    ///
    /// Listeners run synchronously in registration order. An `Err` is logged and
    /// otherwise ignored; listeners cannot veto a device.
    pub fn on_device_selected<F>(&mut self, listener: F)
    where
        F: FnMut(&DeviceRecord) -> anyhow::Result<()> + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn is_bound(&self) -> bool {
        self.slot.load(Ordering::Acquire)
    }

    /// Creates the logical device and its queues.
    ///
    /// Extension support is checked against the record before any native call.
    pub fn bind<P, S>(
        &mut self,
        platform: &mut P,
        device: &DeviceRecord,
        families: QueueFamilyAssignment,
        required_extensions: &[S],
    ) -> Result<BoundDevice, DeviceError>
    where
        P: GraphicsPlatform + ?Sized,
        S: AsRef<str>,
    {
        if self.is_bound() {
            return Err(DeviceError::AlreadyBound);
        }

        let missing = device.missing_extensions(required_extensions);
        if !missing.is_empty() {
            return Err(DeviceError::MissingExtensions(missing));
        }

        let Some(graphics) = families.graphics else {
            return Err(DeviceError::IncompleteQueueFamilies);
        };

        let queues: Vec<QueueRequest> = families
            .unique_families()
            .into_iter()
            .map(|family| QueueRequest {
                family,
                priority: DEFAULT_QUEUE_PRIORITY,
            })
            .collect();
        let extensions: Vec<String> = required_extensions
            .iter()
            .map(|e| e.as_ref().to_owned())
            .collect();

        let created = platform
            .create_logical_device(&LogicalDeviceRequest {
                physical: device.handle,
                queues: &queues,
                extensions: &extensions,
            })
            .map_err(DeviceError::DeviceCreationFailed)?;

        let queue_for = |family: u32| {
            created
                .queues
                .iter()
                .find(|(f, _)| *f == family)
                .map(|(_, q)| *q)
        };

        let graphics_queue = queue_for(graphics);
        let present_queue = families.present.map(queue_for);
        let (Some(graphics_queue), None | Some(Some(_))) = (graphics_queue, present_queue) else {
            platform.destroy_logical_device(created.device);
            return Err(DeviceError::DeviceCreationFailed(NativeFailure::new(
                "vkGetDeviceQueue",
                0,
            )));
        };
        let present_queue = present_queue.flatten();

        self.slot.store(true, Ordering::Release);
        let bound = BoundDevice {
            record: device.clone(),
            families,
            device: created.device,
            graphics_queue,
            present_queue,
            extensions,
            slot: Arc::clone(&self.slot),
        };

        log::info!(
            "bound {} (graphics family {}, present family {:?}, {} queue request(s))",
            device,
            graphics,
            families.present,
            queues.len()
        );

        // A panicking listener must not strand the native device.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.notify(device))) {
            self.release(platform, bound);
            panic::resume_unwind(payload);
        }

        Ok(bound)
    }

    fn notify(&mut self, device: &DeviceRecord) {
        for listener in &mut self.listeners {
            if let Err(e) = listener(device) {
                log::warn!("device-selected listener failed: {e:#}");
            }
        }
    }

    /// Destroys the native device and frees the binder for another bind.
    pub fn release<P>(&mut self, platform: &mut P, bound: BoundDevice)
    where
        P: GraphicsPlatform + ?Sized,
    {
        log::debug!("releasing logical device {:?}", bound.device);
        platform.destroy_logical_device(bound.device);
        drop(bound);
    }
}
