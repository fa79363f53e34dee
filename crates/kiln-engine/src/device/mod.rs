//! GPU device discovery, selection and binding.
//!
//! Pipeline, in order:
//! - [`DeviceCatalog`] lists physical devices as [`DeviceRecord`]s
//! - [`SuitabilityFilter`] and the queue family resolver narrow the candidates
//! - [`selection::select`] picks one under [`SelectionCriteria`]
//! - [`DeviceBinder`] creates the logical device and queues
//! - [`query_swapchain_support`] describes what the surface can present
//!
//! [`RenderBootstrap`] runs the whole chain against a [`GraphicsPlatform`];
//! [`VulkanPlatform`] is the production backend.

mod binder;
mod catalog;
mod error;
mod init;
mod platform;
pub mod queues;
mod record;
pub mod selection;
mod sequencer;
pub mod suitability;
mod swapchain;
mod vulkan;

#[cfg(test)]
pub(crate) mod testing;

pub use binder::{BoundDevice, DEFAULT_QUEUE_PRIORITY, DeviceBinder};
pub use catalog::{DeviceCatalog, Devices};
pub use error::{DeviceError, NativeFailure};
pub use init::{GpuInit, SWAPCHAIN_EXTENSION};
pub use platform::{
    CreatedDevice, GraphicsPlatform, LogicalDeviceRequest, QueueRequest, SurfaceTarget,
};
pub use queues::QueueFamilyAssignment;
pub use record::{
    DeviceFeatures, DeviceRecord, DeviceType, LogicalDeviceHandle, MemoryHeap,
    PhysicalDeviceHandle, QueueCapabilities, QueueFamily, QueueHandle, SurfaceHandle,
};
pub use selection::{Candidate, DeviceQuery, SelectionCriteria};
pub use sequencer::{InitError, InitState, RenderBootstrap, Stage};
pub use suitability::SuitabilityFilter;
pub use swapchain::{
    ColorSpace, Extent, PresentMode, SurfaceCapabilities, SurfaceFormat, SwapchainDescriptor,
    TextureFormat, query_swapchain_support,
};
pub use vulkan::{VALIDATION_LOG_TARGET, VulkanPlatform};
