use super::binder::BoundDevice;
use super::error::DeviceError;
use super::platform::GraphicsPlatform;
use super::record::SurfaceHandle;

/// Size in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Raw native pixel format code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureFormat(pub i32);

impl TextureFormat {
    pub const R8G8B8A8_UNORM: Self = Self(37);
    pub const R8G8B8A8_SRGB: Self = Self(43);
    pub const B8G8R8A8_UNORM: Self = Self(44);
    pub const B8G8R8A8_SRGB: Self = Self(50);
}

/// Raw native color space code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ColorSpace(pub i32);

impl ColorSpace {
    pub const SRGB_NONLINEAR: Self = Self(0);
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SurfaceFormat {
    pub format: TextureFormat,
    pub color_space: ColorSpace,
}

/// Swap behavior of a presentation engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    /// Always supported.
    Fifo,
    FifoRelaxed,
    Other(i32),
}

/// Surface limits reported for a (device, surface) pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,

    /// `None` means no upper bound.
    pub max_image_count: Option<u32>,

    /// `None` when the surface size is decided by the swapchain extent.
    pub current_extent: Option<Extent>,

    pub min_extent: Extent,
    pub max_extent: Extent,
}

/// Everything needed to pick swapchain creation parameters.
///
/// Re-derive it whenever the window is resized or recreated.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SwapchainDescriptor {
    pub capabilities: SurfaceCapabilities,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

/// Queries surface capabilities, formats and present modes for `bound`.
pub fn query_swapchain_support<P>(
    platform: &P,
    bound: &BoundDevice,
    surface: SurfaceHandle,
) -> Result<SwapchainDescriptor, DeviceError>
where
    P: GraphicsPlatform + ?Sized,
{
    let physical = bound.record().handle;

    let capabilities = platform
        .surface_capabilities(physical, surface)
        .map_err(DeviceError::SurfaceQueryFailed)?;
    let formats = platform
        .surface_formats(physical, surface)
        .map_err(DeviceError::SurfaceQueryFailed)?;
    let present_modes = platform
        .present_modes(physical, surface)
        .map_err(DeviceError::SurfaceQueryFailed)?;

    log::debug!(
        "surface support: {} format(s), present modes {:?}, images {}..{:?}",
        formats.len(),
        present_modes,
        capabilities.min_image_count,
        capabilities.max_image_count
    );

    Ok(SwapchainDescriptor {
        capabilities,
        formats,
        present_modes,
    })
}

impl SwapchainDescriptor {
    /// Picks a surface format, preferring sRGB when requested.
    ///
    /// Falls back to the first reported format.
    pub fn preferred_format(&self, prefer_srgb: bool) -> Option<SurfaceFormat> {
        if prefer_srgb {
            let preferred = [TextureFormat::B8G8R8A8_SRGB, TextureFormat::R8G8B8A8_SRGB];
            for f in preferred {
                if let Some(found) = self
                    .formats
                    .iter()
                    .find(|s| s.format == f && s.color_space == ColorSpace::SRGB_NONLINEAR)
                {
                    return Some(*found);
                }
            }
        }

        self.formats.first().copied()
    }

    /// Returns `requested` if supported, otherwise FIFO.
    pub fn preferred_present_mode(&self, requested: PresentMode) -> PresentMode {
        if self.present_modes.contains(&requested) {
            requested
        } else {
            PresentMode::Fifo
        }
    }

    /// One image above the minimum, capped by the maximum.
    pub fn image_count(&self) -> u32 {
        let caps = &self.capabilities;
        let wanted = caps.min_image_count.saturating_add(1);
        match caps.max_image_count {
            Some(max) => wanted.min(max),
            None => wanted,
        }
    }

    /// Swapchain extent for a framebuffer of the given size.
    ///
    /// Uses the surface's current extent when it dictates one.
    pub fn clamp_extent(&self, framebuffer: (u32, u32)) -> Extent {
        let caps = &self.capabilities;
        if let Some(current) = caps.current_extent {
            return current;
        }

        Extent {
            width: framebuffer.0.clamp(caps.min_extent.width, caps.max_extent.width),
            height: framebuffer.1.clamp(caps.min_extent.height, caps.max_extent.height),
        }
    }
}
