use std::collections::BTreeSet;

use super::error::DeviceError;
use super::platform::GraphicsPlatform;
use super::record::{DeviceRecord, QueueCapabilities, SurfaceHandle};

/// Queue family indices resolved for one (device, surface) pair.
///
/// Absent fields mean the device cannot serve that purpose; they are never
/// defaulted to index 0.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct QueueFamilyAssignment {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyAssignment {
    /// Whether the families needed for rendering (and optionally presenting) are known.
    pub fn is_complete(&self, presentation_required: bool) -> bool {
        self.graphics.is_some() && (!presentation_required || self.present.is_some())
    }

    /// Whether graphics and presentation resolved to the same family.
    pub fn is_shared(&self) -> bool {
        self.graphics.is_some() && self.graphics == self.present
    }

    /// Distinct family indices in ascending order.
    pub fn unique_families(&self) -> BTreeSet<u32> {
        self.graphics.into_iter().chain(self.present).collect()
    }
}

/// Resolves graphics and presentation families for `device`.
///
/// Both lookups take the lowest matching family index. Presentation is only
/// resolved when a surface is supplied.
pub fn resolve<P>(
    platform: &P,
    device: &DeviceRecord,
    surface: Option<SurfaceHandle>,
) -> Result<QueueFamilyAssignment, DeviceError>
where
    P: GraphicsPlatform + ?Sized,
{
    let graphics = (0u32..)
        .zip(&device.queue_families)
        .find(|(_, family)| family.supports(QueueCapabilities::GRAPHICS))
        .map(|(index, _)| index);

    let mut present = None;
    if let Some(surface) = surface {
        for (index, _) in (0u32..).zip(&device.queue_families) {
            let supported = platform
                .supports_presentation(device.handle, index, surface)
                .map_err(DeviceError::SurfaceQueryFailed)?;
            if supported {
                present = Some(index);
                break;
            }
        }
    }

    let assignment = QueueFamilyAssignment { graphics, present };
    log::trace!("{}: queue families {assignment:?}", device.name);
    Ok(assignment)
}
