use bitflags::bitflags;

use super::error::DeviceError;
use super::queues::QueueFamilyAssignment;
use super::record::{DeviceRecord, DeviceType};

bitflags! {
    /// Composable device selection flags.
    ///
    /// `PREFER_INTEGRATED` and `PREFER_DEDICATED` are mutually exclusive.
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
    pub struct SelectionCriteria: u32 {
        const PREFER_INTEGRATED = 1 << 0;
        const PREFER_DEDICATED = 1 << 1;
        const HIGHEST_MEMORY = 1 << 2;
    }
}

impl SelectionCriteria {
    pub fn validate(self) -> Result<Self, DeviceError> {
        if self.contains(Self::PREFER_INTEGRATED | Self::PREFER_DEDICATED) {
            return Err(DeviceError::InvalidSelectionCriteria);
        }
        Ok(self)
    }
}

/// Explicit device request by identity.
///
/// Matching uses the most specific field present: id, then name, then vendor.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DeviceQuery {
    pub id: Option<u32>,
    pub name: Option<String>,
    pub vendor_id: Option<u32>,
}

impl DeviceQuery {
    pub fn by_id(id: u32) -> Self {
        Self { id: Some(id), ..Self::default() }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn by_vendor(vendor_id: u32) -> Self {
        Self { vendor_id: Some(vendor_id), ..Self::default() }
    }

    pub fn matches(&self, device: &DeviceRecord) -> bool {
        if let Some(id) = self.id {
            device.id == id
        } else if let Some(name) = &self.name {
            &device.name == name
        } else if let Some(vendor_id) = self.vendor_id {
            device.vendor_id == vendor_id
        } else {
            true
        }
    }
}

/// A suitable device paired with its resolved queue families.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Candidate {
    pub device: DeviceRecord,
    pub families: QueueFamilyAssignment,
}

/// Narrows `candidates` to those matching an explicit device request.
pub fn select_matching(candidates: Vec<Candidate>, query: &DeviceQuery) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| query.matches(&c.device))
        .collect()
}

/// Picks one candidate under `criteria`.
///
/// Steps run in a fixed order so the result is reproducible:
/// 1. drop candidates without the required queue families,
/// 2. apply the integrated/dedicated type preference,
/// 3. stable-sort by device-local memory (descending) if requested,
/// 4. take the first remaining candidate.
///
/// `Ok(None)` means nothing matched; that is an expected environment state,
/// not a failure.
pub fn select(
    candidates: Vec<Candidate>,
    criteria: SelectionCriteria,
    presentation_required: bool,
) -> Result<Option<Candidate>, DeviceError> {
    let criteria = criteria.validate()?;

    let mut remaining: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            let complete = c.families.is_complete(presentation_required);
            if !complete {
                log::debug!("{}: missing required queue family", c.device.name);
            }
            complete
        })
        .collect();

    if criteria.contains(SelectionCriteria::PREFER_INTEGRATED) {
        remaining.retain(|c| c.device.device_type == DeviceType::Integrated);
    } else if criteria.contains(SelectionCriteria::PREFER_DEDICATED) {
        remaining.retain(|c| c.device.device_type == DeviceType::Discrete);
    }

    if criteria.contains(SelectionCriteria::HIGHEST_MEMORY) {
        remaining.sort_by(|a, b| {
            b.device
                .device_local_memory()
                .cmp(&a.device.device_local_memory())
        });
    }

    Ok(remaining.into_iter().next())
}
