use std::vec;

use super::error::DeviceError;
use super::platform::GraphicsPlatform;
use super::record::{DeviceRecord, PhysicalDeviceHandle};

/// Read-only view over the physical devices a platform exposes.
///
/// Nothing is cached: every call to [`enumerate`](Self::enumerate) asks the
/// driver again, since hot-plug can change what is visible between calls.
pub struct DeviceCatalog<'p, P: ?Sized> {
    platform: &'p P,
}

impl<'p, P> DeviceCatalog<'p, P>
where
    P: GraphicsPlatform + ?Sized,
{
    pub fn new(platform: &'p P) -> Self {
        Self { platform }
    }

    /// Starts a fresh enumeration.
    ///
    /// The device list is fetched eagerly so a missing driver surfaces here;
    /// per-device properties are read as the iterator advances.
    pub fn enumerate(&self) -> Result<Devices<'p, P>, DeviceError> {
        let handles = self.platform.physical_devices()?;
        log::debug!("driver reports {} physical device(s)", handles.len());

        Ok(Devices {
            platform: self.platform,
            handles: handles.into_iter(),
        })
    }
}

/// Lazy sequence of [`DeviceRecord`]s.
pub struct Devices<'p, P: ?Sized> {
    platform: &'p P,
    handles: vec::IntoIter<PhysicalDeviceHandle>,
}

impl<P> Iterator for Devices<'_, P>
where
    P: GraphicsPlatform + ?Sized,
{
    type Item = DeviceRecord;

    fn next(&mut self) -> Option<DeviceRecord> {
        for handle in self.handles.by_ref() {
            match self.platform.describe(handle) {
                Ok(record) => return Some(record),
                Err(e) => log::warn!("skipping physical device {handle:?}: {e}"),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.handles.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{FakeDevice, FakePlatform};

    #[test]
    fn enumerate_yields_every_device() {
        let platform = FakePlatform::new(vec![
            FakeDevice::integrated("a"),
            FakeDevice::discrete("b"),
        ]);
        let names: Vec<_> = DeviceCatalog::new(&platform)
            .enumerate()
            .unwrap()
            .map(|r| r.name)
            .collect();

        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn enumerate_is_lazy() {
        let platform = FakePlatform::new(vec![
            FakeDevice::integrated("a"),
            FakeDevice::discrete("b"),
        ]);
        let mut devices = DeviceCatalog::new(&platform).enumerate().unwrap();
        assert_eq!(platform.describe_calls(), 0);

        devices.next();
        assert_eq!(platform.describe_calls(), 1);
    }

    #[test]
    fn enumerate_requeries_each_call() {
        let platform = FakePlatform::new(vec![FakeDevice::integrated("a")]);
        let catalog = DeviceCatalog::new(&platform);

        assert_eq!(catalog.enumerate().unwrap().count(), 1);
        platform.hot_plug(FakeDevice::discrete("b"));
        assert_eq!(catalog.enumerate().unwrap().count(), 2);
        assert_eq!(platform.enumerate_calls(), 2);
    }

    #[test]
    fn enumerate_skips_unreadable_devices() {
        let mut broken = FakeDevice::discrete("broken");
        broken.unreadable = true;
        let platform = FakePlatform::new(vec![broken, FakeDevice::integrated("ok")]);

        let names: Vec<_> = DeviceCatalog::new(&platform)
            .enumerate()
            .unwrap()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn missing_driver_is_platform_error() {
        let platform = FakePlatform::without_driver();
        let err = DeviceCatalog::new(&platform).enumerate().err().unwrap();
        assert!(matches!(err, DeviceError::PlatformQuery(_)));
    }
}
