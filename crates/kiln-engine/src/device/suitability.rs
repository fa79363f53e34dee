use std::fmt;

use super::record::{DeviceFeatures, DeviceRecord, DeviceType, QueueCapabilities};

type Check = Box<dyn Fn(&DeviceRecord) -> bool>;

struct Predicate {
    name: String,
    check: Check,
}

/// Ordered set of pure predicates a device must all accept to be considered.
///
/// Predicates only ever narrow: a device rejected by one predicate cannot be
/// re-admitted by another, and the outcome does not depend on registration order.
#[derive(Default)]
pub struct SuitabilityFilter {
    predicates: Vec<Predicate>,
}

impl fmt::Debug for SuitabilityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.predicates.iter().map(|p| &p.name))
            .finish()
    }
}

impl SuitabilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named predicate.
    pub fn add<F>(&mut self, name: impl Into<String>, check: F) -> &mut Self
    where
        F: Fn(&DeviceRecord) -> bool + 'static,
    {
        self.predicates.push(Predicate {
            name: name.into(),
            check: Box::new(check),
        });
        self
    }

    /// Builder-style variant of [`add`](Self::add).
    pub fn with<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&DeviceRecord) -> bool + 'static,
    {
        self.add(name, check);
        self
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Names of the registered predicates, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().map(|p| p.name.as_str())
    }

    /// Returns `true` iff every predicate accepts `device`.
    pub fn is_suitable(&self, device: &DeviceRecord) -> bool {
        match self.predicates.iter().find(|p| !(p.check)(device)) {
            Some(p) => {
                log::debug!("device {} rejected by `{}`", device.name, p.name);
                false
            }
            None => true,
        }
    }

    /// Keeps only the suitable devices, preserving input order.
    pub fn filter<I>(&self, devices: I) -> Vec<DeviceRecord>
    where
        I: IntoIterator<Item = DeviceRecord>,
    {
        devices.into_iter().filter(|d| self.is_suitable(d)).collect()
    }
}

/// Stock predicates.
pub mod predicates {
    use super::*;

    /// Accepts devices supporting every named extension.
    pub fn has_extensions(names: Vec<String>) -> impl Fn(&DeviceRecord) -> bool {
        move |d| names.iter().all(|n| d.supports_extension(n))
    }

    pub fn has_features(features: DeviceFeatures) -> impl Fn(&DeviceRecord) -> bool {
        move |d| d.features.contains(features)
    }

    /// Accepts devices with at least one queue family carrying all of `caps`.
    pub fn has_queue_capabilities(caps: QueueCapabilities) -> impl Fn(&DeviceRecord) -> bool {
        move |d| d.queue_families.iter().any(|f| f.supports(caps))
    }

    pub fn device_type_in(types: Vec<DeviceType>) -> impl Fn(&DeviceRecord) -> bool {
        move |d| types.contains(&d.device_type)
    }
}

#[cfg(test)]
mod tests {
    use super::predicates::*;
    use super::*;
    use crate::device::testing::FakeDevice;

    fn devices() -> Vec<DeviceRecord> {
        vec![
            FakeDevice::integrated("igpu")
                .with_extensions(&["VK_KHR_swapchain"])
                .record(1),
            FakeDevice::discrete("dgpu")
                .with_extensions(&["VK_KHR_swapchain", "VK_KHR_ray_query"])
                .with_features(DeviceFeatures::GEOMETRY_SHADER)
                .record(2),
            FakeDevice::discrete("compute-only")
                .with_families(&[QueueCapabilities::COMPUTE | QueueCapabilities::TRANSFER])
                .record(3),
            FakeDevice::cpu("llvmpipe").record(4),
        ]
    }

    type Check = Box<dyn Fn(&DeviceRecord) -> bool>;

    fn stock() -> Vec<(&'static str, Check)> {
        vec![
            ("graphics", Box::new(has_queue_capabilities(QueueCapabilities::GRAPHICS)) as Check),
            ("swapchain", Box::new(has_extensions(vec!["VK_KHR_swapchain".into()]))),
            (
                "hardware",
                Box::new(device_type_in(vec![DeviceType::Integrated, DeviceType::Discrete])),
            ),
        ]
    }

    fn suitable_names(order: &[usize]) -> Vec<String> {
        let mut all: Vec<_> = stock().into_iter().map(Some).collect();
        let mut filter = SuitabilityFilter::new();
        for &i in order {
            let (name, check) = all[i].take().unwrap();
            filter.add(name, check);
        }
        filter.filter(devices()).into_iter().map(|d| d.name).collect()
    }

    // ── is_suitable ───────────────────────────────────────────────────────

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = SuitabilityFilter::new();
        assert!(devices().iter().all(|d| filter.is_suitable(d)));
    }

    #[test]
    fn single_rejection_vetoes() {
        let filter = SuitabilityFilter::new()
            .with("always", |_| true)
            .with("never", |_| false);
        assert!(!filter.is_suitable(&devices()[0]));
    }

    #[test]
    fn features_predicate() {
        let filter = SuitabilityFilter::new()
            .with("gs", has_features(DeviceFeatures::GEOMETRY_SHADER));
        let kept: Vec<_> = filter.filter(devices()).into_iter().map(|d| d.name).collect();
        assert_eq!(kept, vec!["dgpu"]);
    }

    // ── order independence ────────────────────────────────────────────────

    #[test]
    fn predicate_order_does_not_change_result() {
        let expected = suitable_names(&[0, 1, 2]);
        assert_eq!(expected, vec!["igpu", "dgpu"]);

        for order in [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            assert_eq!(suitable_names(&order), expected, "order {order:?}");
        }
    }

    #[test]
    fn names_keep_registration_order() {
        let filter = SuitabilityFilter::new().with("b", |_| true).with("a", |_| true);
        assert_eq!(filter.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(filter.len(), 2);
    }
}
