use std::fmt;

use thiserror::Error;

use super::binder::{BoundDevice, DeviceBinder};
use super::catalog::DeviceCatalog;
use super::error::DeviceError;
use super::init::GpuInit;
use super::platform::{GraphicsPlatform, SurfaceTarget};
use super::queues;
use super::record::{DeviceRecord, SurfaceHandle};
use super::selection::{self, Candidate};
use super::suitability::{SuitabilityFilter, predicates};
use super::swapchain::{self, Extent, SwapchainDescriptor};
use crate::core::StopSignal;

/// Initialization stage, used to report where a failure happened.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Stage {
    Configuration,
    ApiLoad,
    Surface,
    DeviceSelection,
    DeviceBinding,
    SwapchainQuery,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Configuration => "configuration",
            Stage::ApiLoad => "graphics API load",
            Stage::Surface => "surface creation",
            Stage::DeviceSelection => "device selection",
            Stage::DeviceBinding => "device binding",
            Stage::SwapchainQuery => "swapchain query",
        };
        f.write_str(s)
    }
}

/// Progress of the initialization chain.
///
/// Transitions only move forward; teardown walks back to `Uninitialized`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InitState {
    Uninitialized,
    ApiLoaded,
    SurfaceReady,
    DeviceBound,
    SwapchainReady,
    Failed(Stage),
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("{}", describe_failure(.stage, .source))]
    Failed {
        stage: Stage,
        #[source]
        source: DeviceError,
    },

    #[error("initialization cancelled before {before}")]
    Cancelled { before: Stage },

    #[error("cannot initialize from state {0:?}; tear down first")]
    InvalidState(InitState),
}

impl InitError {
    /// The underlying device error, if this is a stage failure.
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            InitError::Failed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            InitError::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn describe_failure(stage: &Stage, source: &DeviceError) -> String {
    match source {
        DeviceError::NotFound => source.to_string(),
        _ => format!("{stage} failed: {source}"),
    }
}

enum Halt {
    Failed(Stage, DeviceError),
    Cancelled(Stage),
}

fn checkpoint(stop: &StopSignal, next: Stage) -> Result<(), Halt> {
    if stop.is_requested() {
        Err(Halt::Cancelled(next))
    } else {
        Ok(())
    }
}

/// Drives the device pipeline from a bare window to swapchain support.
///
/// Stages run strictly in order: API load, surface, device selection, device
/// binding, swapchain query. Any failure releases everything built so far and
/// parks the bootstrap in [`InitState::Failed`].
pub struct RenderBootstrap<P: GraphicsPlatform> {
    init: GpuInit,
    filter: SuitabilityFilter,
    binder: DeviceBinder,
    stop: StopSignal,

    state: InitState,
    platform: Option<P>,
    surface: Option<SurfaceHandle>,
    bound: Option<BoundDevice>,
    swapchain: Option<SwapchainDescriptor>,
    framebuffer: (u32, u32),
}

impl<P: GraphicsPlatform> RenderBootstrap<P> {
    pub fn new(init: GpuInit) -> Self {
        let mut filter = SuitabilityFilter::new();
        if !init.required_device_extensions.is_empty() {
            filter.add(
                "required device extensions",
                predicates::has_extensions(init.required_device_extensions.clone()),
            );
        }

        Self {
            init,
            filter,
            binder: DeviceBinder::new(),
            stop: StopSignal::new(),
            state: InitState::Uninitialized,
            platform: None,
            surface: None,
            bound: None,
            swapchain: None,
            framebuffer: (0, 0),
        }
    }

    /// Shares a stop signal; it is checked between stages.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Suitability predicates applied during device selection.
    pub fn filter_mut(&mut self) -> &mut SuitabilityFilter {
        &mut self.filter
    }

    /// Registers a device-selected observer. See [`DeviceBinder::on_device_selected`].
    pub fn on_device_selected<F>(&mut self, listener: F)
    where
        F: FnMut(&DeviceRecord) -> anyhow::Result<()> + 'static,
    {
        self.binder.on_device_selected(listener);
    }

    pub fn config(&self) -> &GpuInit {
        &self.init
    }

    pub fn state(&self) -> InitState {
        self.state
    }

    pub fn platform(&self) -> Option<&P> {
        self.platform.as_ref()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    pub fn bound_device(&self) -> Option<&BoundDevice> {
        self.bound.as_ref()
    }

    pub fn swapchain(&self) -> Option<&SwapchainDescriptor> {
        self.swapchain.as_ref()
    }

    /// Swapchain extent for the last known framebuffer size.
    pub fn extent(&self) -> Option<Extent> {
        self.swapchain
            .as_ref()
            .map(|s| s.clamp_extent(self.framebuffer))
    }

    /// Runs every stage against `target`, loading the API with `load`.
    ///
    /// Only valid from [`InitState::Uninitialized`].
    pub fn initialize<L>(&mut self, target: &dyn SurfaceTarget, load: L) -> Result<(), InitError>
    where
        L: FnOnce(&GpuInit, &dyn SurfaceTarget) -> Result<P, DeviceError>,
    {
        if self.state != InitState::Uninitialized {
            return Err(InitError::InvalidState(self.state));
        }

        match self.run_stages(target, load) {
            Ok(()) => {
                log::info!("graphics initialization complete");
                Ok(())
            }
            Err(Halt::Failed(stage, source)) => {
                log::error!("{}", describe_failure(&stage, &source));
                self.release_all();
                self.state = InitState::Failed(stage);
                Err(InitError::Failed { stage, source })
            }
            Err(Halt::Cancelled(before)) => {
                log::info!("initialization cancelled before {before}");
                self.release_all();
                self.state = InitState::Uninitialized;
                Err(InitError::Cancelled { before })
            }
        }
    }

    fn run_stages<L>(&mut self, target: &dyn SurfaceTarget, load: L) -> Result<(), Halt>
    where
        L: FnOnce(&GpuInit, &dyn SurfaceTarget) -> Result<P, DeviceError>,
    {
        self.init
            .criteria
            .validate()
            .map_err(|e| Halt::Failed(Stage::Configuration, e))?;

        checkpoint(&self.stop, Stage::ApiLoad)?;
        let platform = load(&self.init, target).map_err(|e| Halt::Failed(Stage::ApiLoad, e))?;
        let platform = self.platform.insert(platform);
        self.state = InitState::ApiLoaded;

        checkpoint(&self.stop, Stage::Surface)?;
        let surface = platform
            .create_surface(target)
            .map_err(|e| Halt::Failed(Stage::Surface, e))?;
        self.surface = Some(surface);
        self.framebuffer = target.framebuffer_size();
        self.state = InitState::SurfaceReady;

        checkpoint(&self.stop, Stage::DeviceSelection)?;
        let candidate = select_device(&*platform, surface, &self.init, &self.filter)
            .map_err(|e| Halt::Failed(Stage::DeviceSelection, e))?;
        log::info!("selected {}", candidate.device);

        checkpoint(&self.stop, Stage::DeviceBinding)?;
        let bound = self
            .binder
            .bind(
                platform,
                &candidate.device,
                candidate.families,
                self.init.required_device_extensions.as_slice(),
            )
            .map_err(|e| Halt::Failed(Stage::DeviceBinding, e))?;
        let bound = self.bound.insert(bound);
        self.state = InitState::DeviceBound;

        checkpoint(&self.stop, Stage::SwapchainQuery)?;
        let descriptor = swapchain::query_swapchain_support(&*platform, bound, surface)
            .map_err(|e| Halt::Failed(Stage::SwapchainQuery, e))?;
        self.swapchain = Some(descriptor);
        self.state = InitState::SwapchainReady;

        Ok(())
    }

    /// Re-derives swapchain support after the window was resized.
    pub fn refresh_swapchain(&mut self, framebuffer: (u32, u32)) -> Result<(), InitError> {
        if self.state != InitState::SwapchainReady {
            return Err(InitError::InvalidState(self.state));
        }
        self.framebuffer = framebuffer;

        let (Some(platform), Some(bound), Some(surface)) =
            (self.platform.as_ref(), self.bound.as_ref(), self.surface)
        else {
            return Err(InitError::InvalidState(self.state));
        };

        match swapchain::query_swapchain_support(platform, bound, surface) {
            Ok(descriptor) => {
                self.swapchain = Some(descriptor);
                Ok(())
            }
            Err(source) => {
                log::error!("{}", describe_failure(&Stage::SwapchainQuery, &source));
                self.release_all();
                self.state = InitState::Failed(Stage::SwapchainQuery);
                Err(InitError::Failed {
                    stage: Stage::SwapchainQuery,
                    source,
                })
            }
        }
    }

    /// Releases everything in reverse creation order.
    ///
    /// Safe to call in any state and any number of times; always ends in
    /// [`InitState::Uninitialized`].
    pub fn teardown(&mut self) {
        if self.state != InitState::Uninitialized {
            log::debug!("tearing down graphics from {:?}", self.state);
        }
        self.release_all();
        self.state = InitState::Uninitialized;
    }

    fn release_all(&mut self) {
        if self.swapchain.take().is_some() {
            self.state = InitState::DeviceBound;
        }

        if let Some(bound) = self.bound.take() {
            if let Some(platform) = self.platform.as_mut() {
                self.binder.release(platform, bound);
            }
            self.state = InitState::SurfaceReady;
        }

        if let Some(surface) = self.surface.take() {
            if let Some(platform) = self.platform.as_mut() {
                log::debug!("destroying surface {surface:?}");
                platform.destroy_surface(surface);
            }
            self.state = InitState::ApiLoaded;
        }

        if self.platform.take().is_some() {
            log::debug!("graphics API unloaded");
            self.state = InitState::Uninitialized;
        }
    }
}

impl<P: GraphicsPlatform> Drop for RenderBootstrap<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<P: GraphicsPlatform> fmt::Debug for RenderBootstrap<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBootstrap")
            .field("state", &self.state)
            .field("surface", &self.surface)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

fn select_device<P>(
    platform: &P,
    surface: SurfaceHandle,
    init: &GpuInit,
    filter: &SuitabilityFilter,
) -> Result<Candidate, DeviceError>
where
    P: GraphicsPlatform + ?Sized,
{
    let mut candidates = Vec::new();
    let mut query_failure = None;
    for device in DeviceCatalog::new(platform).enumerate()? {
        if !filter.is_suitable(&device) {
            continue;
        }
        match queues::resolve(platform, &device, Some(surface)) {
            Ok(families) => candidates.push(Candidate { device, families }),
            Err(e) => {
                log::warn!("skipping {device}: {e}");
                query_failure = Some(e);
            }
        }
    }

    // Only surface the query error when no suitable device could be examined.
    if let (true, Some(e)) = (candidates.is_empty(), query_failure) {
        return Err(e);
    }

    if let Some(query) = &init.device {
        candidates = selection::select_matching(candidates, query);
    }

    selection::select(candidates, init.criteria, true)?.ok_or(DeviceError::NotFound)
}
