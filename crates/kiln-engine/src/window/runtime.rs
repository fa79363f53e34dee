use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

use crate::core::{App, Engine, EngineConfig, EngineEvent, EngineHandle};
use crate::device::{DeviceRecord, GpuInit, InitState, RenderBootstrap, VulkanPlatform};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "kiln".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        }
    }
}

type Listener = Box<dyn FnMut(&DeviceRecord) -> Result<()>>;

/// Entry point: one window, its graphics bootstrap, and the tick engine.
///
/// Closing the window stops the engine; the engine stopping closes the window.
/// Graphics are torn down before the window is destroyed in both cases.
pub struct Runtime {
    config: RuntimeConfig,
    gpu: GpuInit,
    engine: EngineConfig,
    listeners: Vec<Listener>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            gpu: GpuInit::default(),
            engine: EngineConfig::default(),
            listeners: Vec::new(),
        }
    }

    pub fn with_gpu(mut self, gpu: GpuInit) -> Self {
        self.gpu = gpu;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Observes the device chosen for the window. Runs on the main thread.
    pub fn on_device_selected<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&DeviceRecord) -> Result<()> + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Runs until the window closes or the app exits.
    ///
    /// Graphics initialization failures are returned here.
    pub fn run<A: App>(self, app: A) -> Result<()> {
        let event_loop = EventLoop::<EngineEvent>::with_user_event()
            .build()
            .context("failed to create winit EventLoop")?;
        let proxy = event_loop.create_proxy();
        let mut state = AppState::new(self, app, proxy);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct AppState<A: App> {
    runtime: Runtime,
    app: Option<A>,
    proxy: EventLoopProxy<EngineEvent>,

    // Field order is drop order: graphics before the window.
    engine: Option<EngineHandle>,
    bootstrap: Option<RenderBootstrap<VulkanPlatform>>,
    window: Option<Window>,

    error: Option<anyhow::Error>,
    shut_down: bool,
}

impl<A: App> AppState<A> {
    fn new(runtime: Runtime, app: A, proxy: EventLoopProxy<EngineEvent>) -> Self {
        Self {
            runtime,
            app: Some(app),
            proxy,
            engine: None,
            bootstrap: None,
            window: None,
            error: None,
            shut_down: false,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let config = &self.runtime.config;
        let attrs = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(config.initial_size);
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let mut bootstrap = RenderBootstrap::new(self.runtime.gpu.clone());
        for listener in self.runtime.listeners.drain(..) {
            bootstrap.on_device_selected(listener);
        }

        let result = bootstrap.initialize(&window, VulkanPlatform::load);
        self.window = Some(window);
        self.bootstrap = Some(bootstrap);
        result.context("graphics initialization failed")?;

        self.log_swapchain_choice();

        let app = self
            .app
            .take()
            .ok_or_else(|| anyhow!("runtime resumed twice"))?;
        let proxy = Mutex::new(self.proxy.clone());
        let sink = move |event: EngineEvent| {
            if let Ok(proxy) = proxy.lock() {
                // The loop may already be gone during shutdown.
                let _ = proxy.send_event(event);
            }
        };
        self.engine = Some(Engine::spawn(self.runtime.engine.clone(), app, sink)?);
        Ok(())
    }

    fn log_swapchain_choice(&self) {
        let Some(bootstrap) = &self.bootstrap else {
            return;
        };
        let (Some(swapchain), Some(extent)) = (bootstrap.swapchain(), bootstrap.extent()) else {
            return;
        };

        let gpu = bootstrap.config();
        log::info!(
            "swapchain: format {:?}, present mode {:?}, {} image(s), {}x{}",
            swapchain.preferred_format(gpu.prefer_srgb),
            swapchain.preferred_present_mode(gpu.present_mode),
            swapchain.image_count(),
            extent.width,
            extent.height
        );
    }

    /// Stops the engine, tears down graphics, then destroys the window.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(engine) = self.engine.take() {
            engine.stop();
            if let Err(e) = engine.join() {
                log::error!("{e:#}");
            }
        }

        if let Some(mut bootstrap) = self.bootstrap.take() {
            bootstrap.teardown();
        }
        self.window = None;

        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error.get_or_insert(error);
        self.shutdown(event_loop);
    }
}

impl<A: App> ApplicationHandler<EngineEvent> for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.shut_down {
            return;
        }

        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: EngineEvent) {
        log::debug!("engine: {event:?}");
        if matches!(event, EngineEvent::Stopping | EngineEvent::Stopped) {
            self.shutdown(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                let Some(bootstrap) = self.bootstrap.as_mut() else {
                    return;
                };
                if bootstrap.state() != InitState::SwapchainReady {
                    return;
                }
                if let Err(e) = bootstrap.refresh_swapchain((size.width, size.height)) {
                    let e = anyhow::Error::new(e).context("swapchain refresh failed");
                    self.fail(event_loop, e);
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        self.shutdown(event_loop);
    }
}
