use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};

use super::app::{App, AppControl};
use super::signal::StopSignal;
use crate::time::TickClock;

/// Tick loop configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Used in log lines.
    pub name: String,

    /// Ticks per second.
    pub tick_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "kiln".to_string(),
            tick_rate: 60,
        }
    }
}

/// Lifecycle notifications published by the tick thread.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EngineEvent {
    Starting,
    Started,
    Stopping,
    Stopped,
}

/// Fixed-rate tick loop on a dedicated thread.
pub struct Engine;

impl Engine {
    pub const THREAD_NAME: &'static str = "kiln-tick";

    /// Starts the tick thread. Lifecycle events go to `sink`, which must not block.
    pub fn spawn<A, S>(config: EngineConfig, app: A, sink: S) -> Result<EngineHandle>
    where
        A: App,
        S: Fn(EngineEvent) + Send + Sync + 'static,
    {
        let stop = StopSignal::new();
        let thread_stop = stop.clone();

        let thread = thread::Builder::new()
            .name(Self::THREAD_NAME.to_string())
            .spawn(move || run_loop(config, app, &sink, &thread_stop))
            .context("failed to spawn tick thread")?;

        Ok(EngineHandle {
            stop,
            thread: Some(thread),
        })
    }
}

fn run_loop<A, S>(config: EngineConfig, mut app: A, sink: &S, stop: &StopSignal)
where
    A: App,
    S: Fn(EngineEvent),
{
    sink(EngineEvent::Starting);
    log::info!("{}: starting at {} Hz", config.name, config.tick_rate);

    let mut control = app.on_start();
    sink(EngineEvent::Started);

    let mut clock = TickClock::new(config.tick_rate);
    while control == AppControl::Continue && !stop.is_requested() {
        let time = clock.tick();
        control = app.on_tick(time);
        if control == AppControl::Exit {
            break;
        }

        let wait = clock.remaining(std::time::Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }

    // Let the host see that the engine ended on its own.
    stop.request();

    sink(EngineEvent::Stopping);
    log::info!("{}: stopping", config.name);
    app.on_stop();
    sink(EngineEvent::Stopped);
}

/// Owner of a running tick thread. Dropping it stops and joins the thread.
#[derive(Debug)]
pub struct EngineHandle {
    stop: StopSignal,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Asks the loop to finish after the current tick.
    pub fn stop(&self) {
        self.stop.request();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the tick thread to exit.
    pub fn join(mut self) -> Result<()> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| anyhow!("tick thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop.request();
        if let Err(e) = self.join_inner() {
            log::error!("{e:#}");
        }
    }
}
