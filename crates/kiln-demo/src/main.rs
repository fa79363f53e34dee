use std::path::Path;

use anyhow::Result;
use kiln_engine::content::{ContentSource, FileSystemContent};
use kiln_engine::core::{App, AppControl, EngineConfig};
use kiln_engine::device::{GpuInit, PresentMode, SelectionCriteria};
use kiln_engine::logging::{LoggingConfig, init_logging};
use kiln_engine::time::TickTime;
use kiln_engine::window::{Runtime, RuntimeConfig};

const TICK_RATE: u32 = 60;

/// Logs a heartbeat once per second of simulated time.
struct Heartbeat {
    seconds: u64,
}

impl App for Heartbeat {
    fn on_start(&mut self) -> AppControl {
        log::info!("demo started");
        AppControl::Continue
    }

    fn on_tick(&mut self, time: TickTime) -> AppControl {
        if time.tick_index % u64::from(TICK_RATE) == 0 {
            log::debug!("heartbeat {}s", self.seconds);
            self.seconds += 1;
        }
        AppControl::Continue
    }

    fn on_stop(&mut self) {
        log::info!("demo stopped after {}s", self.seconds);
    }
}

/// `--integrated`, `--dedicated` and `--memory` map onto selection flags.
fn criteria_from_args() -> SelectionCriteria {
    let mut criteria = SelectionCriteria::empty();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--integrated" => criteria |= SelectionCriteria::PREFER_INTEGRATED,
            "--dedicated" => criteria |= SelectionCriteria::PREFER_DEDICATED,
            "--memory" => criteria |= SelectionCriteria::HIGHEST_MEMORY,
            other => log::warn!("ignoring unknown argument {other:?}"),
        }
    }
    criteria
}

fn print_banner() {
    let Ok(content) = FileSystemContent::beside_executable("content") else {
        return;
    };
    match content.read_to_string(Path::new("banner.txt")) {
        Ok(banner) => println!("{banner}"),
        Err(e) => log::debug!("no banner: {e}"),
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    print_banner();

    let gpu = GpuInit {
        app_name: "kiln-demo".to_string(),
        criteria: criteria_from_args(),
        present_mode: PresentMode::Mailbox,
        ..GpuInit::default()
    };

    Runtime::new(RuntimeConfig {
        title: "Kiln".to_string(),
        ..RuntimeConfig::default()
    })
    .with_gpu(gpu)
    .with_engine(EngineConfig {
        name: "demo".to_string(),
        tick_rate: TICK_RATE,
    })
    .on_device_selected(|device| {
        log::info!(
            "rendering on {device} with {} MiB of local memory",
            device.device_local_memory() / (1024 * 1024)
        );
        Ok(())
    })
    .run(Heartbeat { seconds: 0 })
}
