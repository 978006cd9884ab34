//! Camera power controller daemon.
//!
//! Connects to the power MCU and the RTC on the shared I2C bus, keeps the
//! MCU's watchdog fed from a background task, programs the next wake alarm,
//! waits out the configured power window, and finally hands the host to the
//! operating system's power-off path. The MCU cuts camera power after its
//! own delay once the host is down.

mod config;
mod schedule;
mod shutdown;

use std::env;
use std::path::PathBuf;
use std::process;

use chrono::Utc;
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{error, info};
use power_core::bus::SharedBus;
use power_core::deadline::DeadlineState;
use power_core::mcu::{PowerMcuClient, watchdog};
use power_core::orchestrator::{CycleConfig, Orchestrator};
use rppal::i2c::I2c;
use static_cell::StaticCell;

use crate::config::Config;
use crate::schedule::{DailyWindow, SystemClock};
use crate::shutdown::Poweroff;

type Bus = SharedBus<CriticalSectionRawMutex, I2c>;
type Deadlines = DeadlineState<CriticalSectionRawMutex>;
type McuClient = PowerMcuClient<'static, CriticalSectionRawMutex, I2c>;

static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static BUS: StaticCell<Bus> = StaticCell::new();
static DEADLINES: StaticCell<Deadlines> = StaticCell::new();
static SCHEDULE: StaticCell<DailyWindow<SystemClock>> = StaticCell::new();
static CLOCK: SystemClock = SystemClock;

struct Args {
    config_dir: PathBuf,
    skip_wait: bool,
    skip_system_shutdown: bool,
    timestamps: bool,
}

fn main() {
    let args = parse_args().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: powerd [--config <dir>] [--skip-wait] [--skip-system-shutdown] [--timestamps]"
        );
        process::exit(2);
    });

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if !args.timestamps {
        builder.format_timestamp(None);
    }
    builder.init();

    info!("running version {}", env!("CARGO_PKG_VERSION"));

    let config = config::load(&args.config_dir).unwrap_or_else(|err| {
        error!("configuration error: {err}");
        process::exit(1);
    });

    let cycle = CycleConfig {
        skip_grace_period: args.skip_wait,
        skip_system_shutdown: args.skip_system_shutdown,
        ..CycleConfig::default()
    };

    let bus = open_bus(&config);
    let bus: &'static Bus = BUS.init(SharedBus::new(bus));
    let deadlines: &'static Deadlines = DEADLINES.init(DeadlineState::new(Utc::now()));
    let window: &'static DailyWindow<SystemClock> = SCHEDULE.init(DailyWindow::new(
        config.window_start,
        config.window_end,
        SystemClock,
    ));

    EXECUTOR.init(Executor::new()).run(|spawner| {
        spawner.must_spawn(cycle_task(spawner, bus, deadlines, window, cycle));
    });
}

fn open_bus(config: &Config) -> I2c {
    match I2c::with_bus(config.i2c_bus) {
        Ok(bus) => bus,
        Err(err) => {
            error!("failed to open i2c bus {}: {err}", config.i2c_bus);
            process::exit(1);
        }
    }
}

#[embassy_executor::task]
async fn cycle_task(
    spawner: Spawner,
    bus: &'static Bus,
    deadlines: &'static Deadlines,
    window: &'static DailyWindow<SystemClock>,
    config: CycleConfig,
) {
    let orchestrator = Orchestrator::new(bus, deadlines, &CLOCK, window, Poweroff, config);
    let outcome = orchestrator
        .run(|client| spawner.must_spawn(watchdog_task(client)))
        .await;
    match outcome {
        Ok(report) => {
            // The watchdog task stays alive on purpose; the MCU performs the
            // actual power cut after its own delay.
            info!(
                "power cycle complete; last camera state {:?}",
                report.camera_state
            );
            process::exit(0);
        }
        Err(err) => {
            error!("power cycle failed: {err}");
            process::exit(1);
        }
    }
}

#[embassy_executor::task]
async fn watchdog_task(client: McuClient) {
    watchdog::run(client, watchdog::WATCHDOG_INTERVAL, None).await;
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_dir: PathBuf::from(config::DEFAULT_CONFIG_DIR),
        skip_wait: false,
        skip_system_shutdown: false,
        timestamps: false,
    };

    let mut raw = env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = raw
                    .next()
                    .ok_or_else(|| "Expected value after --config".to_string())?;
                args.config_dir = PathBuf::from(value);
            }
            "--skip-wait" | "-s" => args.skip_wait = true,
            "--skip-system-shutdown" => args.skip_system_shutdown = true,
            "--timestamps" | "-t" => args.timestamps = true,
            other => {
                if let Some(value) = other.strip_prefix("--config=") {
                    args.config_dir = PathBuf::from(value);
                } else {
                    return Err(format!("Unknown argument `{other}`"));
                }
            }
        }
    }
    Ok(args)
}
