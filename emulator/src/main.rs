//! Host-run emulator for the camera power controller.
//!
//! Drives the full orchestrator against in-memory register simulations of
//! the power MCU and RTC, under one of a few scripted scenario profiles. No
//! hardware is required; durations are scaled down so a run finishes in a
//! few seconds.

mod devices;
mod scenario;

use std::env;
use std::process;

use chrono::{DateTime, TimeDelta, Utc};
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Timer};
use log::info;
use power_core::bus::SharedBus;
use power_core::deadline::{DeadlineKind, DeadlineState};
use power_core::mcu::{MCU_ADDRESS, PowerMcuClient, REG_KEEP_ALIVE, REG_POWER_CTRL, watchdog};
use power_core::orchestrator::Orchestrator;
use static_cell::StaticCell;

use crate::devices::SimBus;
use crate::scenario::{EmulatedPower, Profile, ScenarioWindow, WallClock};

type Bus = SharedBus<CriticalSectionRawMutex, SimBus>;
type Deadlines = DeadlineState<CriticalSectionRawMutex>;
type McuClient = PowerMcuClient<'static, CriticalSectionRawMutex, SimBus>;

static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static BUS: StaticCell<Bus> = StaticCell::new();
static DEADLINES: StaticCell<Deadlines> = StaticCell::new();
static WINDOW: StaticCell<ScenarioWindow> = StaticCell::new();
static CLOCK: WallClock = WallClock;

fn main() {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: power-emulator [--profile <window|skip|extend>] | power-emulator <window|skip|extend>"
        );
        process::exit(2);
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    info!("emulator profile: {profile:?}");

    let now = Utc::now();
    let bus: &'static Bus = BUS.init(SharedBus::new(SimBus::new()));
    let deadlines: &'static Deadlines = DEADLINES.init(DeadlineState::new(now));
    let window: &'static ScenarioWindow = WINDOW.init(profile.window(now));

    EXECUTOR.init(Executor::new()).run(|spawner| {
        if profile.extends_mid_wait() {
            spawner.must_spawn(extender_task(
                deadlines,
                Duration::from_millis(500),
                Utc::now() + TimeDelta::seconds(4),
            ));
        }
        spawner.must_spawn(scenario_task(spawner, bus, deadlines, window));
    });
}

#[embassy_executor::task]
async fn scenario_task(
    spawner: Spawner,
    bus: &'static Bus,
    deadlines: &'static Deadlines,
    window: &'static ScenarioWindow,
) {
    let orchestrator = Orchestrator::new(
        bus,
        deadlines,
        &CLOCK,
        window,
        EmulatedPower,
        scenario::cycle_config(),
    );
    let outcome = orchestrator
        .run(|client| spawner.must_spawn(watchdog_task(client)))
        .await;

    match outcome {
        Ok(report) => {
            let guard = bus.lock().await;
            info!("trace: {:?}", report.trace.as_slice());
            info!("last camera state: {:?}", report.camera_state);
            info!(
                "bus summary: {} keep-alive ping(s), {} power-off command(s)",
                guard.writes_to(MCU_ADDRESS, REG_KEEP_ALIVE),
                guard.writes_to(MCU_ADDRESS, REG_POWER_CTRL),
            );
            process::exit(0);
        }
        Err(err) => {
            log::error!("scenario failed: {err}");
            process::exit(1);
        }
    }
}

#[embassy_executor::task]
async fn watchdog_task(client: McuClient) {
    // Scaled down from the production 5 s cadence.
    watchdog::run(client, Duration::from_millis(500), None).await;
}

#[embassy_executor::task]
async fn extender_task(deadlines: &'static Deadlines, after: Duration, until: DateTime<Utc>) {
    Timer::after(after).await;
    info!("extending stay-on deadline to {until}");
    deadlines.extend(DeadlineKind::StayOn, until);
}

fn parse_profile() -> Result<Profile, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            Profile::from_tag(value)
        } else if arg == "--profile" {
            if let Some(value) = args.next() {
                Profile::from_tag(&value)
            } else {
                Err("Expected value after --profile".to_string())
            }
        } else {
            Profile::from_tag(&arg)
        }
    } else {
        Ok(Profile::Window)
    }
}
