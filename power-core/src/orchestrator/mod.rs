//! Top-level state machine driving one full power cycle.
//!
//! The orchestrator connects to the power MCU (handing a client to the
//! caller's watchdog task), programs the RTC wake alarm, waits out the
//! configured power window, and finally sequences the power-off handoff.
//! Wall-clock time and the window schedule are collaborator traits so the
//! daemon, the emulator, and the tests can each supply their own.

use chrono::{DateTime, TimeDelta, Utc};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};
use embedded_hal::i2c::I2c;
use heapless::Vec;
use log::{debug, error, info, warn};

use crate::bus::SharedBus;
use crate::deadline::DeadlineState;
use crate::error::{CycleError, ShutdownError};
use crate::mcu::{CameraState, PowerMcuClient, RetryBudget};
use crate::rtc::{AlarmTime, RtcClient};

/// Fixed operator-intervention window observed before any shutdown logic.
pub const INITIAL_GRACE_PERIOD: Duration = Duration::from_secs(20 * 60);

/// Default cadence for re-sampling deadlines and the window mid-wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default delay between power-MCU connect probes.
pub const DEFAULT_CONNECT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// States visited retained for the cycle report.
pub const MAX_TRACED_TRANSITIONS: usize = 8;

/// Source of the current wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Opaque view of the configured power window.
///
/// The core performs no calendar arithmetic of its own; whoever implements
/// this owns the window boundaries.
pub trait WindowSchedule {
    /// Whether the window is open right now.
    fn is_active(&self) -> bool;
    /// Start of the next window.
    fn next_start(&self) -> DateTime<Utc>;
    /// End of the current window while it is open, otherwise of the next one.
    fn next_end(&self) -> DateTime<Utc>;
}

/// Host-side power-off collaborator.
pub trait SystemPower {
    /// Asks the operating system to power the host down.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] carrying captured command diagnostics.
    fn power_off(&mut self) -> Result<(), ShutdownError>;
}

/// Tuning and policy switches for one power cycle.
#[derive(Copy, Clone, Debug)]
pub struct CycleConfig {
    /// Skip the initial operator grace period.
    pub skip_grace_period: bool,
    /// Announce power-off to the MCU but leave the host OS running.
    pub skip_system_shutdown: bool,
    /// Length of the operator grace period.
    pub grace_period: Duration,
    /// Poll cadence of the resumable window wait.
    pub poll_interval: Duration,
    /// Delay between power-MCU connect probes.
    pub connect_retry_delay: Duration,
    /// Horizon within which an upcoming window counts as imminent.
    pub window_imminent: TimeDelta,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            skip_grace_period: false,
            skip_system_shutdown: false,
            grace_period: INITIAL_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_retry_delay: DEFAULT_CONNECT_RETRY_DELAY,
            window_imminent: TimeDelta::minutes(2),
        }
    }
}

/// Phases of one full power cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CycleState {
    Connecting,
    GracePeriod,
    AwaitWindow,
    Shutdown,
    Terminal,
}

impl CycleState {
    /// Returns `true` once no further transition can occur.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, CycleState::Terminal)
    }
}

impl core::fmt::Display for CycleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CycleState::Connecting => f.write_str("connecting"),
            CycleState::GracePeriod => f.write_str("grace-period"),
            CycleState::AwaitWindow => f.write_str("await-window"),
            CycleState::Shutdown => f.write_str("shutdown"),
            CycleState::Terminal => f.write_str("terminal"),
        }
    }
}

/// Summary returned once a cycle reaches [`CycleState::Terminal`].
#[derive(Clone, Debug)]
pub struct CycleReport {
    /// States visited, in order.
    pub trace: Vec<CycleState, MAX_TRACED_TRANSITIONS>,
    /// Last camera state observed before the handoff.
    pub camera_state: Option<CameraState>,
}

/// Drives one full power cycle over the shared bus.
pub struct Orchestrator<'a, M, B, C, W, P>
where
    M: RawMutex,
    B: I2c,
    C: Clock,
    W: WindowSchedule,
    P: SystemPower,
{
    bus: &'a SharedBus<M, B>,
    deadlines: &'a DeadlineState<M>,
    clock: &'a C,
    schedule: &'a W,
    system: P,
    config: CycleConfig,
    state: CycleState,
    trace: Vec<CycleState, MAX_TRACED_TRANSITIONS>,
}

impl<'a, M, B, C, W, P> Orchestrator<'a, M, B, C, W, P>
where
    M: RawMutex,
    B: I2c,
    C: Clock,
    W: WindowSchedule,
    P: SystemPower,
{
    /// Assembles an orchestrator over its collaborators.
    pub fn new(
        bus: &'a SharedBus<M, B>,
        deadlines: &'a DeadlineState<M>,
        clock: &'a C,
        schedule: &'a W,
        system: P,
        config: CycleConfig,
    ) -> Self {
        Self {
            bus,
            deadlines,
            clock,
            schedule,
            system,
            config,
            state: CycleState::Connecting,
            trace: Vec::new(),
        }
    }

    /// Runs the cycle to its terminal state.
    ///
    /// `start_watchdog` receives a connected client exactly once, before any
    /// waiting begins, so the caller can start the keep-alive task. The task
    /// is intentionally left running after the terminal state; the MCU, not
    /// this process, performs the actual power cut after its own delay.
    ///
    /// # Errors
    ///
    /// Returns the fatal [`CycleError`] that aborted the cycle. Errors while
    /// connecting or shutting down are fatal; transient failures during the
    /// window wait are logged and absorbed.
    pub async fn run<F>(mut self, start_watchdog: F) -> Result<CycleReport, CycleError>
    where
        F: FnOnce(PowerMcuClient<'a, M, B>),
    {
        let outcome = self.drive(start_watchdog).await;
        self.enter(CycleState::Terminal);
        match outcome {
            Ok(client) => Ok(CycleReport {
                trace: self.trace.clone(),
                camera_state: client.camera_state(),
            }),
            Err(err) => {
                error!("power cycle aborted: {err}");
                Err(err)
            }
        }
    }

    async fn drive<F>(&mut self, start_watchdog: F) -> Result<PowerMcuClient<'a, M, B>, CycleError>
    where
        F: FnOnce(PowerMcuClient<'a, M, B>),
    {
        let mut client = self.connecting(start_watchdog).await?;
        self.grace_period().await;
        self.await_window(&mut client).await;
        self.shutdown(&mut client).await?;
        Ok(client)
    }

    /// `Connecting`: establish the MCU link, hand the watchdog its client,
    /// then bring the RTC to a known state with the next wake alarm armed.
    ///
    /// The alarm flag is cleared and the new alarm programmed and enabled
    /// strictly before any wait state; a unit that cannot confirm its wake
    /// alarm must not be left to rely on it.
    async fn connecting<F>(
        &mut self,
        start_watchdog: F,
    ) -> Result<PowerMcuClient<'a, M, B>, CycleError>
    where
        F: FnOnce(PowerMcuClient<'a, M, B>),
    {
        self.enter(CycleState::Connecting);

        info!("connecting to power mcu");
        let mut client = PowerMcuClient::connect(
            self.bus,
            RetryBudget::Unbounded,
            self.config.connect_retry_delay,
        )
        .await?;
        start_watchdog(client.clone());

        let rtc = RtcClient::new(self.bus);
        let rtc_time = rtc.get_time().await?;
        info!("rtc time: {}", rtc_time.to_rfc3339());

        let camera = client.read_camera_state().await?;
        info!("camera state: {camera}");

        rtc.clear_alarm_flag().await?;

        let wake_at = self.schedule.next_start();
        let alarm = AlarmTime::from_datetime(&wake_at);
        info!(
            "programming wake alarm for {wake_at} (day {} at {:02}:{:02} utc)",
            alarm.day, alarm.hour, alarm.minute
        );
        rtc.set_alarm_time(&alarm).await?;
        rtc.set_alarm_enabled(true).await?;

        Ok(client)
    }

    /// `GracePeriod`: unconditional pause giving an operator time to step in
    /// before any shutdown logic can trigger.
    async fn grace_period(&mut self) {
        self.enter(CycleState::GracePeriod);
        if self.config.skip_grace_period {
            info!("skipping initial grace period");
            return;
        }
        info!(
            "waiting {} s before any power-off decision",
            self.config.grace_period.as_secs()
        );
        Timer::after(self.config.grace_period).await;
    }

    /// `AwaitWindow`: resumable wait until the window and every extendable
    /// deadline have passed, or an immediate fall-through when there is
    /// nothing to wait for in this run.
    async fn await_window(&mut self, client: &mut PowerMcuClient<'a, M, B>) {
        self.enter(CycleState::AwaitWindow);

        let now = self.clock.now();
        let next_start = self.schedule.next_start();
        let imminent = next_start - now < self.config.window_imminent;
        if !self.schedule.is_active() && !imminent {
            info!("window closed and next start {next_start} is not imminent; not waiting");
            return;
        }

        let mut window_end = self.schedule.next_end();
        info!("waiting until {window_end} before powering off");
        loop {
            // Refresh the end only while the window is still open; once it
            // closes, next_end() names the following window and would push
            // the target a whole cycle out.
            if self.schedule.is_active() {
                window_end = self.schedule.next_end();
            }
            let (stay_on, maintenance) = self.deadlines.snapshot();
            let target = window_end.max(stay_on).max(maintenance);

            let now = self.clock.now();
            if now >= target {
                info!("wait target {target} reached");
                break;
            }
            let remaining = target - now;
            debug!("{} s until power-off target {target}", remaining.num_seconds());
            Timer::after(poll_slice(remaining, self.config.poll_interval)).await;
        }

        // Diagnostic only; a transient read failure here must not abort.
        let _ = self.log_camera_state(client).await;
    }

    /// `Shutdown`: tell the MCU power is going away, confirm it observed the
    /// command, then hand the host to the OS power-off path.
    async fn shutdown(
        &mut self,
        client: &mut PowerMcuClient<'a, M, B>,
    ) -> Result<(), CycleError> {
        self.enter(CycleState::Shutdown);

        self.log_camera_state(client).await?;
        client.powering_off().await?;
        self.log_camera_state(client).await?;

        if self.config.skip_system_shutdown {
            info!("skipping operating system shutdown");
            return Ok(());
        }
        info!("asking the operating system to power off");
        self.system.power_off()?;
        Ok(())
    }

    /// Reads and logs the camera state; callers decide whether a failure is
    /// fatal for their phase.
    async fn log_camera_state(
        &self,
        client: &mut PowerMcuClient<'a, M, B>,
    ) -> Result<CameraState, CycleError> {
        match client.read_camera_state().await {
            Ok(state) => {
                info!("camera state: {state}");
                Ok(state)
            }
            Err(err) => {
                warn!("camera state read failed: {err}");
                Err(err.into())
            }
        }
    }

    fn enter(&mut self, next: CycleState) {
        info!("entering {next}");
        self.state = next;
        // The trace is diagnostic; saturating silently is fine.
        let _ = self.trace.push(next);
    }

    /// Current phase, mostly for host-side status output.
    #[must_use]
    pub const fn state(&self) -> CycleState {
        self.state
    }
}

/// Next sleep slice of the poll loop: the poll interval, or less when the
/// target is closer than that.
#[allow(clippy::cast_sign_loss)]
fn poll_slice(remaining: TimeDelta, poll_interval: Duration) -> Duration {
    let millis = remaining.num_milliseconds();
    if millis <= 0 {
        return Duration::from_millis(0);
    }
    let remaining = Duration::from_millis(millis as u64);
    remaining.min(poll_interval)
}
