//! Scenario profiles exercising a full power cycle without hardware.

use chrono::{DateTime, TimeDelta, Utc};
use embassy_time::Duration;
use log::info;
use power_core::error::ShutdownError;
use power_core::orchestrator::{Clock, CycleConfig, SystemPower, WindowSchedule};

/// Selectable end-to-end scenario.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Profile {
    /// Window already open; the cycle waits out its end.
    Window,
    /// Window closed and far away; the cycle shuts down immediately.
    Skip,
    /// Window open and a stay-on extension arrives mid-wait.
    Extend,
}

impl Profile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("window") {
            Ok(Self::Window)
        } else if tag.eq_ignore_ascii_case("skip") {
            Ok(Self::Skip)
        } else if tag.eq_ignore_ascii_case("extend") {
            Ok(Self::Extend)
        } else {
            Err(format!("Unknown scenario profile `{tag}`"))
        }
    }

    /// Window boundaries for this scenario, anchored at `now`.
    pub fn window(self, now: DateTime<Utc>) -> ScenarioWindow {
        match self {
            Profile::Window | Profile::Extend => ScenarioWindow {
                start: now - TimeDelta::seconds(1),
                end: now + TimeDelta::seconds(2),
            },
            Profile::Skip => ScenarioWindow {
                start: now + TimeDelta::minutes(10),
                end: now + TimeDelta::minutes(40),
            },
        }
    }

    /// Whether this scenario schedules a mid-wait deadline extension.
    pub fn extends_mid_wait(self) -> bool {
        matches!(self, Profile::Extend)
    }
}

/// Cycle tuning scaled down so a scenario finishes in seconds.
pub fn cycle_config() -> CycleConfig {
    CycleConfig {
        skip_grace_period: true,
        skip_system_shutdown: false,
        poll_interval: Duration::from_millis(50),
        connect_retry_delay: Duration::from_millis(20),
        ..CycleConfig::default()
    }
}

/// Wall-clock source backed by the operating system.
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One concrete window anchored at scenario start.
pub struct ScenarioWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WindowSchedule for ScenarioWindow {
    fn is_active(&self) -> bool {
        let now = Utc::now();
        now >= self.start && now < self.end
    }

    fn next_start(&self) -> DateTime<Utc> {
        if Utc::now() < self.start {
            self.start
        } else {
            self.start + TimeDelta::days(1)
        }
    }

    fn next_end(&self) -> DateTime<Utc> {
        if Utc::now() < self.end {
            self.end
        } else {
            self.end + TimeDelta::days(1)
        }
    }
}

/// Stands in for the OS power-off path; only logs.
pub struct EmulatedPower;

impl SystemPower for EmulatedPower {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        info!("(emulated) host power-off requested");
        Ok(())
    }
}
