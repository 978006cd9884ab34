//! Background keep-alive loop for the power MCU's watchdog timer.
//!
//! Runs for the process's entire lifetime, independent of whatever the main
//! sequence is doing. A single failed ping is logged and skipped; if pings
//! stop arriving entirely, the MCU's own watchdog timeout takes over and
//! hard-resets the unit.

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_hal::i2c::I2c;
use log::warn;

use super::PowerMcuClient;

/// Production keep-alive cadence.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Pings the watchdog register on a fixed cadence.
///
/// Production callers pass `None` for `stop` and let the task live until
/// process exit; tests use the signal for teardown.
pub async fn run<M: RawMutex, B: I2c>(
    client: PowerMcuClient<'_, M, B>,
    interval: Duration,
    stop: Option<&Signal<M, ()>>,
) {
    loop {
        if let Err(err) = client.ping_watchdog().await {
            warn!("watchdog ping failed: {err}");
        }
        match stop {
            Some(signal) => {
                if let Either::Second(()) = select(Timer::after(interval), signal.wait()).await {
                    return;
                }
            }
            None => Timer::after(interval).await,
        }
    }
}
