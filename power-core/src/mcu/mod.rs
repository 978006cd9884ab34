//! Client for the companion power MCU's control and status registers.
//!
//! The MCU switches camera power, reports the camera's power state, and runs
//! the watchdog timer that resets the unit if the keep-alive register stops
//! being written. Communication is plain register traffic on the shared bus;
//! the MCU may simply not answer while it is still booting, which is why
//! connecting goes through a retry budget.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::bus::{self, SharedBus};
use crate::error::{BusError, ConnectionError, Device, DeviceError};

pub mod watchdog;

/// Bus address of the power MCU.
pub const MCU_ADDRESS: u8 = 0x25;

/// Firmware revision register, also used as the connect probe.
pub const REG_VERSION: u8 = 0x01;
/// Camera power state register.
pub const REG_CAMERA_STATE: u8 = 0x02;
/// Power control register the host writes its power-off intent to.
pub const REG_POWER_CTRL: u8 = 0x05;
/// Watchdog keep-alive register.
pub const REG_KEEP_ALIVE: u8 = 0x0E;

/// Value the watchdog expects on every keep-alive write.
pub const KEEP_ALIVE_VALUE: u8 = 0x01;
/// Power-control command announcing the host is about to power down.
pub const POWER_CTRL_HOST_OFF: u8 = 0x00;
/// Firmware revision this controller was developed against.
pub const EXPECTED_FIRMWARE_VERSION: u8 = 0x03;

/// Camera power state decoded from the status register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CameraState {
    PoweringOn,
    PoweredOn,
    PoweringOff,
    PoweredOff,
    PowerOnTimeout,
    Invalid,
}

impl From<u8> for CameraState {
    fn from(value: u8) -> Self {
        match value {
            0x00 => CameraState::PoweringOn,
            0x01 => CameraState::PoweredOn,
            0x02 => CameraState::PoweringOff,
            0x03 => CameraState::PoweredOff,
            0x04 => CameraState::PowerOnTimeout,
            raw => {
                if raw != 0x05 {
                    warn!("unknown camera state {raw:#04x}");
                }
                CameraState::Invalid
            }
        }
    }
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraState::PoweringOn => f.write_str("powering-on"),
            CameraState::PoweredOn => f.write_str("powered-on"),
            CameraState::PoweringOff => f.write_str("powering-off"),
            CameraState::PoweredOff => f.write_str("powered-off"),
            CameraState::PowerOnTimeout => f.write_str("power-on-timeout"),
            CameraState::Invalid => f.write_str("invalid"),
        }
    }
}

/// Attempt budget for [`PowerMcuClient::connect`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RetryBudget {
    /// Keep probing until the device answers; boot-time behavior.
    Unbounded,
    /// Give up after this many probe attempts.
    Attempts(u32),
}

/// Client for the power MCU, created only once a probe has succeeded.
pub struct PowerMcuClient<'a, M: RawMutex, B: I2c> {
    bus: &'a SharedBus<M, B>,
    camera_state: Option<CameraState>,
}

impl<'a, M: RawMutex, B: I2c> Clone for PowerMcuClient<'a, M, B> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus,
            camera_state: self.camera_state,
        }
    }
}

impl<'a, M: RawMutex, B: I2c> core::fmt::Debug for PowerMcuClient<'a, M, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PowerMcuClient")
            .field("camera_state", &self.camera_state)
            .finish_non_exhaustive()
    }
}

impl<'a, M: RawMutex, B: I2c> PowerMcuClient<'a, M, B> {
    /// Establishes communication by probing the firmware version register.
    ///
    /// Failed probes are retried on a fixed delay until the budget runs out.
    /// A mismatched firmware revision is logged, not fatal.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] after exactly the budgeted number of
    /// failed attempts.
    pub async fn connect(
        bus: &'a SharedBus<M, B>,
        budget: RetryBudget,
        retry_delay: Duration,
    ) -> Result<Self, ConnectionError> {
        if budget == RetryBudget::Attempts(0) {
            return Err(ConnectionError { attempts: 0 });
        }

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let probe = {
                let mut guard = bus.lock().await;
                bus::read_byte(&mut *guard, MCU_ADDRESS, REG_VERSION)
            };
            match probe {
                Ok(version) => {
                    if version != EXPECTED_FIRMWARE_VERSION {
                        warn!(
                            "power mcu firmware {version:#04x} differs from expected {EXPECTED_FIRMWARE_VERSION:#04x}"
                        );
                    }
                    info!("connected to power mcu after {attempts} attempt(s)");
                    return Ok(Self {
                        bus,
                        camera_state: None,
                    });
                }
                Err(err) => {
                    warn!("power mcu probe attempt {attempts} failed: {err}");
                    if let RetryBudget::Attempts(max) = budget
                        && attempts >= max
                    {
                        return Err(ConnectionError { attempts });
                    }
                    Timer::after(retry_delay).await;
                }
            }
        }
    }

    /// Last camera state observed by [`Self::read_camera_state`].
    #[must_use]
    pub const fn camera_state(&self) -> Option<CameraState> {
        self.camera_state
    }

    /// Writes the keep-alive value the MCU's watchdog timer expects.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the write fails; callers on the keep-alive
    /// path log and continue rather than abort.
    pub async fn ping_watchdog(&self) -> Result<(), BusError> {
        let mut guard = self.bus.lock().await;
        bus::write_byte(&mut *guard, MCU_ADDRESS, REG_KEEP_ALIVE, KEEP_ALIVE_VALUE)
    }

    /// Reads the camera power state, refreshing the cached copy.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the transaction fails.
    pub async fn read_camera_state(&mut self) -> Result<CameraState, DeviceError> {
        let raw = {
            let mut guard = self.bus.lock().await;
            bus::read_byte(&mut *guard, MCU_ADDRESS, REG_CAMERA_STATE)
        }
        .map_err(|cause| DeviceError::bus(Device::PowerMcu, "read-camera-state", cause))?;
        let state = CameraState::from(raw);
        self.camera_state = Some(state);
        Ok(state)
    }

    /// Announces that host power is about to go away.
    ///
    /// This only feeds the MCU's own state machine; the MCU applies its own
    /// delay before actually cutting camera power.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the transaction fails.
    pub async fn powering_off(&self) -> Result<(), DeviceError> {
        let mut guard = self.bus.lock().await;
        bus::write_byte(&mut *guard, MCU_ADDRESS, REG_POWER_CTRL, POWER_CTRL_HOST_OFF)
            .map_err(|cause| DeviceError::bus(Device::PowerMcu, "powering-off", cause))
    }
}
