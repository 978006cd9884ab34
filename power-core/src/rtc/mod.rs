//! Client for the hardware real-time clock's time and wake-alarm registers.
//!
//! The device keeps wall-clock time and a programmable alarm across power
//! loss; every calendar field is stored binary-coded decimal. The alarm flag
//! latches when the programmed time is reached and must be cleared before a
//! new cycle can rely on it, and the interrupt-enable bit is what actually
//! lets a latched alarm wake the unit back up.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::bus::{self, SharedBus};
use crate::error::{Device, DeviceError};

/// Bus address of the real-time clock.
pub const RTC_ADDRESS: u8 = 0x51;

/// Control/status register holding the alarm interrupt and flag bits.
pub const REG_CONTROL_STATUS_2: u8 = 0x01;
/// First register of the seconds..years time block.
pub const REG_SECONDS: u8 = 0x02;
/// First register of the minute/hour/day/weekday alarm block.
pub const REG_MINUTE_ALARM: u8 = 0x09;

/// Alarm-interrupt-enable bit in control/status 2.
pub const AIE_BIT: u8 = 0x02;
/// Latched alarm-fired flag in control/status 2.
pub const AF_BIT: u8 = 0x08;
/// Per-alarm-register disable bit; a set bit makes the field a wildcard.
pub const ALARM_DISABLE_BIT: u8 = 0x80;
/// Low-voltage detector flag in the seconds register.
pub const VL_BIT: u8 = 0x80;

/// Wake alarm fields, each independently BCD-coded on the device.
///
/// Minute and hour select the time of day; day pins the alarm to a date so a
/// wake scheduled past midnight cannot fire a day early.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AlarmTime {
    pub minute: u8,
    pub hour: u8,
    pub day: u8,
}

impl AlarmTime {
    /// Derives the alarm fields from a target wake timestamp.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_datetime(target: &DateTime<Utc>) -> Self {
        Self {
            minute: target.minute() as u8,
            hour: target.hour() as u8,
            day: target.day() as u8,
        }
    }
}

/// Client for the RTC's time and wake-alarm registers.
///
/// Every operation claims the shared bus for the duration of one transaction
/// (a read-modify-write claims it for the pair so another task cannot slip a
/// transaction between the read and the write).
pub struct RtcClient<'a, M: RawMutex, B: I2c> {
    bus: &'a SharedBus<M, B>,
}

impl<'a, M: RawMutex, B: I2c> RtcClient<'a, M, B> {
    /// Creates a client on the shared bus.
    #[must_use]
    pub const fn new(bus: &'a SharedBus<M, B>) -> Self {
        Self { bus }
    }

    /// Reads and decodes the current RTC time.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the transaction fails or the registers
    /// decode to an impossible calendar date.
    pub async fn get_time(&self) -> Result<DateTime<Utc>, DeviceError> {
        const OP: &str = "get-time";
        let mut raw = [0u8; 7];
        {
            let mut guard = self.bus.lock().await;
            bus::read_bytes(&mut *guard, RTC_ADDRESS, REG_SECONDS, &mut raw)
                .map_err(|cause| DeviceError::bus(Device::Rtc, OP, cause))?;
        }
        if raw[0] & VL_BIT != 0 {
            warn!("rtc low-voltage flag is set; stored time may be unreliable");
        }

        let second = bus::from_bcd(raw[0] & 0x7F);
        let minute = bus::from_bcd(raw[1] & 0x7F);
        let hour = bus::from_bcd(raw[2] & 0x3F);
        let day = bus::from_bcd(raw[3] & 0x3F);
        let month = bus::from_bcd(raw[5] & 0x1F);
        let year = 2000 + i32::from(bus::from_bcd(raw[6]));

        let date = NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
            .ok_or(DeviceError::invalid_data(Device::Rtc, OP))?;
        let time = date
            .and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
            .ok_or(DeviceError::invalid_data(Device::Rtc, OP))?;
        Ok(DateTime::from_naive_utc_and_offset(time, Utc))
    }

    /// Writes a full timestamp into the time registers.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the transaction fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub async fn set_time(&self, time: &DateTime<Utc>) -> Result<(), DeviceError> {
        const OP: &str = "set-time";
        info!("writing rtc time {time}");
        let payload = [
            REG_SECONDS,
            bus::to_bcd(time.second() as u8),
            bus::to_bcd(time.minute() as u8),
            bus::to_bcd(time.hour() as u8),
            bus::to_bcd(time.day() as u8),
            time.weekday().num_days_from_sunday() as u8,
            bus::to_bcd(time.month() as u8),
            bus::to_bcd((time.year() % 100) as u8),
        ];
        let mut guard = self.bus.lock().await;
        bus::write_bytes(&mut *guard, RTC_ADDRESS, &payload)
            .map_err(|cause| DeviceError::bus(Device::Rtc, OP, cause))
    }

    /// Programs the wake alarm's minute, hour, and day fields.
    ///
    /// The weekday alarm is written disabled so only the programmed fields
    /// participate in the match.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the transaction fails.
    pub async fn set_alarm_time(&self, alarm: &AlarmTime) -> Result<(), DeviceError> {
        const OP: &str = "set-alarm-time";
        let payload = [
            REG_MINUTE_ALARM,
            bus::to_bcd(alarm.minute),
            bus::to_bcd(alarm.hour),
            bus::to_bcd(alarm.day),
            ALARM_DISABLE_BIT,
        ];
        let mut guard = self.bus.lock().await;
        bus::write_bytes(&mut *guard, RTC_ADDRESS, &payload)
            .map_err(|cause| DeviceError::bus(Device::Rtc, OP, cause))
    }

    /// Flips only the alarm-interrupt-enable bit in the control register.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when either transaction of the
    /// read-modify-write fails.
    pub async fn set_alarm_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        const OP: &str = "set-alarm-enabled";
        let mut guard = self.bus.lock().await;
        let control = bus::read_byte(&mut *guard, RTC_ADDRESS, REG_CONTROL_STATUS_2)
            .map_err(|cause| DeviceError::bus(Device::Rtc, OP, cause))?;
        let updated = if enabled {
            control | AIE_BIT
        } else {
            control & !AIE_BIT
        };
        bus::write_byte(&mut *guard, RTC_ADDRESS, REG_CONTROL_STATUS_2, updated)
            .map_err(|cause| DeviceError::bus(Device::Rtc, OP, cause))
    }

    /// Clears the latched alarm-fired flag, leaving every other bit alone.
    ///
    /// Must run before any alarm-dependent wait begins so a flag left over
    /// from a previous cycle is never mistaken for a fresh trigger.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when either transaction of the
    /// read-modify-write fails.
    pub async fn clear_alarm_flag(&self) -> Result<(), DeviceError> {
        const OP: &str = "clear-alarm-flag";
        let mut guard = self.bus.lock().await;
        let control = bus::read_byte(&mut *guard, RTC_ADDRESS, REG_CONTROL_STATUS_2)
            .map_err(|cause| DeviceError::bus(Device::Rtc, OP, cause))?;
        bus::write_byte(
            &mut *guard,
            RTC_ADDRESS,
            REG_CONTROL_STATUS_2,
            control & !AF_BIT,
        )
        .map_err(|cause| DeviceError::bus(Device::Rtc, OP, cause))
    }
}
