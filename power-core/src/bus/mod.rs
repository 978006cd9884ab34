//! Primitive register transactions and the BCD codec shared by both devices.
//!
//! A write is one atomic transaction carrying the register address followed
//! by payload bytes; a read is one atomic transaction that writes the
//! register address and reads data back. There is no retry logic here:
//! errors report the register and the transport's error kind, and retry
//! policy belongs to the caller.

use embassy_sync::mutex::Mutex;
use embedded_hal::i2c::{Error as _, I2c};

use crate::error::BusError;

/// Mutual exclusion around the single physical bus.
///
/// The power MCU and the RTC share one bus, so interleaved transactions would
/// corrupt framing. The mutex is held for one transaction (or one
/// read-modify-write pair) and never across a timed wait.
pub type SharedBus<M, B> = Mutex<M, B>;

/// Reads one byte from `register`.
///
/// # Errors
///
/// Returns [`BusError`] when the transaction fails.
pub fn read_byte<B: I2c>(bus: &mut B, address: u8, register: u8) -> Result<u8, BusError> {
    let mut data = [0u8; 1];
    bus.write_read(address, &[register], &mut data)
        .map_err(|err| BusError::new(register, err.kind()))?;
    Ok(data[0])
}

/// Reads `buf.len()` bytes starting at `register`.
///
/// # Errors
///
/// Returns [`BusError`] when the transaction fails.
pub fn read_bytes<B: I2c>(
    bus: &mut B,
    address: u8,
    register: u8,
    buf: &mut [u8],
) -> Result<(), BusError> {
    bus.write_read(address, &[register], buf)
        .map_err(|err| BusError::new(register, err.kind()))
}

/// Writes one byte to `register`.
///
/// # Errors
///
/// Returns [`BusError`] when the transaction fails.
pub fn write_byte<B: I2c>(
    bus: &mut B,
    address: u8,
    register: u8,
    value: u8,
) -> Result<(), BusError> {
    bus.write(address, &[register, value])
        .map_err(|err| BusError::new(register, err.kind()))
}

/// Writes a raw payload, the register address leading.
///
/// # Errors
///
/// Returns [`BusError`] when the transaction fails.
pub fn write_bytes<B: I2c>(bus: &mut B, address: u8, bytes: &[u8]) -> Result<(), BusError> {
    let register = bytes.first().copied().unwrap_or_default();
    bus.write(address, bytes)
        .map_err(|err| BusError::new(register, err.kind()))
}

/// Converts a decimal value in `0..=99` to binary-coded decimal.
#[must_use]
pub const fn to_bcd(n: u8) -> u8 {
    (n / 10) << 4 | (n % 10)
}

/// Converts a binary-coded decimal byte back to its decimal value.
#[must_use]
pub const fn from_bcd(b: u8) -> u8 {
    (b >> 4) * 10 + (b & 0x0F)
}
