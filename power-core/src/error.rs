//! Error taxonomy shared by every subsystem in the crate.
//!
//! Transport failures surface as [`BusError`], semantic failures of an RTC or
//! power-MCU operation as [`DeviceError`], an exhausted connect budget as
//! [`ConnectionError`], and a failed host power-off as [`ShutdownError`]. The
//! orchestrator folds all of them into [`CycleError`].

use core::fmt;

use embedded_hal::i2c::ErrorKind;
use heapless::String;

/// Maximum retained length for power-off command diagnostics.
pub const MAX_SHUTDOWN_OUTPUT: usize = 192;

/// Maximum retained length for a shutdown failure cause.
pub const MAX_SHUTDOWN_CAUSE: usize = 96;

/// Transport-level failure of a single register transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusError {
    /// Register the transaction addressed.
    pub register: u8,
    /// Transport error category reported by the bus implementation.
    pub cause: ErrorKind,
}

impl BusError {
    /// Creates a new transport error for the given register.
    #[must_use]
    pub const fn new(register: u8, cause: ErrorKind) -> Self {
        Self { register, cause }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus transaction on register {:#04x} failed: {}",
            self.register, self.cause
        )
    }
}

/// Device addressed by a failed operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Device {
    Rtc,
    PowerMcu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Rtc => f.write_str("rtc"),
            Device::PowerMcu => f.write_str("power-mcu"),
        }
    }
}

/// Underlying reason a device operation failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceErrorCause {
    /// The register transaction itself failed.
    Bus(BusError),
    /// The device answered with bytes that decode to an impossible value.
    InvalidData,
}

impl fmt::Display for DeviceErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceErrorCause::Bus(err) => write!(f, "{err}"),
            DeviceErrorCause::InvalidData => f.write_str("invalid data"),
        }
    }
}

/// Semantic failure of an RTC or power-MCU operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceError {
    /// Device the operation addressed.
    pub device: Device,
    /// Operation name, stable for log correlation.
    pub operation: &'static str,
    /// What went wrong underneath.
    pub cause: DeviceErrorCause,
}

impl DeviceError {
    /// Wraps a transport failure observed while running `operation`.
    #[must_use]
    pub const fn bus(device: Device, operation: &'static str, cause: BusError) -> Self {
        Self {
            device,
            operation,
            cause: DeviceErrorCause::Bus(cause),
        }
    }

    /// Marks `operation` as having decoded impossible data.
    #[must_use]
    pub const fn invalid_data(device: Device, operation: &'static str) -> Self {
        Self {
            device,
            operation,
            cause: DeviceErrorCause::InvalidData,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failed: {}", self.device, self.operation, self.cause)
    }
}

/// Connect retry budget exhausted without a successful probe.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConnectionError {
    /// Probe attempts made before giving up.
    pub attempts: u32,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "power mcu did not answer after {} probe attempt(s)",
            self.attempts
        )
    }
}

/// Host power-off command failure with captured diagnostics.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShutdownError {
    /// Why the command failed.
    pub cause: String<MAX_SHUTDOWN_CAUSE>,
    /// Combined command output, truncated to the retained maximum.
    pub output: String<MAX_SHUTDOWN_OUTPUT>,
}

impl ShutdownError {
    /// Captures a shutdown failure, truncating overlong diagnostics.
    #[must_use]
    pub fn new(cause: &str, output: &str) -> Self {
        Self {
            cause: bounded(cause),
            output: bounded(output),
        }
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "power-off command failed: {}", self.cause)?;
        if !self.output.is_empty() {
            write!(f, "\n{}", self.output)?;
        }
        Ok(())
    }
}

fn bounded<const N: usize>(input: &str) -> String<N> {
    let mut out = String::new();
    for ch in input.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Any failure that terminates a power cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CycleError {
    Bus(BusError),
    Device(DeviceError),
    Connect(ConnectionError),
    Shutdown(ShutdownError),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::Bus(err) => write!(f, "{err}"),
            CycleError::Device(err) => write!(f, "{err}"),
            CycleError::Connect(err) => write!(f, "{err}"),
            CycleError::Shutdown(err) => write!(f, "{err}"),
        }
    }
}

impl From<BusError> for CycleError {
    fn from(value: BusError) -> Self {
        CycleError::Bus(value)
    }
}

impl From<DeviceError> for CycleError {
    fn from(value: DeviceError) -> Self {
        CycleError::Device(value)
    }
}

impl From<ConnectionError> for CycleError {
    fn from(value: ConnectionError) -> Self {
        CycleError::Connect(value)
    }
}

impl From<ShutdownError> for CycleError {
    fn from(value: ShutdownError) -> Self {
        CycleError::Shutdown(value)
    }
}
