//! In-memory register bus used by the unit tests.
//!
//! Two banks model the power MCU and the RTC behind their bus addresses.
//! Writes are journaled per byte so tests can assert ordering and counts, and
//! a failure budget lets retry paths be exercised deterministically.

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use heapless::Vec;

use crate::mcu::MCU_ADDRESS;
use crate::rtc::RTC_ADDRESS;

/// Registers modeled per device bank.
pub const FAKE_REG_SPACE: usize = 32;

/// Maximum journaled writes per test.
pub const FAKE_JOURNAL_DEPTH: usize = 128;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FakeBusError(pub ErrorKind);

impl i2c::Error for FakeBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

pub struct FakeBus {
    pub mcu: [u8; FAKE_REG_SPACE],
    pub rtc: [u8; FAKE_REG_SPACE],
    /// `(address, register, value)` per written byte, in bus order.
    pub writes: Vec<(u8, u8, u8), FAKE_JOURNAL_DEPTH>,
    /// Number of upcoming transactions that fail before traffic recovers.
    pub failures_remaining: u32,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            mcu: [0; FAKE_REG_SPACE],
            rtc: [0; FAKE_REG_SPACE],
            writes: Vec::new(),
            failures_remaining: 0,
        }
    }

    /// Counts journaled writes that hit `register` on `address`.
    pub fn writes_to(&self, address: u8, register: u8) -> usize {
        self.writes
            .iter()
            .filter(|(a, r, _)| *a == address && *r == register)
            .count()
    }

    fn bank(&mut self, address: u8) -> Option<&mut [u8; FAKE_REG_SPACE]> {
        match address {
            MCU_ADDRESS => Some(&mut self.mcu),
            RTC_ADDRESS => Some(&mut self.rtc),
            _ => None,
        }
    }
}

impl ErrorType for FakeBus {
    type Error = FakeBusError;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(FakeBusError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }
        if self.bank(address).is_none() {
            return Err(FakeBusError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }

        let mut cursor: u8 = 0;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    let Some((register, payload)) = bytes.split_first() else {
                        continue;
                    };
                    cursor = *register;
                    for (offset, value) in payload.iter().enumerate() {
                        let register = cursor.wrapping_add(offset as u8);
                        let bank = self.bank(address).unwrap();
                        bank[usize::from(register) % FAKE_REG_SPACE] = *value;
                        let _ = self.writes.push((address, register, *value));
                    }
                }
                Operation::Read(buf) => {
                    for (offset, slot) in buf.iter_mut().enumerate() {
                        let register = cursor.wrapping_add(offset as u8);
                        let bank = self.bank(address).unwrap();
                        *slot = bank[usize::from(register) % FAKE_REG_SPACE];
                    }
                }
            }
        }
        Ok(())
    }
}
