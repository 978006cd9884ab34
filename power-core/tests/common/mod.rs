#![allow(dead_code)]

//! Shared fakes for the integration tests: a register-level bus simulation
//! with a write journal, plus collaborator implementations the orchestrator
//! can be wired to.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use power_core::error::ShutdownError;
use power_core::mcu::{EXPECTED_FIRMWARE_VERSION, MCU_ADDRESS, REG_CAMERA_STATE, REG_KEEP_ALIVE, REG_POWER_CTRL, REG_VERSION};
use power_core::orchestrator::{Clock, SystemPower, WindowSchedule};
use power_core::rtc::{REG_SECONDS, RTC_ADDRESS};

pub const REG_SPACE: usize = 32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SimBusError(pub ErrorKind);

impl i2c::Error for SimBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// In-memory power MCU and RTC register banks behind one simulated bus.
///
/// Writing the power-off command flips the simulated camera state to
/// powering-off, mirroring what the real MCU's state machine reports.
pub struct SimBus {
    pub mcu: [u8; REG_SPACE],
    pub rtc: [u8; REG_SPACE],
    /// `(address, register, value)` per written byte, in bus order.
    pub writes: Vec<(u8, u8, u8)>,
    /// Reject keep-alive writes while set, for ping-tolerance tests.
    pub fail_keep_alive: bool,
}

impl SimBus {
    pub fn new() -> Self {
        let mut mcu = [0u8; REG_SPACE];
        mcu[usize::from(REG_VERSION)] = EXPECTED_FIRMWARE_VERSION;
        mcu[usize::from(REG_CAMERA_STATE)] = 0x01; // powered-on

        // 2026-08-06 12:00:00 UTC, BCD-coded.
        let mut rtc = [0u8; REG_SPACE];
        let base = usize::from(REG_SECONDS);
        rtc[base] = 0x00;
        rtc[base + 1] = 0x00;
        rtc[base + 2] = 0x12;
        rtc[base + 3] = 0x06;
        rtc[base + 4] = 0x04;
        rtc[base + 5] = 0x08;
        rtc[base + 6] = 0x26;

        Self {
            mcu,
            rtc,
            writes: Vec::new(),
            fail_keep_alive: false,
        }
    }

    /// Counts journaled writes that hit `register` on `address`.
    pub fn writes_to(&self, address: u8, register: u8) -> usize {
        self.writes
            .iter()
            .filter(|(a, r, _)| *a == address && *r == register)
            .count()
    }

    /// Journal position of the `nth` write to `register` on `address`.
    pub fn write_index(&self, address: u8, register: u8, nth: usize) -> Option<usize> {
        self.writes
            .iter()
            .enumerate()
            .filter(|(_, (a, r, _))| *a == address && *r == register)
            .map(|(index, _)| index)
            .nth(nth)
    }

    fn store(&mut self, address: u8, register: u8, value: u8) {
        match address {
            MCU_ADDRESS => {
                self.mcu[usize::from(register) % REG_SPACE] = value;
                if register == REG_POWER_CTRL {
                    // The MCU acknowledges the power-off intent by walking its
                    // own state machine toward powered-off.
                    self.mcu[usize::from(REG_CAMERA_STATE)] = 0x02;
                }
            }
            _ => self.rtc[usize::from(register) % REG_SPACE] = value,
        }
        self.writes.push((address, register, value));
    }

    fn load(&self, address: u8, register: u8) -> u8 {
        match address {
            MCU_ADDRESS => self.mcu[usize::from(register) % REG_SPACE],
            _ => self.rtc[usize::from(register) % REG_SPACE],
        }
    }
}

impl ErrorType for SimBus {
    type Error = SimBusError;
}

impl I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != MCU_ADDRESS && address != RTC_ADDRESS {
            return Err(SimBusError(ErrorKind::NoAcknowledge(
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
                    if self.fail_keep_alive && address == MCU_ADDRESS && *register == REG_KEEP_ALIVE
                    {
                        return Err(SimBusError(ErrorKind::NoAcknowledge(
                            NoAcknowledgeSource::Data,
                        )));
                    }
                    cursor = *register;
                    let register = *register;
                    for (offset, value) in payload.iter().enumerate() {
                        self.store(address, register.wrapping_add(offset as u8), *value);
                    }
                }
                Operation::Read(buf) => {
                    for (offset, slot) in buf.iter_mut().enumerate() {
                        *slot = self.load(address, cursor.wrapping_add(offset as u8));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Real wall clock; the tests run against short real-time windows.
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Window view with externally controlled boundaries.
pub struct FixedSchedule {
    pub active: Cell<bool>,
    pub next_start: DateTime<Utc>,
    pub next_end: DateTime<Utc>,
}

impl WindowSchedule for FixedSchedule {
    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn next_start(&self) -> DateTime<Utc> {
        self.next_start
    }

    fn next_end(&self) -> DateTime<Utc> {
        self.next_end
    }
}

/// Counts power-off invocations; optionally fails them.
pub struct CountingPower {
    pub calls: Rc<Cell<u32>>,
    pub fail: bool,
}

impl SystemPower for CountingPower {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            Err(ShutdownError::new("exit status 1", "simulated refusal"))
        } else {
            Ok(())
        }
    }
}
