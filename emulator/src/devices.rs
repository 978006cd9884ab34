//! Register-level simulations of the power MCU and the RTC.
//!
//! Faithful enough to drive a whole power cycle: the RTC serves live BCD
//! time, the MCU walks its camera state machine once the power-off command
//! lands, and every written byte is journaled for the end-of-run summary.

use chrono::{Datelike, Timelike, Utc};
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use power_core::bus::to_bcd;
use power_core::mcu::{
    EXPECTED_FIRMWARE_VERSION, MCU_ADDRESS, REG_CAMERA_STATE, REG_POWER_CTRL, REG_VERSION,
};
use power_core::rtc::{REG_SECONDS, RTC_ADDRESS};

const REG_SPACE: usize = 32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SimBusError(pub ErrorKind);

impl i2c::Error for SimBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

pub struct SimBus {
    mcu: [u8; REG_SPACE],
    rtc: [u8; REG_SPACE],
    /// `(address, register, value)` per written byte, in bus order.
    writes: Vec<(u8, u8, u8)>,
    /// Camera-state reads served since the power-off command arrived.
    reads_since_power_off: Option<u32>,
}

impl SimBus {
    pub fn new() -> Self {
        let mut mcu = [0u8; REG_SPACE];
        mcu[usize::from(REG_VERSION)] = EXPECTED_FIRMWARE_VERSION;
        mcu[usize::from(REG_CAMERA_STATE)] = 0x01; // powered-on
        Self {
            mcu,
            rtc: [0u8; REG_SPACE],
            writes: Vec::new(),
            reads_since_power_off: None,
        }
    }

    pub fn writes_to(&self, address: u8, register: u8) -> usize {
        self.writes
            .iter()
            .filter(|(a, r, _)| *a == address && *r == register)
            .count()
    }

    /// Mirrors the wall clock into the BCD time block.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn refresh_time_block(&mut self) {
        let now = Utc::now();
        let base = usize::from(REG_SECONDS);
        self.rtc[base] = to_bcd(now.second() as u8);
        self.rtc[base + 1] = to_bcd(now.minute() as u8);
        self.rtc[base + 2] = to_bcd(now.hour() as u8);
        self.rtc[base + 3] = to_bcd(now.day() as u8);
        self.rtc[base + 4] = now.weekday().num_days_from_sunday() as u8;
        self.rtc[base + 5] = to_bcd(now.month() as u8);
        self.rtc[base + 6] = to_bcd((now.year() % 100) as u8);
    }

    fn store(&mut self, address: u8, register: u8, value: u8) {
        match address {
            MCU_ADDRESS => {
                self.mcu[usize::from(register) % REG_SPACE] = value;
                if register == REG_POWER_CTRL {
                    self.mcu[usize::from(REG_CAMERA_STATE)] = 0x02; // powering-off
                    self.reads_since_power_off = Some(0);
                }
            }
            _ => self.rtc[usize::from(register) % REG_SPACE] = value,
        }
        self.writes.push((address, register, value));
    }

    fn load(&mut self, address: u8, register: u8) -> u8 {
        if address == MCU_ADDRESS && register == REG_CAMERA_STATE {
            if let Some(reads) = self.reads_since_power_off.as_mut() {
                *reads += 1;
                if *reads > 2 {
                    self.mcu[usize::from(REG_CAMERA_STATE)] = 0x03; // powered-off
                }
            }
        }
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
    #[allow(clippy::cast_possible_truncation)]
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
                    cursor = *register;
                    let register = *register;
                    for (offset, value) in payload.iter().enumerate() {
                        self.store(address, register.wrapping_add(offset as u8), *value);
                    }
                }
                Operation::Read(buf) => {
                    if address == RTC_ADDRESS && cursor == REG_SECONDS {
                        self.refresh_time_block();
                    }
                    for (offset, slot) in buf.iter_mut().enumerate() {
                        *slot = self.load(address, cursor.wrapping_add(offset as u8));
                    }
                }
            }
        }
        Ok(())
    }
}
