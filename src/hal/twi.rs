//! TWI (I2C) bus master
//!
//! Start, address, data and stop are framed one step at a time. Each step
//! busy-waits on TWINT, so none of this may be called from an ISR. Waits are
//! bounded and whole write transactions are retried before giving up.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c;

// TWCR bits
const TWINT: u8 = 1 << 7;
const TWEA: u8 = 1 << 6;
const TWSTA: u8 = 1 << 5;
const TWSTO: u8 = 1 << 4;
const TWEN: u8 = 1 << 2;

/// Pause before loading each byte. The PCF8574 misses strobes when bytes
/// arrive back to back, so this stays fixed regardless of bus speed.
pub const INTER_BYTE_DELAY_US: u16 = 100;

/// TWINT polls before a step is declared stuck
pub const TWI_POLL_LIMIT: u16 = 10_000;

/// Attempts of a complete write transaction
pub const TWI_MAX_RETRIES: u8 = 3;

/// TWI speed modes (16 MHz CPU, prescaler 1)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TwiSpeed {
    Standard100k,
    Fast400k,
}

impl TwiSpeed {
    const fn bit_rate(self) -> u8 {
        match self {
            TwiSpeed::Standard100k => 72,
            TwiSpeed::Fast400k => 12,
        }
    }
}

/// TWI status codes (TWSR with prescaler bits masked)
#[derive(Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum TwiStatus {
    StartTransmitted = 0x08,
    RepStartTransmitted = 0x10,
    AddrWriteAck = 0x18,
    AddrWriteNack = 0x20,
    DataWriteAck = 0x28,
    DataWriteNack = 0x30,
    ArbitrationLost = 0x38,
    AddrReadAck = 0x40,
    AddrReadNack = 0x48,
    DataReadAck = 0x50,
    DataReadNack = 0x58,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// TWINT never rose within `TWI_POLL_LIMIT` polls
    Timeout,
    /// No device acknowledged the address byte
    AddressNack,
    /// The device refused a data byte
    DataNack,
    ArbitrationLost,
    /// Any other TWSR value
    UnexpectedStatus(u8),
}

/// Where the master is inside a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusState {
    Idle,
    StartSent,
    ByteInFlight,
    StopSent,
}

/// Register-level access to the TWI block.
///
/// Implemented for the ATmega328P `TWI` peripheral; tests substitute a model.
pub trait TwiRegisters {
    fn write_control(&mut self, bits: u8);
    fn control(&self) -> u8;
    fn status(&self) -> u8;
    fn write_data(&mut self, byte: u8);
    fn data(&self) -> u8;
    fn write_bit_rate(&mut self, twbr: u8);
}

pub struct TwiMaster<R, D> {
    regs: R,
    delay: D,
    state: BusState,
}

impl<R, D> TwiMaster<R, D>
where
    R: TwiRegisters,
    D: DelayUs<u16>,
{
    /// Take ownership of the register block and enable the module.
    pub fn new(mut regs: R, delay: D, speed: TwiSpeed) -> Self {
        regs.write_bit_rate(speed.bit_rate());
        regs.write_control(TWEN);
        Self {
            regs,
            delay,
            state: BusState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Hand back the register block and delay provider.
    pub fn free(self) -> (R, D) {
        (self.regs, self.delay)
    }

    fn wait_for_complete(&mut self) -> Result<(), BusError> {
        for _ in 0..TWI_POLL_LIMIT {
            if self.regs.control() & TWINT != 0 {
                return Ok(());
            }
        }
        Err(BusError::Timeout)
    }

    #[inline]
    fn status_code(&self) -> u8 {
        self.regs.status() & 0xF8
    }

    pub fn send_start(&mut self) -> Result<(), BusError> {
        self.regs.write_control(TWINT | TWSTA | TWEN);
        self.wait_for_complete()?;

        match self.status_code() {
            s if s == TwiStatus::StartTransmitted as u8 || s == TwiStatus::RepStartTransmitted as u8 => {
                self.state = BusState::StartSent;
                Ok(())
            }
            s if s == TwiStatus::ArbitrationLost as u8 => Err(BusError::ArbitrationLost),
            s => Err(BusError::UnexpectedStatus(s)),
        }
    }

    pub fn send_stop(&mut self) -> Result<(), BusError> {
        self.regs.write_control(TWINT | TWSTO | TWEN);
        self.state = BusState::StopSent;

        // TWSTO clears itself once the stop condition is on the wire
        for _ in 0..TWI_POLL_LIMIT {
            if self.regs.control() & TWSTO == 0 {
                self.state = BusState::Idle;
                return Ok(());
            }
        }
        Err(BusError::Timeout)
    }

    /// Shift out one byte (address or data) and check the acknowledgement.
    pub fn tx_byte(&mut self, data: u8) -> Result<(), BusError> {
        self.delay.delay_us(INTER_BYTE_DELAY_US);
        self.regs.write_data(data);
        self.regs.write_control(TWINT | TWEN);
        self.state = BusState::ByteInFlight;
        self.wait_for_complete()?;

        match self.status_code() {
            s if s == TwiStatus::AddrWriteAck as u8
                || s == TwiStatus::AddrReadAck as u8
                || s == TwiStatus::DataWriteAck as u8 =>
            {
                Ok(())
            }
            s if s == TwiStatus::AddrWriteNack as u8 || s == TwiStatus::AddrReadNack as u8 => {
                Err(BusError::AddressNack)
            }
            s if s == TwiStatus::DataWriteNack as u8 => Err(BusError::DataNack),
            s if s == TwiStatus::ArbitrationLost as u8 => Err(BusError::ArbitrationLost),
            s => Err(BusError::UnexpectedStatus(s)),
        }
    }

    /// Clock in one byte, answering with ACK (more to come) or NACK (last).
    pub fn rx_byte(&mut self, ack: bool) -> Result<u8, BusError> {
        let ea = if ack { TWEA } else { 0 };
        self.regs.write_control(TWINT | TWEN | ea);
        self.state = BusState::ByteInFlight;
        self.wait_for_complete()?;

        match self.status_code() {
            s if s == TwiStatus::DataReadAck as u8 || s == TwiStatus::DataReadNack as u8 => {
                Ok(self.regs.data())
            }
            s if s == TwiStatus::ArbitrationLost as u8 => Err(BusError::ArbitrationLost),
            s => Err(BusError::UnexpectedStatus(s)),
        }
    }

    /// Switch the module off, letting SDA and SCL float.
    pub fn release_bus(&mut self) {
        self.regs.write_control(0);
        self.state = BusState::Idle;
    }

    /// Best effort cleanup after a failed step.
    fn abort(&mut self) {
        // a stuck stop is no worse than the failure being reported
        let _ = self.send_stop();
        self.release_bus();
    }

    fn try_write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.send_start()?;
        self.tx_byte(address << 1)?;
        for &byte in bytes {
            self.tx_byte(byte)?;
        }
        self.send_stop()
    }

    /// START, SLA+W, `bytes`, STOP; retried up to `TWI_MAX_RETRIES` times.
    pub fn write_transaction(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        let mut last = BusError::Timeout;
        for _ in 0..TWI_MAX_RETRIES {
            match self.try_write(address, bytes) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    last = err;
                    self.abort();
                }
            }
        }
        Err(last)
    }

    fn try_read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        self.send_start()?;
        self.tx_byte((address << 1) | 1)?;
        let last = buffer.len().saturating_sub(1);
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = self.rx_byte(i < last)?;
        }
        self.send_stop()
    }

    /// START, SLA+R, fill `buffer`, STOP. Reads are not retried.
    pub fn read_transaction(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        self.try_read(address, buffer).map_err(|err| {
            self.abort();
            err
        })
    }
}

impl<R, D> i2c::Write for TwiMaster<R, D>
where
    R: TwiRegisters,
    D: DelayUs<u16>,
{
    type Error = BusError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_transaction(address, bytes)
    }
}

impl<R, D> i2c::Read for TwiMaster<R, D>
where
    R: TwiRegisters,
    D: DelayUs<u16>,
{
    type Error = BusError;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.read_transaction(address, buffer)
    }
}

#[cfg(target_arch = "avr")]
mod avr {
    use super::TwiRegisters;
    use avr_device::atmega328p::TWI;

    impl TwiRegisters for TWI {
        #[inline]
        fn write_control(&mut self, bits: u8) {
            self.twcr.write(|w| unsafe { w.bits(bits) });
        }

        #[inline]
        fn control(&self) -> u8 {
            self.twcr.read().bits()
        }

        #[inline]
        fn status(&self) -> u8 {
            self.twsr.read().bits()
        }

        #[inline]
        fn write_data(&mut self, byte: u8) {
            self.twdr.write(|w| unsafe { w.bits(byte) });
        }

        #[inline]
        fn data(&self) -> u8 {
            self.twdr.read().bits()
        }

        fn write_bit_rate(&mut self, twbr: u8) {
            self.twbr.write(|w| unsafe { w.bits(twbr) });
            // prescaler 1
            self.twsr.write(|w| unsafe { w.bits(0) });
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Behavioural model of the TWI block and a single slave device.

    use super::*;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Default)]
    pub struct FakeTwi {
        control: u8,
        status: u8,
        data: u8,
        bit_rate: u8,
        pending_tx: bool,
        address_phase: bool,
        /// Slave acknowledges its address
        pub ack_address: bool,
        /// Slave acknowledges data bytes
        pub ack_data: bool,
        /// TWINT never rises
        pub stuck: bool,
        pub starts: usize,
        pub stops: usize,
        pub sent: Vec<u8>,
        pub to_read: VecDeque<u8>,
    }

    impl FakeTwi {
        pub fn responsive() -> Self {
            Self {
                ack_address: true,
                ack_data: true,
                ..Self::default()
            }
        }

        pub fn bit_rate(&self) -> u8 {
            self.bit_rate
        }
    }

    impl TwiRegisters for FakeTwi {
        fn write_control(&mut self, bits: u8) {
            self.control = bits & !TWINT;
            if self.stuck || bits & TWINT == 0 {
                return;
            }

            if bits & TWSTA != 0 {
                self.starts += 1;
                self.status = TwiStatus::StartTransmitted as u8;
                self.address_phase = true;
            } else if bits & TWSTO != 0 {
                self.stops += 1;
                self.status = 0xF8;
                // stop finishes immediately
                self.control &= !TWSTO;
                return;
            } else if self.pending_tx {
                self.pending_tx = false;
                self.sent.push(self.data);
                self.status = if self.address_phase {
                    self.address_phase = false;
                    match (self.data & 1 == 1, self.ack_address) {
                        (false, true) => TwiStatus::AddrWriteAck as u8,
                        (false, false) => TwiStatus::AddrWriteNack as u8,
                        (true, true) => TwiStatus::AddrReadAck as u8,
                        (true, false) => TwiStatus::AddrReadNack as u8,
                    }
                } else if self.ack_data {
                    TwiStatus::DataWriteAck as u8
                } else {
                    TwiStatus::DataWriteNack as u8
                };
            } else {
                self.data = self.to_read.pop_front().unwrap_or(0xFF);
                self.status = if bits & TWEA != 0 {
                    TwiStatus::DataReadAck as u8
                } else {
                    TwiStatus::DataReadNack as u8
                };
            }
            self.control |= TWINT;
        }

        fn control(&self) -> u8 {
            self.control
        }

        fn status(&self) -> u8 {
            self.status
        }

        fn write_data(&mut self, byte: u8) {
            self.data = byte;
            self.pending_tx = true;
        }

        fn data(&self) -> u8 {
            self.data
        }

        fn write_bit_rate(&mut self, twbr: u8) {
            self.bit_rate = twbr;
        }
    }
}
