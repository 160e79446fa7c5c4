//! SPI (Serial Peripheral Interface) master
//!
//! `SpiMaster` adds the panel's data/command line on top of any
//! `FullDuplex<u8>` bus, normally [`Spi`]. Chip select is left to the
//! caller so that several bytes can share one selection.

use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;
use embedded_hal::spi::FullDuplex;

/// Completion polls before a transfer is declared stuck
pub const SPI_POLL_LIMIT: u16 = 1_000;

/// Level of the data/command line during a transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// D/C low
    Command,
    /// D/C high
    Data,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiError {
    Timeout,
    /// The bus reported an error (overrun, mode fault)
    Bus,
    /// Driving the data/command line failed
    Pin,
}

pub struct SpiMaster<S, DC> {
    spi: S,
    dc: DC,
}

impl<S, DC> SpiMaster<S, DC>
where
    S: FullDuplex<u8>,
    DC: OutputPin,
{
    pub fn new(spi: S, dc: DC) -> Self {
        Self { spi, dc }
    }

    pub fn free(self) -> (S, DC) {
        (self.spi, self.dc)
    }

    /// Exchange one byte with D/C set for `mode`.
    pub fn transfer(&mut self, byte: u8, mode: Mode) -> Result<u8, SpiError> {
        match mode {
            Mode::Command => self.dc.set_low(),
            Mode::Data => self.dc.set_high(),
        }
        .map_err(|_| SpiError::Pin)?;

        poll(|| self.spi.send(byte))?;
        poll(|| self.spi.read())
    }

    pub fn write(&mut self, bytes: &[u8], mode: Mode) -> Result<(), SpiError> {
        for &byte in bytes {
            self.transfer(byte, mode)?;
        }
        Ok(())
    }

    /// Clock in one byte by sending 0xFF.
    pub fn read(&mut self) -> Result<u8, SpiError> {
        poll(|| self.spi.send(0xFF))?;
        poll(|| self.spi.read())
    }
}

fn poll<T, E>(mut op: impl FnMut() -> nb::Result<T, E>) -> Result<T, SpiError> {
    for _ in 0..SPI_POLL_LIMIT {
        match op() {
            Ok(value) => return Ok(value),
            Err(nb::Error::WouldBlock) => continue,
            Err(nb::Error::Other(_)) => return Err(SpiError::Bus),
        }
    }
    Err(SpiError::Timeout)
}

// SPSR
const SPIF: u8 = 1 << 7;

/// Status and data registers of the SPI block, so the byte-level logic in
/// [`Spi`] can run against a fake on the host.
pub trait SpiRegisters {
    /// Master mode 0, MSB first, fastest clock
    fn enable(&mut self);
    fn status(&self) -> u8;
    /// Reading SPDR after SPIF is set clears SPIF
    fn data(&mut self) -> u8;
    fn write_data(&mut self, byte: u8);
}

/// `FullDuplex` over the SPI block. One byte is in flight at a time.
pub struct Spi<R> {
    regs: R,
    in_flight: bool,
}

impl<R: SpiRegisters> Spi<R> {
    /// Enable master mode. SCK, MOSI and SS must already be outputs.
    pub fn new(mut regs: R) -> Self {
        regs.enable();
        Self {
            regs,
            in_flight: false,
        }
    }

    pub fn free(self) -> R {
        self.regs
    }

    fn complete(&self) -> bool {
        self.regs.status() & SPIF != 0
    }
}

impl<R: SpiRegisters> FullDuplex<u8> for Spi<R> {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Infallible> {
        if !self.complete() {
            return Err(nb::Error::WouldBlock);
        }
        self.in_flight = false;
        Ok(self.regs.data())
    }

    fn send(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        if self.in_flight {
            if !self.complete() {
                return Err(nb::Error::WouldBlock);
            }
            // a transfer whose reader gave up; drop its byte
            let _ = self.regs.data();
            self.in_flight = false;
        }
        self.regs.write_data(byte);
        self.in_flight = true;
        Ok(())
    }
}

#[cfg(target_arch = "avr")]
mod avr {
    use super::SpiRegisters;
    use avr_device::atmega328p::SPI;

    // SPCR
    const SPE: u8 = 1 << 6;
    const MSTR: u8 = 1 << 4;
    // SPSR
    const SPI2X: u8 = 1 << 0;

    impl SpiRegisters for SPI {
        /// Fosc/2, 8 MHz
        fn enable(&mut self) {
            self.spcr.write(|w| unsafe { w.bits(SPE | MSTR) });
            self.spsr.write(|w| unsafe { w.bits(SPI2X) });
        }

        fn status(&self) -> u8 {
            self.spsr.read().bits()
        }

        fn data(&mut self) -> u8 {
            self.spdr.read().bits()
        }

        fn write_data(&mut self, byte: u8) {
            self.spdr.write(|w| unsafe { w.bits(byte) });
        }
    }
}
