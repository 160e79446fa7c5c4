//! Register-level peripherals of the ATmega328P
//!
//! Protocol logic is written against small register traits so it runs on
//! the host in tests; the trait impls for the real register blocks only
//! exist when building for AVR.

pub mod gpio;
pub mod ring_buffer;
pub mod spi;
pub mod timer;
pub mod twi;
pub mod uart;

pub use ring_buffer::CircularBuffer;
pub use spi::{Mode, Spi, SpiError, SpiMaster, SpiRegisters};
pub use twi::{BusError, TwiMaster, TwiSpeed};
pub use uart::{SerialPort, SerialWriter, SharedSerial};

#[cfg(target_arch = "avr")]
pub use timer::{Delay, TickTimer};
