//! Interrupt-driven USART on top of two circular buffers
//!
//! The main loop only ever touches the queues; the data register is fed by
//! the UDRE interrupt and drained by the RX interrupt. Both ends run inside
//! short critical sections around a single queue operation.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::config::{SerialConfig, RX_BUFFER_LEN, TX_BUFFER_LEN};
use crate::hal::ring_buffer::CircularBuffer;

/// Register-level access to a USART block
pub trait UsartRegisters {
    fn write_data(&mut self, byte: u8);
    fn read_data(&mut self) -> u8;
    /// Gate the "data register empty" interrupt
    fn set_tx_interrupt(&mut self, enabled: bool);
}

pub struct SerialPort<U> {
    usart: U,
    tx: CircularBuffer<u8, TX_BUFFER_LEN>,
    rx: CircularBuffer<u8, RX_BUFFER_LEN>,
}

impl<U: UsartRegisters> SerialPort<U> {
    pub fn new(mut usart: U) -> Self {
        usart.set_tx_interrupt(false);
        Self {
            usart,
            tx: CircularBuffer::new(),
            rx: CircularBuffer::new(),
        }
    }

    /// Queue one byte. When the queue is full the oldest pending byte is lost.
    pub fn write_byte(&mut self, byte: u8) {
        self.tx.push(byte);
        self.usart.set_tx_interrupt(true);
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.tx.push(byte);
        }
        self.usart.set_tx_interrupt(true);
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    pub fn pending_tx(&self) -> usize {
        self.tx.len()
    }

    /// RX complete interrupt body
    pub fn on_receive(&mut self) {
        let byte = self.usart.read_data();
        self.rx.push(byte);
    }

    /// Data register empty interrupt body. Switches itself off once the
    /// queue runs dry.
    pub fn on_data_register_empty(&mut self) {
        match self.tx.pop() {
            Some(byte) => self.usart.write_data(byte),
            None => self.usart.set_tx_interrupt(false),
        }
    }
}

/// A serial port shared between the main loop and its interrupts
pub type SharedSerial<U> = Mutex<RefCell<Option<SerialPort<U>>>>;

/// Take the oldest received byte from a shared port, if it exists yet
pub fn receive<U: UsartRegisters>(port: &SharedSerial<U>) -> Option<u8> {
    critical_section::with(|cs| port.borrow_ref_mut(cs).as_mut().and_then(SerialPort::read_byte))
}

/// `ufmt` sink writing through a shared port, one byte per critical section
pub struct SerialWriter<U: 'static> {
    port: &'static SharedSerial<U>,
}

impl<U: UsartRegisters> SerialWriter<U> {
    pub fn new(port: &'static SharedSerial<U>) -> Self {
        Self { port }
    }
}

impl<U: UsartRegisters> ufmt::uWrite for SerialWriter<U> {
    type Error = core::convert::Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        for byte in s.bytes() {
            critical_section::with(|cs| {
                if let Some(port) = self.port.borrow_ref_mut(cs).as_mut() {
                    port.write_byte(byte);
                }
            });
        }
        Ok(())
    }
}

#[cfg(target_arch = "avr")]
pub use avr::configure;

#[cfg(target_arch = "avr")]
mod avr {
    use super::{SerialConfig, UsartRegisters};
    use avr_device::atmega328p::USART0;

    // UCSR0B bits
    const RXCIE0: u8 = 1 << 7;
    const UDRIE0: u8 = 1 << 5;
    const RXEN0: u8 = 1 << 4;
    const TXEN0: u8 = 1 << 3;
    const UCSZ02: u8 = 1 << 2;

    /// Program baud rate and frame format, enable both directions and the
    /// RX interrupt.
    pub fn configure(usart: &USART0, config: &SerialConfig) {
        let (ucsr0c, nine_bit) = config.frame_bits();
        usart.ubrr0.write(|w| unsafe { w.bits(config.ubrr()) });
        usart.ucsr0c.write(|w| unsafe { w.bits(ucsr0c) });
        let ucsz2 = if nine_bit { UCSZ02 } else { 0 };
        usart
            .ucsr0b
            .write(|w| unsafe { w.bits(RXEN0 | TXEN0 | RXCIE0 | ucsz2) });
    }

    impl UsartRegisters for USART0 {
        #[inline]
        fn write_data(&mut self, byte: u8) {
            self.udr0.write(|w| unsafe { w.bits(byte) });
        }

        #[inline]
        fn read_data(&mut self) -> u8 {
            self.udr0.read().bits()
        }

        #[inline]
        fn set_tx_interrupt(&mut self, enabled: bool) {
            self.ucsr0b.modify(|r, w| unsafe {
                if enabled {
                    w.bits(r.bits() | UDRIE0)
                } else {
                    w.bits(r.bits() & !UDRIE0)
                }
            });
        }
    }
}
