//! Timer/Counter blocks: the keypad debounce tick and busy-wait delays
//!
//! TC0 is a one-shot tick: stopped at rest, started by the pin-change
//! interrupt, its overflow runs the keypad scan. At 16 MHz / 64 the counter
//! overflows after 256 * 4 us, a bit over 1 ms.
//!
//! TC2 runs free at 16 MHz / 8 (two ticks per microsecond) and is never
//! written after start-up, so any number of `Delay` copies, including the
//! ones used inside interrupts, can measure elapsed time from it at once.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Prescaler {
    Stop = 0,
    Direct = 1,
    Div8 = 2,
    Div64 = 3,
    Div256 = 4,
    Div1024 = 5,
}

/// TC0 prescaler for the debounce tick
pub const TICK_PRESCALER: Prescaler = Prescaler::Div64;

/// TC2 counts per microsecond with `Prescaler::Div8`
pub const DELAY_TICKS_PER_US: u16 = 2;

/// Longest wait measured in one pass of the 8-bit counter
pub const DELAY_CHUNK_US: u16 = 100;

#[cfg(target_arch = "avr")]
pub use avr::{Delay, TickTimer};

#[cfg(target_arch = "avr")]
mod avr {
    use super::{Prescaler, DELAY_CHUNK_US, DELAY_TICKS_PER_US, TICK_PRESCALER};
    use crate::drivers::keypad::TickSource;
    use avr_device::atmega328p::{TC0, TC2};
    use embedded_hal::blocking::delay::{DelayMs, DelayUs};

    // TIMSK0
    const TOIE0: u8 = 1 << 0;
    // TIFR0
    const TOV0: u8 = 1 << 0;

    pub struct TickTimer {
        tc0: TC0,
    }

    impl TickTimer {
        /// Normal mode, stopped, overflow interrupt enabled
        pub fn new(tc0: TC0) -> Self {
            tc0.tccr0a.write(|w| unsafe { w.bits(0) });
            tc0.tccr0b.write(|w| unsafe { w.bits(Prescaler::Stop as u8) });
            tc0.tcnt0.write(|w| unsafe { w.bits(0) });
            tc0.tifr0.write(|w| unsafe { w.bits(TOV0) });
            tc0.timsk0.write(|w| unsafe { w.bits(TOIE0) });
            Self { tc0 }
        }
    }

    impl TickSource for TickTimer {
        fn arm(&mut self) {
            self.tc0.tccr0b.write(|w| unsafe { w.bits(TICK_PRESCALER as u8) });
        }

        fn disarm(&mut self) {
            self.tc0.tccr0b.write(|w| unsafe { w.bits(Prescaler::Stop as u8) });
            self.tc0.tcnt0.write(|w| unsafe { w.bits(0) });
        }
    }

    /// Busy-wait delay reading the free-running TC2
    #[derive(Clone, Copy)]
    pub struct Delay {
        _private: (),
    }

    impl Delay {
        /// Start TC2 free-running. Consumes the peripheral so nothing else
        /// reprograms it.
        pub fn start(tc2: TC2) -> Self {
            tc2.tccr2a.write(|w| unsafe { w.bits(0) });
            tc2.tccr2b.write(|w| unsafe { w.bits(Prescaler::Div8 as u8) });
            Self { _private: () }
        }

        #[inline]
        fn counter() -> u8 {
            // SAFETY: read-only access to a register nobody writes after
            // `start`
            unsafe { (*TC2::ptr()).tcnt2.read().bits() }
        }

        fn wait_chunk(us: u16) {
            let ticks = (us * DELAY_TICKS_PER_US) as u8;
            let start = Self::counter();
            while Self::counter().wrapping_sub(start) < ticks {}
        }
    }

    impl DelayUs<u16> for Delay {
        fn delay_us(&mut self, mut us: u16) {
            while us > DELAY_CHUNK_US {
                Self::wait_chunk(DELAY_CHUNK_US);
                us -= DELAY_CHUNK_US;
            }
            Self::wait_chunk(us);
        }
    }

    impl DelayMs<u16> for Delay {
        fn delay_ms(&mut self, ms: u16) {
            for _ in 0..ms {
                self.delay_us(1_000);
            }
        }
    }

    impl DelayMs<u8> for Delay {
        fn delay_ms(&mut self, ms: u8) {
            DelayMs::<u16>::delay_ms(self, u16::from(ms));
        }
    }
}
