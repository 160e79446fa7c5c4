//! Digital I/O on the ATmega328P ports
//!
//! Single lines are typed pins (`Pin<PORT, N, MODE>`) implementing the
//! `embedded-hal` digital traits. The keypad lines are handled as a group by
//! [`KeypadLines`], which flips rows and columns between input and output
//! during a scan.

/// Active-high row bitmap from raw PIND/PINB values
pub fn decode_rows(pind: u8, pinb: u8) -> u8 {
    let d = !pind;
    let b = !pinb;
    ((d >> 6) & 0b0011) | ((b & 0b0011) << 2)
}

/// Active-high column bitmap from raw PIND/PINC values.
///
/// Primary columns PD2..PD5 land in bits 0..4. The secondary keypad is
/// wired in reverse (PC3 is its first column) and lands in bits 4..8.
pub fn decode_columns(pind: u8, pinc: u8) -> u8 {
    let primary = (!pind >> 2) & 0x0F;
    let c = !pinc;
    let secondary = ((c >> 3) & 1) | (((c >> 2) & 1) << 1) | (((c >> 1) & 1) << 2) | ((c & 1) << 3);
    primary | (secondary << 4)
}

#[cfg(target_arch = "avr")]
pub use avr::{board, Input, KeypadLines, Output, Pin, PullUp};

#[cfg(target_arch = "avr")]
mod avr {
    use super::{decode_columns, decode_rows};
    use crate::config::pins;
    use crate::drivers::keypad::MatrixLines;
    use avr_device::atmega328p::{EXINT, PORTB, PORTC, PORTD};
    use core::convert::Infallible;
    use core::marker::PhantomData;
    use embedded_hal::digital::v2::{InputPin, OutputPin, StatefulOutputPin};

    pub struct Input;
    pub struct PullUp;
    pub struct Output;

    pub struct Pin<PORT, const N: u8, MODE> {
        _port: PhantomData<PORT>,
        _mode: PhantomData<MODE>,
    }

    impl<PORT, const N: u8, MODE> Pin<PORT, N, MODE> {
        const MASK: u8 = 1 << N;

        fn retype<M>() -> Pin<PORT, N, M> {
            Pin {
                _port: PhantomData,
                _mode: PhantomData,
            }
        }
    }

    macro_rules! impl_port {
        ($PORT:ident, $ddr:ident, $port:ident, $pin:ident) => {
            impl<const N: u8, MODE> Pin<$PORT, N, MODE> {
                #[inline]
                fn regs() -> &'static avr_device::atmega328p::$port::RegisterBlock {
                    // SAFETY: the port block is only reached through pins
                    // handed out once by `board::split`; every access is a
                    // read-modify-write of this pin's own bit.
                    unsafe { &*$PORT::ptr() }
                }

                pub fn into_output(self) -> Pin<$PORT, N, Output> {
                    let regs = Self::regs();
                    regs.$ddr.modify(|r, w| unsafe { w.bits(r.bits() | Self::MASK) });
                    Self::retype()
                }

                pub fn into_floating_input(self) -> Pin<$PORT, N, Input> {
                    let regs = Self::regs();
                    regs.$ddr.modify(|r, w| unsafe { w.bits(r.bits() & !Self::MASK) });
                    regs.$port.modify(|r, w| unsafe { w.bits(r.bits() & !Self::MASK) });
                    Self::retype()
                }

                pub fn into_pull_up_input(self) -> Pin<$PORT, N, PullUp> {
                    let regs = Self::regs();
                    regs.$ddr.modify(|r, w| unsafe { w.bits(r.bits() & !Self::MASK) });
                    regs.$port.modify(|r, w| unsafe { w.bits(r.bits() | Self::MASK) });
                    Self::retype()
                }

                fn level(&self) -> bool {
                    Self::regs().$pin.read().bits() & Self::MASK != 0
                }
            }

            impl<const N: u8> OutputPin for Pin<$PORT, N, Output> {
                type Error = Infallible;

                fn set_high(&mut self) -> Result<(), Infallible> {
                    Self::regs()
                        .$port
                        .modify(|r, w| unsafe { w.bits(r.bits() | Self::MASK) });
                    Ok(())
                }

                fn set_low(&mut self) -> Result<(), Infallible> {
                    Self::regs()
                        .$port
                        .modify(|r, w| unsafe { w.bits(r.bits() & !Self::MASK) });
                    Ok(())
                }
            }

            impl<const N: u8> StatefulOutputPin for Pin<$PORT, N, Output> {
                fn is_set_high(&self) -> Result<bool, Infallible> {
                    Ok(Self::regs().$port.read().bits() & Self::MASK != 0)
                }

                fn is_set_low(&self) -> Result<bool, Infallible> {
                    self.is_set_high().map(|high| !high)
                }
            }

            impl<const N: u8> InputPin for Pin<$PORT, N, Input> {
                type Error = Infallible;

                fn is_high(&self) -> Result<bool, Infallible> {
                    Ok(self.level())
                }

                fn is_low(&self) -> Result<bool, Infallible> {
                    Ok(!self.level())
                }
            }

            impl<const N: u8> InputPin for Pin<$PORT, N, PullUp> {
                type Error = Infallible;

                fn is_high(&self) -> Result<bool, Infallible> {
                    Ok(self.level())
                }

                fn is_low(&self) -> Result<bool, Infallible> {
                    Ok(!self.level())
                }
            }
        };
    }

    impl_port!(PORTB, ddrb, portb, pinb);
    impl_port!(PORTC, ddrc, portc, pinc);
    impl_port!(PORTD, ddrd, portd, pind);

    // PCICR / PCIFR: one bit per port group
    const PCIE_ALL: u8 = 0b111;
    // PCMSK0: PB0 PB1, PCMSK1: PC0..PC3, PCMSK2: PD2..PD7
    const PCMSK0_KEYPAD: u8 = pins::ROWS_PORTB;
    const PCMSK1_KEYPAD: u8 = pins::SECONDARY_COLS_PORTC;
    const PCMSK2_KEYPAD: u8 = pins::ROWS_PORTD | pins::PRIMARY_COLS_PORTD;

    /// All keypad lines plus their pin-change interrupt controls
    pub struct KeypadLines {
        exint: EXINT,
    }

    impl KeypadLines {
        fn new(exint: EXINT) -> Self {
            exint.pcmsk0.write(|w| unsafe { w.bits(PCMSK0_KEYPAD) });
            exint.pcmsk1.write(|w| unsafe { w.bits(PCMSK1_KEYPAD) });
            exint.pcmsk2.write(|w| unsafe { w.bits(PCMSK2_KEYPAD) });
            Self { exint }
        }

        fn ports() -> (
            &'static avr_device::atmega328p::portb::RegisterBlock,
            &'static avr_device::atmega328p::portc::RegisterBlock,
            &'static avr_device::atmega328p::portd::RegisterBlock,
        ) {
            // SAFETY: the keypad bits of these ports belong to this struct
            // alone; other bits are preserved by read-modify-write.
            unsafe { (&*PORTB::ptr(), &*PORTC::ptr(), &*PORTD::ptr()) }
        }
    }

    impl MatrixLines for KeypadLines {
        fn sense_rows(&mut self) {
            let (b, c, d) = Self::ports();
            let rows_d = pins::ROWS_PORTD;
            let rows_b = pins::ROWS_PORTB;
            let cols_d = pins::PRIMARY_COLS_PORTD;
            let cols_c = pins::SECONDARY_COLS_PORTC;
            // columns: outputs, low
            d.portd.modify(|r, w| unsafe { w.bits(r.bits() & !cols_d) });
            c.portc.modify(|r, w| unsafe { w.bits(r.bits() & !cols_c) });
            d.ddrd.modify(|r, w| unsafe { w.bits((r.bits() | cols_d) & !rows_d) });
            c.ddrc.modify(|r, w| unsafe { w.bits(r.bits() | cols_c) });
            // rows: inputs, pulled up
            b.ddrb.modify(|r, w| unsafe { w.bits(r.bits() & !rows_b) });
            d.portd.modify(|r, w| unsafe { w.bits(r.bits() | rows_d) });
            b.portb.modify(|r, w| unsafe { w.bits(r.bits() | rows_b) });
        }

        fn sense_columns(&mut self) {
            let (b, c, d) = Self::ports();
            let rows_d = pins::ROWS_PORTD;
            let rows_b = pins::ROWS_PORTB;
            let cols_d = pins::PRIMARY_COLS_PORTD;
            let cols_c = pins::SECONDARY_COLS_PORTC;
            // rows: outputs, low
            d.portd.modify(|r, w| unsafe { w.bits(r.bits() & !rows_d) });
            b.portb.modify(|r, w| unsafe { w.bits(r.bits() & !rows_b) });
            d.ddrd.modify(|r, w| unsafe { w.bits((r.bits() | rows_d) & !cols_d) });
            b.ddrb.modify(|r, w| unsafe { w.bits(r.bits() | rows_b) });
            // columns: inputs, pulled up
            c.ddrc.modify(|r, w| unsafe { w.bits(r.bits() & !cols_c) });
            d.portd.modify(|r, w| unsafe { w.bits(r.bits() | cols_d) });
            c.portc.modify(|r, w| unsafe { w.bits(r.bits() | cols_c) });
        }

        fn rows(&self) -> u8 {
            let (b, _, d) = Self::ports();
            decode_rows(d.pind.read().bits(), b.pinb.read().bits())
        }

        fn columns(&self) -> u8 {
            let (_, c, d) = Self::ports();
            decode_columns(d.pind.read().bits(), c.pinc.read().bits())
        }

        fn set_wake_enabled(&mut self, enabled: bool) {
            self.exint.pcicr.modify(|r, w| unsafe {
                if enabled {
                    w.bits(r.bits() | PCIE_ALL)
                } else {
                    w.bits(r.bits() & !PCIE_ALL)
                }
            });
        }

        fn clear_wake_flags(&mut self) {
            // write-one-to-clear
            self.exint.pcifr.write(|w| unsafe { w.bits(PCIE_ALL) });
        }
    }

    /// Board wiring, see `config::pins`
    pub mod board {
        use super::*;

        pub type TftDc = Pin<PORTB, { pins::TFT_DC }, Output>;
        pub type TftReset = Pin<PORTD, { pins::TFT_RESET }, Output>;
        pub type ModeSelect = Pin<PORTB, { pins::MODE_SELECT }, PullUp>;
        pub type StatusLed = Pin<PORTD, { pins::STATUS_LED }, Output>;

        pub struct Board {
            pub tft_dc: TftDc,
            pub tft_reset: TftReset,
            pub mode_select: ModeSelect,
            pub status_led: StatusLed,
            pub keypad: KeypadLines,
        }

        /// Take the ports and configure every line for its job. SCK and
        /// MOSI become outputs for the SPI master; the data/command line
        /// sits on SS, which as an output also keeps the block in master
        /// mode.
        pub fn split(_portb: PORTB, _portc: PORTC, _portd: PORTD, exint: EXINT) -> Board {
            let _sck = Pin::<PORTB, { pins::SPI_SCK }, Input>::retype::<Input>().into_output();
            let _mosi = Pin::<PORTB, { pins::SPI_MOSI }, Input>::retype::<Input>().into_output();
            Board {
                tft_dc: Pin::<PORTB, { pins::TFT_DC }, Input>::retype::<Input>().into_output(),
                tft_reset: Pin::<PORTD, { pins::TFT_RESET }, Input>::retype::<Input>()
                    .into_output(),
                mode_select: Pin::<PORTB, { pins::MODE_SELECT }, Input>::retype::<Input>()
                    .into_pull_up_input(),
                status_led: Pin::<PORTD, { pins::STATUS_LED }, Input>::retype::<Input>()
                    .into_output(),
                keypad: KeypadLines::new(exint),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_lines_decode_to_nothing() {
        assert_eq!(decode_rows(0xFF, 0xFF), 0);
        assert_eq!(decode_columns(0xFF, 0xFF), 0);
    }

    #[test]
    fn rows_map_to_pd6_pd7_pb0_pb1() {
        assert_eq!(decode_rows(!(1 << 6), 0xFF), 0b0001);
        assert_eq!(decode_rows(!(1 << 7), 0xFF), 0b0010);
        assert_eq!(decode_rows(0xFF, !(1 << 0)), 0b0100);
        assert_eq!(decode_rows(0xFF, !(1 << 1)), 0b1000);
    }

    #[test]
    fn primary_columns_are_pd2_to_pd5() {
        assert_eq!(decode_columns(!(1 << 2), 0xFF), 0b0001);
        assert_eq!(decode_columns(!(1 << 5), 0xFF), 0b1000);
    }

    #[test]
    fn secondary_columns_are_reversed() {
        assert_eq!(decode_columns(0xFF, !(1 << 3)), 0b0001_0000);
        assert_eq!(decode_columns(0xFF, !(1 << 0)), 0b1000_0000);
    }

    #[test]
    fn rows_ignore_other_lines() {
        // a pressed column pulls its own pin low, rows stay high
        assert_eq!(decode_rows(!(1 << 3), !(1 << 4)), 0);
    }
}
