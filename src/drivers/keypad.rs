//! Two 4x4 keypads sharing their row lines
//!
//! # Theory of operation
//!
//! At rest the four row lines are pulled-up inputs and every column of both
//! keypads is driven low. A key press pulls its row low, which raises a
//! pin-change interrupt. That interrupt only arms a ~1 ms timer; contact
//! bounce in the meantime re-fires the pin-change interrupt harmlessly.
//!
//! When the timer overflows the scan runs once:
//!
//! - read the rows, the lowest pressed row wins and gives the coarse index,
//! - swap roles (rows driven low, columns pulled up) and let the pull-ups
//!   charge the lines,
//! - read the columns; the primary keypad's group is checked before the
//!   secondary one, which gives the fine index and the keypad,
//! - swap back, wait for the lines to settle and drop the pin-change flags
//!   latched while the lines were moving.
//!
//! The timer disarms itself, so the next press starts the cycle over.

use embedded_hal::blocking::delay::DelayUs;

/// Keys per keypad
pub const KEYS_PER_PAD: u8 = 16;

/// Pull-up charge time after swapping roles
pub const SENSE_SETTLE_US: u16 = 20;
/// Settle time after restoring the idle configuration
pub const RESTORE_SETTLE_US: u16 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Keypad {
    Primary,
    Secondary,
}

/// A debounced, resolved key press
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeypadEvent {
    /// `row * 4 + column`, in `0..KEYS_PER_PAD`
    pub index: u8,
    pub keypad: Keypad,
}

/// The physical lines of both keypads.
///
/// Bitmaps are active-high: a set bit means "this line reads low".
pub trait MatrixLines {
    /// Idle configuration: rows are pulled-up inputs, columns driven low
    fn sense_rows(&mut self);
    /// Scan configuration: rows driven low, columns are pulled-up inputs
    fn sense_columns(&mut self);
    /// Bit `n` set when row `n` is low
    fn rows(&self) -> u8;
    /// Bits 0..4 are the primary columns, bits 4..8 the secondary ones
    fn columns(&self) -> u8;
    /// Gate the pin-change interrupts of the keypad lines
    fn set_wake_enabled(&mut self, enabled: bool);
    /// Drop any latched pin-change flags
    fn clear_wake_flags(&mut self);
}

/// One-shot timer that delivers the debounce tick
pub trait TickSource {
    fn arm(&mut self);
    fn disarm(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    /// Waiting for a pin change
    Idle,
    /// Timer armed, scan runs on the next tick
    Scanning,
}

pub struct KeypadScanner<L, T, D> {
    lines: L,
    tick: T,
    delay: D,
    state: ScanState,
}

impl<L, T, D> KeypadScanner<L, T, D>
where
    L: MatrixLines,
    T: TickSource,
    D: DelayUs<u16>,
{
    pub fn new(mut lines: L, mut tick: T, delay: D) -> Self {
        tick.disarm();
        lines.sense_rows();
        lines.clear_wake_flags();
        lines.set_wake_enabled(true);
        Self {
            lines,
            tick,
            delay,
            state: ScanState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn free(self) -> (L, T, D) {
        (self.lines, self.tick, self.delay)
    }

    /// Pin-change interrupt body
    pub fn on_wake(&mut self) {
        if self.state == ScanState::Idle {
            self.tick.arm();
            self.state = ScanState::Scanning;
        }
    }

    /// Timer interrupt body. Returns the key found, if any.
    pub fn on_tick(&mut self) -> Option<KeypadEvent> {
        self.tick.disarm();
        if self.state != ScanState::Scanning {
            return None;
        }

        // the line shuffle below would retrigger us
        self.lines.set_wake_enabled(false);

        let row = lowest_bit(self.lines.rows() & 0x0F);
        let column = match row {
            Some(_) => {
                self.lines.sense_columns();
                self.delay.delay_us(SENSE_SETTLE_US);
                decode_columns(self.lines.columns())
            }
            None => None,
        };

        self.lines.sense_rows();
        self.delay.delay_us(RESTORE_SETTLE_US);
        self.lines.clear_wake_flags();
        self.lines.set_wake_enabled(true);
        self.state = ScanState::Idle;

        let row = row?;
        let (column, keypad) = column?;
        Some(KeypadEvent {
            index: row * 4 + column,
            keypad,
        })
    }
}

fn lowest_bit(bits: u8) -> Option<u8> {
    if bits == 0 {
        None
    } else {
        Some(bits.trailing_zeros() as u8)
    }
}

fn decode_columns(bits: u8) -> Option<(u8, Keypad)> {
    if let Some(col) = lowest_bit(bits & 0x0F) {
        return Some((col, Keypad::Primary));
    }
    lowest_bit(bits >> 4).map(|col| (col, Keypad::Secondary))
}
