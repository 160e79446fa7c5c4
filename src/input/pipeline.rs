//! Key policy run from the keypad interrupt, and the main loop's view of it
//!
//! The interrupt side turns each resolved key into tokens and queues what
//! the LCD should show. It never touches the display bus itself; the main
//! loop replays the queued `Echo`s between evaluations.

use core::cell::RefCell;
use critical_section::Mutex;
use heapless::String;

use super::keymap::{Key, PI_GLYPH_SLOT};
use super::tokens::{TokenStream, SENTINEL};
use super::InputError;
use crate::config::{ECHO_DEPTH, TOKEN_CAPACITY};
use crate::drivers::keypad::KeypadEvent;
use crate::hal::ring_buffer::CircularBuffer;

/// A pending change to the character display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Echo {
    Clear,
    Char(u8),
    Text(&'static str),
    /// Custom CGRAM character
    Glyph(u8),
}

pub type Expression = String<TOKEN_CAPACITY>;

pub struct KeyInput {
    tokens: TokenStream<TOKEN_CAPACITY>,
    echo: CircularBuffer<Echo, ECHO_DEPTH>,
    /// Token count, sentinel included, once `=` has been typed
    ready: Option<u16>,
    plot_mode: bool,
    awaiting_range: bool,
}

impl KeyInput {
    pub const fn new() -> Self {
        Self {
            tokens: TokenStream::new(),
            echo: CircularBuffer::new(),
            ready: None,
            plot_mode: false,
            awaiting_range: false,
        }
    }

    pub fn ready(&self) -> Option<u16> {
        self.ready
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Apply one key press. Keys arriving while a finished expression waits
    /// for the main loop are dropped.
    pub fn handle_key(&mut self, event: KeypadEvent) -> Result<(), InputError> {
        if self.ready.is_some() {
            return Ok(());
        }
        let Some(key) = Key::from_event(event) else {
            return Ok(());
        };

        match key {
            Key::Equals if self.tokens.is_empty() => return Ok(()),
            Key::Variable if !self.plot_mode => return Ok(()),
            _ => {}
        }

        let fresh = self.tokens.is_empty() && !self.awaiting_range;
        if fresh && key != Key::Delete {
            self.clear_display();
        }

        match key {
            Key::Equals => {
                self.tokens.append(SENTINEL)?;
                self.ready = Some(self.tokens.len() as u16);
            }
            Key::Symbol(c) => {
                self.reserve(1)?;
                self.tokens.append(c)?;
                self.echo.push(Echo::Char(c));
            }
            Key::Variable => {
                self.reserve(1)?;
                self.tokens.append(b'x')?;
                self.echo.push(Echo::Char(b'x'));
            }
            Key::Function(text) => {
                self.reserve(text.len())?;
                self.echo.push(if text == "pi" {
                    Echo::Glyph(PI_GLYPH_SLOT)
                } else {
                    Echo::Text(text)
                });
                for token in text.bytes() {
                    self.tokens.append(token)?;
                }
            }
            Key::Delete => {
                self.tokens.clear();
                self.clear_display();
            }
        }
        Ok(())
    }

    /// Anything still queued would be wiped by the clear anyway
    fn clear_display(&mut self) {
        self.echo.reset();
        self.echo.push(Echo::Clear);
    }

    /// Keep one slot free for the sentinel
    fn reserve(&self, count: usize) -> Result<(), InputError> {
        if self.tokens.remaining() > count {
            Ok(())
        } else {
            Err(InputError::ExpressionFull)
        }
    }

    /// Hand over the finished expression, if any, and start a new one
    pub fn take_expression(&mut self) -> Option<Expression> {
        let len = self.ready.take()?;
        Some(self.tokens.drain_to_string(usize::from(len)))
    }

    pub fn next_echo(&mut self) -> Option<Echo> {
        self.echo.pop()
    }

    /// Drop the expression being typed and any finished one
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.ready = None;
    }

    pub fn set_plot_mode(&mut self, plot_mode: bool) {
        self.plot_mode = plot_mode;
        if !plot_mode {
            self.awaiting_range = false;
        }
    }

    pub fn plot_mode(&self) -> bool {
        self.plot_mode
    }

    pub fn set_awaiting_range(&mut self, awaiting: bool) {
        self.awaiting_range = awaiting;
    }

    pub fn awaiting_range(&self) -> bool {
        self.awaiting_range
    }
}

impl Default for KeyInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Key input shared between the keypad interrupt and the main loop
pub type SharedInput = Mutex<RefCell<KeyInput>>;

/// Handle on the shared input where every call is its own critical section
#[derive(Clone, Copy)]
pub struct InputLink<'a> {
    shared: &'a SharedInput,
}

impl<'a> InputLink<'a> {
    pub fn new(shared: &'a SharedInput) -> Self {
        Self { shared }
    }

    fn with<R>(&self, f: impl FnOnce(&mut KeyInput) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.shared.borrow_ref_mut(cs)))
    }

    /// Interrupt side
    pub fn on_key(&self, event: KeypadEvent) -> Result<(), InputError> {
        self.with(|input| input.handle_key(event))
    }

    /// A finished expression waits to be taken
    pub fn is_pending(&self) -> bool {
        self.with(|input| input.ready().is_some())
    }

    pub fn take_expression(&self) -> Option<Expression> {
        self.with(KeyInput::take_expression)
    }

    pub fn next_echo(&self) -> Option<Echo> {
        self.with(KeyInput::next_echo)
    }

    pub fn reset(&self) {
        self.with(KeyInput::reset)
    }

    pub fn set_plot_mode(&self, plot_mode: bool) {
        self.with(|input| input.set_plot_mode(plot_mode))
    }

    pub fn set_awaiting_range(&self, awaiting: bool) {
        self.with(|input| input.set_awaiting_range(awaiting))
    }

    pub fn awaiting_range(&self) -> bool {
        self.with(|input| input.awaiting_range())
    }
}
