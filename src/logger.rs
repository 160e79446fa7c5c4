//! Level-tagged line logging over any `ufmt` sink
//!
//! In the firmware the sink is the interrupt-driven USART, so a log call
//! only queues bytes. Sink errors are swallowed; logging never fails the
//! caller.

use ufmt::{uWrite, uwrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    /// Console command selecting a level: `e`, `w`, `i` or `d`
    pub fn from_command(byte: u8) -> Option<Self> {
        match byte.to_ascii_lowercase() {
            b'e' => Some(Level::Error),
            b'w' => Some(Level::Warn),
            b'i' => Some(Level::Info),
            b'd' => Some(Level::Debug),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Level::Error => "[ERR] ",
            Level::Warn => "[WRN] ",
            Level::Info => "[INF] ",
            Level::Debug => "[DBG] ",
        }
    }
}

pub struct Logger<W> {
    sink: W,
    level: Level,
}

impl<W: uWrite> Logger<W> {
    /// Lines above `level` are dropped
    pub fn new(sink: W, level: Level) -> Self {
        Self { sink, level }
    }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn free(self) -> W {
        self.sink
    }

    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn log(&mut self, level: Level, msg: &str) {
        if self.enabled(level) {
            let _ = uwrite!(self.sink, "{}{}\r\n", level.tag(), msg);
        }
    }

    pub fn error(&mut self, msg: &str) {
        self.log(Level::Error, msg);
    }

    pub fn warn(&mut self, msg: &str) {
        self.log(Level::Warn, msg);
    }

    pub fn info(&mut self, msg: &str) {
        self.log(Level::Info, msg);
    }

    pub fn debug(&mut self, msg: &str) {
        self.log(Level::Debug, msg);
    }

    /// `msg` followed by `=` and `text`, e.g. an expression and its result
    pub fn pair(&mut self, level: Level, msg: &str, text: &str) {
        if self.enabled(level) {
            let _ = uwrite!(self.sink, "{}{}={}\r\n", level.tag(), msg, text);
        }
    }

    /// Debug line with a byte in hex, e.g. a bus status register
    pub fn debug_hex(&mut self, msg: &str, byte: u8) {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        if !self.enabled(Level::Debug) {
            return;
        }
        let digits = [HEX[usize::from(byte >> 4)], HEX[usize::from(byte & 0x0F)]];
        // both digits come from the ASCII table above
        let hex = core::str::from_utf8(&digits).unwrap_or("??");
        let _ = uwrite!(self.sink, "{}{}: 0x{}\r\n", Level::Debug.tag(), msg, hex);
    }
}

/// Sink for builds without a serial console
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl uWrite for Discard {
    type Error = core::convert::Infallible;

    fn write_str(&mut self, _: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}
