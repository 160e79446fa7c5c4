//! HD44780 character LCD behind a PCF8574 I2C backpack
//!
//! The controller runs in 4-bit mode. Every byte goes out as two nibbles and
//! every nibble as two bus writes (EN high, then EN low), because the
//! expander pins are the only way to reach the display lines.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::Write;

// Expander pin masks
const PCF_RS: u8 = 0x01;
const PCF_EN: u8 = 0x04;
const PCF_BACKLIGHT: u8 = 0x08;

// Commands
const LCD_CLEARDISPLAY: u8 = 0x01;
const LCD_RETURNHOME: u8 = 0x02;
const LCD_ENTRYMODESET: u8 = 0x04;
const LCD_DISPLAYCONTROL: u8 = 0x08;
const LCD_CURSORSHIFT: u8 = 0x10;
const LCD_FUNCTIONSET: u8 = 0x20;
const LCD_SETCGRAMADDR: u8 = 0x40;
const LCD_SETDDRAMADDR: u8 = 0x80;

// Entry mode flags
const LCD_ENTRYLEFT: u8 = 0x02;
const LCD_ENTRYSHIFTINCREMENT: u8 = 0x01;

// Display control flags
const LCD_DISPLAYON: u8 = 0x04;
const LCD_CURSORON: u8 = 0x02;
const LCD_BLINKON: u8 = 0x01;

// Shift flags
const LCD_DISPLAYMOVE: u8 = 0x08;
const LCD_MOVERIGHT: u8 = 0x04;
const LCD_MOVELEFT: u8 = 0x00;

// Function set flags
const LCD_2LINE: u8 = 0x08;
const LCD_5X10DOTS: u8 = 0x04;

const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

// Datasheet timing, microseconds
const POWER_ON_WAIT_US: u16 = 50_000;
const RESET_NIBBLE_WAIT_US: u16 = 4_500;
const LAST_RESET_NIBBLE_WAIT_US: u16 = 150;
const ENABLE_PULSE_US: u16 = 1;
const COMMAND_SETTLE_US: u16 = 37;
const CLEAR_HOME_WAIT_US: u16 = 2_000;

/// Character cell height
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Font {
    Dots5x8,
    /// Only honoured on single-line displays
    Dots5x10,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RegisterSelect {
    Command,
    Data,
}

pub struct TextDisplay<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    backlight: u8,
    lines: u8,
    function: u8,
    control: u8,
    mode: u8,
}

impl<I2C, D, E> TextDisplay<I2C, D>
where
    I2C: Write<Error = E>,
    D: DelayUs<u16>,
{
    /// Bind the display at `address`. Nothing is sent until `initialize`.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            backlight: 0,
            lines: 1,
            function: 0,
            control: 0,
            mode: 0,
        }
    }

    pub fn free(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    pub fn lines(&self) -> u8 {
        self.lines
    }

    /// Run the 4-bit reset sequence (HD44780 datasheet figure 24) and leave
    /// the display on, cleared, cursor hidden, text flowing left to right.
    ///
    /// A wrong sequence leaves the controller deaf without any error on the
    /// bus; only a power cycle recovers it.
    pub fn initialize(&mut self, lines: u8, font: Font) -> Result<(), E> {
        self.lines = lines.max(1);
        self.function = 0;
        if self.lines > 1 {
            self.function |= LCD_2LINE;
        }
        if font == Font::Dots5x10 && self.lines == 1 {
            self.function |= LCD_5X10DOTS;
        }

        // all expander lines low, then wait out the power-on reset
        self.write_expander(0x00, RegisterSelect::Command, false)?;
        self.delay.delay_us(POWER_ON_WAIT_US);

        self.send_nibble(0x03, RegisterSelect::Command)?;
        self.delay.delay_us(RESET_NIBBLE_WAIT_US);
        self.send_nibble(0x03, RegisterSelect::Command)?;
        self.delay.delay_us(RESET_NIBBLE_WAIT_US);
        self.send_nibble(0x03, RegisterSelect::Command)?;
        self.delay.delay_us(LAST_RESET_NIBBLE_WAIT_US);
        self.send_nibble(0x02, RegisterSelect::Command)?;

        self.command(LCD_FUNCTIONSET | self.function)?;

        self.control = LCD_DISPLAYON;
        self.command(LCD_DISPLAYCONTROL | self.control)?;
        self.clear()?;

        self.mode = LCD_ENTRYLEFT;
        self.command(LCD_ENTRYMODESET | self.mode)
    }

    pub fn clear(&mut self) -> Result<(), E> {
        self.command(LCD_CLEARDISPLAY)?;
        self.delay.delay_us(CLEAR_HOME_WAIT_US);
        Ok(())
    }

    pub fn home(&mut self) -> Result<(), E> {
        self.command(LCD_RETURNHOME)?;
        self.delay.delay_us(CLEAR_HOME_WAIT_US);
        Ok(())
    }

    /// Move the cursor. Rows past the configured line count land on the
    /// last row.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), E> {
        let last = (self.lines - 1).min(ROW_OFFSETS.len() as u8 - 1);
        let row = row.min(last);
        self.command(LCD_SETDDRAMADDR | col.wrapping_add(ROW_OFFSETS[row as usize]))
    }

    pub fn display_on(&mut self) -> Result<(), E> {
        self.update_control(LCD_DISPLAYON, true)
    }

    pub fn display_off(&mut self) -> Result<(), E> {
        self.update_control(LCD_DISPLAYON, false)
    }

    pub fn cursor_on(&mut self) -> Result<(), E> {
        self.update_control(LCD_CURSORON, true)
    }

    pub fn cursor_off(&mut self) -> Result<(), E> {
        self.update_control(LCD_CURSORON, false)
    }

    pub fn blink_on(&mut self) -> Result<(), E> {
        self.update_control(LCD_BLINKON, true)
    }

    pub fn blink_off(&mut self) -> Result<(), E> {
        self.update_control(LCD_BLINKON, false)
    }

    /// Shift the whole display without touching DDRAM
    pub fn scroll_left(&mut self) -> Result<(), E> {
        self.command(LCD_CURSORSHIFT | LCD_DISPLAYMOVE | LCD_MOVELEFT)
    }

    pub fn scroll_right(&mut self) -> Result<(), E> {
        self.command(LCD_CURSORSHIFT | LCD_DISPLAYMOVE | LCD_MOVERIGHT)
    }

    pub fn left_to_right(&mut self) -> Result<(), E> {
        self.update_mode(LCD_ENTRYLEFT, true)
    }

    pub fn right_to_left(&mut self) -> Result<(), E> {
        self.update_mode(LCD_ENTRYLEFT, false)
    }

    /// Right-justify text from the cursor
    pub fn autoscroll_on(&mut self) -> Result<(), E> {
        self.update_mode(LCD_ENTRYSHIFTINCREMENT, true)
    }

    pub fn autoscroll_off(&mut self) -> Result<(), E> {
        self.update_mode(LCD_ENTRYSHIFTINCREMENT, false)
    }

    /// The backpack only switches the LED, so any non-zero level is "on".
    /// The level rides along with every later transfer.
    pub fn set_backlight(&mut self, level: u8) -> Result<(), E> {
        self.backlight = level;
        self.write_expander(0x00, RegisterSelect::Data, false)
    }

    /// Load one of the eight CGRAM characters. Only the low three bits of
    /// `slot` are used.
    pub fn define_custom_glyph(&mut self, slot: u8, bitmap: &[u8; 8]) -> Result<(), E> {
        let slot = slot & 0x07;
        self.command(LCD_SETCGRAMADDR | (slot << 3))?;
        for &row in bitmap {
            self.write_char(row)?;
        }
        Ok(())
    }

    pub fn write_char(&mut self, value: u8) -> Result<(), E> {
        self.send(value, RegisterSelect::Data)
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), E> {
        for byte in s.bytes() {
            self.write_char(byte)?;
        }
        Ok(())
    }

    /// Print `s` and park the cursor right after it on `row`.
    pub fn print_at(&mut self, s: &str, row: u8) -> Result<(), E> {
        self.write_str(s)?;
        self.set_cursor(s.len() as u8, row)
    }

    fn update_control(&mut self, flag: u8, set: bool) -> Result<(), E> {
        if set {
            self.control |= flag;
        } else {
            self.control &= !flag;
        }
        self.command(LCD_DISPLAYCONTROL | self.control)
    }

    fn update_mode(&mut self, flag: u8, set: bool) -> Result<(), E> {
        if set {
            self.mode |= flag;
        } else {
            self.mode &= !flag;
        }
        self.command(LCD_ENTRYMODESET | self.mode)
    }

    fn command(&mut self, value: u8) -> Result<(), E> {
        self.send(value, RegisterSelect::Command)
    }

    fn send(&mut self, value: u8, rs: RegisterSelect) -> Result<(), E> {
        self.send_nibble(value >> 4, rs)?;
        self.send_nibble(value & 0x0F, rs)
    }

    /// Latch one nibble: EN high, hold, EN low, settle.
    fn send_nibble(&mut self, half: u8, rs: RegisterSelect) -> Result<(), E> {
        self.write_expander(half, rs, true)?;
        self.delay.delay_us(ENABLE_PULSE_US);
        self.write_expander(half, rs, false)?;
        self.delay.delay_us(COMMAND_SETTLE_US);
        Ok(())
    }

    fn write_expander(&mut self, half: u8, rs: RegisterSelect, enable: bool) -> Result<(), E> {
        let mut data = half << 4;
        if rs == RegisterSelect::Data {
            data |= PCF_RS;
        }
        if enable {
            data |= PCF_EN;
        }
        if self.backlight > 0 {
            data |= PCF_BACKLIGHT;
        }
        self.i2c.write(self.address, &[data])
    }
}
