//! Configuration constants for the calculator firmware

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// TX and RX queue lengths of the interrupt-driven USART
pub const TX_BUFFER_LEN: usize = 128;
pub const RX_BUFFER_LEN: usize = 128;

/// PCF8574 backpack address of the character LCD
pub const LCD_ADDR: u8 = 0x3F;

/// Geometry of the character LCD
pub const LCD_COLUMNS: u8 = 16;
pub const LCD_LINES: u8 = 2;

/// Maximum number of tokens in one expression, sentinel included
pub const TOKEN_CAPACITY: usize = 64;

/// Display echo queue: a clear plus one echo per token. The queue keeps one
/// slot empty.
pub const ECHO_DEPTH: usize = TOKEN_CAPACITY + 1;

/// Graphic panel size in pixels
pub const TFT_WIDTH: usize = 160;
pub const TFT_HEIGHT: usize = 128;

/// Frame size of the USART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    Five,
    Six,
    Seven,
    Eight,
    Nine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Line settings of the debug serial port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub frame_size: FrameSize,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl SerialConfig {
    /// 9600 8N1
    pub const DEFAULT: Self = Self {
        baud_rate: 9600,
        frame_size: FrameSize::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
    };

    /// Baud rate register value for normal (16x) asynchronous mode
    pub const fn ubrr(&self) -> u16 {
        (CPU_FREQ_HZ / 16 / self.baud_rate - 1) as u16
    }

    /// UCSZ0[2:0], UPM0[1:0] and USBS0 bits for UCSR0C.
    /// UCSZ02 lives in UCSR0B and is returned separately.
    pub const fn frame_bits(&self) -> (u8, bool) {
        let (ucsz, ucsz2) = match self.frame_size {
            FrameSize::Five => (0b00, false),
            FrameSize::Six => (0b01, false),
            FrameSize::Seven => (0b10, false),
            FrameSize::Eight => (0b11, false),
            FrameSize::Nine => (0b11, true),
        };
        let upm = match self.parity {
            Parity::None => 0b00,
            Parity::Even => 0b10,
            Parity::Odd => 0b11,
        };
        let usbs = match self.stop_bits {
            StopBits::One => 0,
            StopBits::Two => 1,
        };
        ((upm << 4) | (usbs << 3) | (ucsz << 1), ucsz2)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Physical line assignment on the ATmega328P.
///
/// | Signal            | Line        |
/// |-------------------|-------------|
/// | SPI SCK           | PB5         |
/// | SPI MOSI          | PB3         |
/// | TFT data/command  | PB2         |
/// | TFT reset         | PD1         |
/// | plot/calc select  | PB4 (input) |
/// | status LED        | PD0         |
/// | keypad rows 0..3  | PD6 PD7 PB0 PB1 |
/// | primary cols 0..3 | PD2 PD3 PD4 PD5 |
/// | second cols 0..3  | PC3 PC2 PC1 PC0 |
pub mod pins {
    pub const SPI_SCK: u8 = 5;
    pub const SPI_MOSI: u8 = 3;
    pub const TFT_DC: u8 = 2;
    pub const MODE_SELECT: u8 = 4;
    pub const TFT_RESET: u8 = 1;
    pub const STATUS_LED: u8 = 0;

    /// Row lines, bit positions on (PORTD, PORTD, PORTB, PORTB)
    pub const ROWS_PORTD: u8 = (1 << 6) | (1 << 7);
    pub const ROWS_PORTB: u8 = (1 << 0) | (1 << 1);
    /// Primary keypad columns on PORTD
    pub const PRIMARY_COLS_PORTD: u8 = (1 << 2) | (1 << 3) | (1 << 4) | (1 << 5);
    /// Secondary keypad columns on PORTC, wired in reverse order
    pub const SECONDARY_COLS_PORTC: u8 = (1 << 0) | (1 << 1) | (1 << 2) | (1 << 3);
}
