//! Function plotting on the ST7735 colour panel

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::OutputPin;
use embedded_hal::spi::FullDuplex;

use super::eval::{EvalError, Evaluator};
use crate::config::{TFT_HEIGHT, TFT_WIDTH};
use crate::hal::spi::{Mode, SpiError, SpiMaster};

/// Extra headroom above the largest sample
const Y_HEADROOM: f64 = 1.2;

/// Row marker for a column whose sample could not be computed
pub const GAP: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlotError {
    /// Zero or non-finite x range
    InvalidRange,
    Function(EvalError),
    Spi(SpiError),
}

impl From<EvalError> for PlotError {
    fn from(e: EvalError) -> Self {
        PlotError::Function(e)
    }
}

impl From<SpiError> for PlotError {
    fn from(e: SpiError) -> Self {
        PlotError::Spi(e)
    }
}

pub trait Plotter {
    /// Empty plot: background and axes
    fn blank(&mut self) -> Result<(), PlotError>;

    /// Plot `expr` over `x` in `[-range, range)`.
    fn plot<E: Evaluator>(&mut self, evaluator: &E, expr: &str, range: f64)
        -> Result<(), PlotError>;
}

/// Sample `expr` once per column and scale the results to pixel rows.
///
/// Row 0 holds the most negative values. Columns where the function is
/// undefined (division by zero, `sqrt` of a negative) are set to [`GAP`]; any other evaluation
/// failure aborts the whole plot.
pub fn sample_function<E: Evaluator>(
    evaluator: &E,
    expr: &str,
    range: f64,
    rows: &mut [u8; TFT_WIDTH],
) -> Result<(), PlotError> {
    if range == 0.0 || !range.is_finite() {
        return Err(PlotError::InvalidRange);
    }
    let sample = |column: usize| -> Result<Option<f64>, PlotError> {
        let x = range * ((2.0 * column as f64) / TFT_WIDTH as f64 - 1.0);
        match evaluator.evaluate(expr, Some(x)) {
            Ok(y) => Ok(Some(y)),
            Err(EvalError::NotFinite) => Ok(None),
            Err(e) => Err(e.into()),
        }
    };

    // two passes keep the RAM cost at one byte per column
    let mut max_y = 0.0;
    for column in 0..TFT_WIDTH {
        if let Some(y) = sample(column)? {
            let magnitude = if y < 0.0 { -y } else { y };
            if magnitude > max_y {
                max_y = magnitude;
            }
        }
    }
    max_y *= Y_HEADROOM;
    if max_y == 0.0 {
        max_y = 1.0;
    }

    let half = TFT_HEIGHT as f64 / 2.0;
    for (column, row) in rows.iter_mut().enumerate() {
        *row = match sample(column)? {
            Some(y) => {
                let scaled = half * (y / max_y + 1.0);
                if scaled <= 0.0 {
                    0
                } else if scaled >= (TFT_HEIGHT - 1) as f64 {
                    (TFT_HEIGHT - 1) as u8
                } else {
                    scaled as u8
                }
            }
            None => GAP,
        };
    }
    Ok(())
}

/// 16-bit 5-6-5 colour from 8-bit channels
pub const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    (((r & 0xF8) as u16) << 8) | (((g & 0xFC) as u16) << 3) | (b >> 3) as u16
}

pub const BACKGROUND: u16 = rgb565(0x00, 0x00, 0x00);
pub const AXES: u16 = rgb565(0xFF, 0xFF, 0xFF);
pub const TRACE: u16 = rgb565(0x20, 0xA0, 0x20);

// ST7735 commands
const SWRESET: u8 = 0x01;
const SLPOUT: u8 = 0x11;
const DISPON: u8 = 0x29;
const CASET: u8 = 0x2A;
const RASET: u8 = 0x2B;
const RAMWR: u8 = 0x2C;
const MADCTL: u8 = 0x36;
const COLMOD: u8 = 0x3A;

// MADCTL: row/column exchange and mirrored columns give a 160x128 landscape
const MADCTL_LANDSCAPE: u8 = 0x60;
// COLMOD: 16 bits per pixel
const COLMOD_RGB565: u8 = 0x05;

/// ST7735 panel on the SPI bus. Chip select is tied low on the board.
pub struct GraphicPanel<S, DC, RST, D> {
    spi: SpiMaster<S, DC>,
    reset: RST,
    delay: D,
}

impl<S, DC, RST, D> GraphicPanel<S, DC, RST, D>
where
    S: FullDuplex<u8>,
    DC: OutputPin,
    RST: OutputPin,
    D: DelayUs<u16>,
{
    pub fn new(spi: SpiMaster<S, DC>, reset: RST, delay: D) -> Self {
        Self { spi, reset, delay }
    }

    pub fn free(self) -> (SpiMaster<S, DC>, RST, D) {
        (self.spi, self.reset, self.delay)
    }

    fn wait_ms(&mut self, ms: u16) {
        for _ in 0..ms {
            self.delay.delay_us(1_000);
        }
    }

    /// Hardware reset, wake up, 16-bit colour, landscape, display on
    pub fn initialize(&mut self) -> Result<(), SpiError> {
        self.reset.set_low().map_err(|_| SpiError::Pin)?;
        self.wait_ms(10);
        self.reset.set_high().map_err(|_| SpiError::Pin)?;
        self.wait_ms(120);

        self.command(SWRESET, &[])?;
        self.wait_ms(150);
        self.command(SLPOUT, &[])?;
        self.wait_ms(255);
        self.command(COLMOD, &[COLMOD_RGB565])?;
        self.command(MADCTL, &[MADCTL_LANDSCAPE])?;
        self.command(DISPON, &[])?;
        self.wait_ms(100);
        Ok(())
    }

    fn command(&mut self, command: u8, params: &[u8]) -> Result<(), SpiError> {
        self.spi.transfer(command, Mode::Command)?;
        self.spi.write(params, Mode::Data)
    }

    /// Open an inclusive drawing window and start a RAM write
    pub fn set_window(&mut self, x0: u8, y0: u8, x1: u8, y1: u8) -> Result<(), SpiError> {
        self.command(CASET, &[0, x0, 0, x1])?;
        self.command(RASET, &[0, y0, 0, y1])?;
        self.spi.transfer(RAMWR, Mode::Command)?;
        Ok(())
    }

    pub fn fill_rect(&mut self, x: u8, y: u8, w: u8, h: u8, color: u16) -> Result<(), SpiError> {
        if w == 0 || h == 0 {
            return Ok(());
        }
        self.set_window(x, y, x + (w - 1), y + (h - 1))?;
        let pixel = color.to_be_bytes();
        for _ in 0..u16::from(w) * u16::from(h) {
            self.spi.write(&pixel, Mode::Data)?;
        }
        Ok(())
    }

    pub fn draw_pixel(&mut self, x: u8, y: u8, color: u16) -> Result<(), SpiError> {
        self.fill_rect(x, y, 1, 1, color)
    }

    pub fn fill_screen(&mut self, color: u16) -> Result<(), SpiError> {
        self.fill_rect(0, 0, TFT_WIDTH as u8, TFT_HEIGHT as u8, color)
    }

    /// Centre cross
    pub fn draw_axes(&mut self, color: u16) -> Result<(), SpiError> {
        self.fill_rect((TFT_WIDTH / 2) as u8, 0, 1, TFT_HEIGHT as u8, color)?;
        self.fill_rect(0, (TFT_HEIGHT / 2) as u8, TFT_WIDTH as u8, 1, color)
    }

    fn draw_trace(&mut self, rows: &[u8; TFT_WIDTH]) -> Result<(), SpiError> {
        let mut previous = GAP;
        for (column, &row) in rows.iter().enumerate() {
            if row == GAP {
                previous = GAP;
                continue;
            }
            let y = screen_row(row);
            if cfg!(feature = "draw-points") || previous == GAP {
                self.draw_pixel(column as u8, y, TRACE)?;
            } else {
                // join with the previous column using a vertical run
                let last = screen_row(previous);
                let (top, bottom) = if last < y { (last, y) } else { (y, last) };
                self.fill_rect(column as u8, top, 1, bottom - top + 1, TRACE)?;
            }
            previous = row;
        }
        Ok(())
    }
}

/// Panel rows count downwards
fn screen_row(row: u8) -> u8 {
    (TFT_HEIGHT as u8 - 1) - row
}

impl<S, DC, RST, D> Plotter for GraphicPanel<S, DC, RST, D>
where
    S: FullDuplex<u8>,
    DC: OutputPin,
    RST: OutputPin,
    D: DelayUs<u16>,
{
    fn blank(&mut self) -> Result<(), PlotError> {
        self.fill_screen(BACKGROUND)?;
        self.draw_axes(AXES)?;
        Ok(())
    }

    fn plot<E: Evaluator>(
        &mut self,
        evaluator: &E,
        expr: &str,
        range: f64,
    ) -> Result<(), PlotError> {
        let mut rows = [0u8; TFT_WIDTH];
        sample_function(evaluator, expr, range, &mut rows)?;
        self.blank()?;
        self.draw_trace(&rows)?;
        Ok(())
    }
}
