//! Foreground side of the calculator
//!
//! The main loop calls [`Calculator::poll`] over and over. Each call replays
//! what the keypad interrupt queued for the LCD and, once an expression has
//! been finished with `=`, evaluates it (calculator mode) or collects the
//! function and then its x range (plot mode).

pub mod eval;
pub mod plot;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::Write;

use crate::config::LCD_COLUMNS;
use crate::drivers::lcd::TextDisplay;
use crate::error::{Error, Result};
use crate::input::keymap::{PI_GLYPH, PI_GLYPH_SLOT};
use crate::input::{Echo, Expression, InputLink};
use eval::{format_result, EvalError, Evaluator, NAN_TEXT};
use plot::{PlotError, Plotter};

/// Shown on the second line while waiting for the plot range
pub const RANGE_PROMPT: &str = "Range:";
/// Column where the typed range starts
pub const RANGE_COLUMN: u8 = 7;
pub const RANGE_ERROR: &str = "Range error";
pub const FUNCTION_ERROR: &str = "Function error";

/// What the calculator needs from a character display
pub trait Screen {
    type Error;

    fn clear(&mut self) -> core::result::Result<(), Self::Error>;
    fn set_cursor(&mut self, col: u8, row: u8) -> core::result::Result<(), Self::Error>;
    fn write_char(&mut self, c: u8) -> core::result::Result<(), Self::Error>;
    fn write_str(&mut self, s: &str) -> core::result::Result<(), Self::Error>;
    fn define_glyph(&mut self, slot: u8, bitmap: &[u8; 8])
        -> core::result::Result<(), Self::Error>;
}

impl<I2C, D, E> Screen for TextDisplay<I2C, D>
where
    I2C: Write<Error = E>,
    D: DelayUs<u16>,
{
    type Error = E;

    fn clear(&mut self) -> core::result::Result<(), E> {
        TextDisplay::clear(self)
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> core::result::Result<(), E> {
        TextDisplay::set_cursor(self, col, row)
    }

    fn write_char(&mut self, c: u8) -> core::result::Result<(), E> {
        TextDisplay::write_char(self, c)
    }

    fn write_str(&mut self, s: &str) -> core::result::Result<(), E> {
        TextDisplay::write_str(self, s)
    }

    fn define_glyph(&mut self, slot: u8, bitmap: &[u8; 8]) -> core::result::Result<(), E> {
        self.define_custom_glyph(slot, bitmap)
    }
}

/// Result of one [`Calculator::poll`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// No finished expression yet
    Idle,
    Answer(f64),
    /// Evaluation failed, `NaN` is on the display
    NotANumber(EvalError),
    /// Plot function stored, range prompt shown
    AwaitingRange,
    Plotted,
    RangeError,
    FunctionError(EvalError),
}

pub struct Calculator<S, P, E> {
    screen: S,
    plotter: P,
    evaluator: E,
    /// Plot function waiting for its range
    function: Option<Expression>,
}

impl<S, P, E> Calculator<S, P, E>
where
    S: Screen,
    P: Plotter,
    E: Evaluator,
    Error: From<S::Error>,
{
    pub fn new(screen: S, plotter: P, evaluator: E) -> Self {
        Self {
            screen,
            plotter,
            evaluator,
            function: None,
        }
    }

    pub fn free(self) -> (S, P, E) {
        (self.screen, self.plotter, self.evaluator)
    }

    /// Load the pi glyph and show empty screens
    pub fn start(&mut self) -> Result<()> {
        self.screen.define_glyph(PI_GLYPH_SLOT, &PI_GLYPH)?;
        self.screen.clear()?;
        self.plotter.blank()?;
        Ok(())
    }

    /// Run one pass of the main loop. Any error also drops the input typed
    /// so far, the device itself keeps running.
    pub fn poll(&mut self, input: InputLink<'_>, plot_mode: bool) -> Result<Outcome> {
        let outcome = self.step(input, plot_mode);
        if outcome.is_err() {
            input.reset();
            input.set_awaiting_range(false);
            self.function = None;
        }
        outcome
    }

    fn step(&mut self, input: InputLink<'_>, plot_mode: bool) -> Result<Outcome> {
        input.set_plot_mode(plot_mode);
        if !plot_mode {
            self.function = None;
        }

        // no keys are accepted while an expression is pending, so once it
        // is seen every echo belonging to it is already queued
        let pending = input.is_pending();
        while let Some(echo) = input.next_echo() {
            self.replay(echo)?;
        }
        if !pending {
            return Ok(Outcome::Idle);
        }
        let Some(expr) = input.take_expression() else {
            return Ok(Outcome::Idle);
        };

        if plot_mode {
            self.plot_step(input, expr)
        } else {
            self.calculate(&expr)
        }
    }

    fn replay(&mut self, echo: Echo) -> Result<()> {
        match echo {
            Echo::Clear => self.screen.clear()?,
            Echo::Char(c) | Echo::Glyph(c) => self.screen.write_char(c)?,
            Echo::Text(text) => self.screen.write_str(text)?,
        }
        Ok(())
    }

    fn calculate(&mut self, expr: &str) -> Result<Outcome> {
        self.screen.set_cursor(LCD_COLUMNS - 1, 0)?;
        self.screen.write_str("=")?;
        self.screen.set_cursor(0, 1)?;
        match self.evaluator.evaluate(expr, None) {
            Ok(value) => {
                self.screen.write_str(&format_result(value))?;
                Ok(Outcome::Answer(value))
            }
            Err(e) => {
                self.screen.write_str(NAN_TEXT)?;
                Ok(Outcome::NotANumber(e))
            }
        }
    }

    fn plot_step(&mut self, input: InputLink<'_>, expr: Expression) -> Result<Outcome> {
        let Some(function) = self.function.take() else {
            self.function = Some(expr);
            input.set_awaiting_range(true);
            self.screen.set_cursor(0, 1)?;
            self.screen.write_str(RANGE_PROMPT)?;
            self.screen.set_cursor(RANGE_COLUMN, 1)?;
            return Ok(Outcome::AwaitingRange);
        };
        input.set_awaiting_range(false);

        let range = match self.evaluator.evaluate(&expr, None) {
            Ok(range) if range != 0.0 => range,
            _ => return self.report(RANGE_ERROR, Outcome::RangeError),
        };
        match self.plotter.plot(&self.evaluator, &function, range) {
            Ok(()) => Ok(Outcome::Plotted),
            Err(PlotError::InvalidRange) => self.report(RANGE_ERROR, Outcome::RangeError),
            Err(PlotError::Function(e)) => self.report(FUNCTION_ERROR, Outcome::FunctionError(e)),
            Err(e) => Err(e.into()),
        }
    }

    fn report(&mut self, message: &str, outcome: Outcome) -> Result<Outcome> {
        self.screen.clear()?;
        self.screen.write_str(message)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::keypad::{Keypad, KeypadEvent};
    use crate::input::keymap::{PRIMARY, SECONDARY};
    use crate::input::SharedInput;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use critical_section::Mutex;
    use eval::Arithmetic;

    #[derive(Debug, PartialEq)]
    enum Op {
        Clear,
        Cursor(u8, u8),
        Char(u8),
        Text(String),
        Glyph(u8),
    }

    #[derive(Default)]
    struct FakeScreen {
        ops: Vec<Op>,
    }

    impl Screen for FakeScreen {
        type Error = Infallible;

        fn clear(&mut self) -> core::result::Result<(), Infallible> {
            self.ops.push(Op::Clear);
            Ok(())
        }

        fn set_cursor(&mut self, col: u8, row: u8) -> core::result::Result<(), Infallible> {
            self.ops.push(Op::Cursor(col, row));
            Ok(())
        }

        fn write_char(&mut self, c: u8) -> core::result::Result<(), Infallible> {
            self.ops.push(Op::Char(c));
            Ok(())
        }

        fn write_str(&mut self, s: &str) -> core::result::Result<(), Infallible> {
            self.ops.push(Op::Text(s.to_string()));
            Ok(())
        }

        fn define_glyph(&mut self, slot: u8, _: &[u8; 8]) -> core::result::Result<(), Infallible> {
            self.ops.push(Op::Glyph(slot));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePlotter {
        blanks: usize,
        plots: Vec<(String, f64)>,
    }

    impl Plotter for FakePlotter {
        fn blank(&mut self) -> core::result::Result<(), PlotError> {
            self.blanks += 1;
            Ok(())
        }

        fn plot<E: Evaluator>(
            &mut self,
            evaluator: &E,
            expr: &str,
            range: f64,
        ) -> core::result::Result<(), PlotError> {
            evaluator.evaluate(expr, Some(range))?;
            self.plots.push((expr.to_string(), range));
            Ok(())
        }
    }

    type TestCalculator = Calculator<FakeScreen, FakePlotter, Arithmetic>;

    fn calculator() -> TestCalculator {
        Calculator::new(FakeScreen::default(), FakePlotter::default(), Arithmetic)
    }

    fn type_keys(link: InputLink<'_>, keys: &[u8]) {
        for &k in keys {
            let index = PRIMARY.iter().position(|&c| c == k).unwrap() as u8;
            link.on_key(KeypadEvent {
                index,
                keypad: Keypad::Primary,
            })
            .unwrap();
        }
    }

    fn type_function(link: InputLink<'_>, legend: &str) {
        let index = SECONDARY.iter().position(|&s| s == legend).unwrap() as u8;
        link.on_key(KeypadEvent {
            index,
            keypad: Keypad::Secondary,
        })
        .unwrap();
    }

    fn text(s: &str) -> Op {
        Op::Text(s.to_string())
    }

    #[test]
    fn start_loads_glyph_and_blanks() {
        let mut calc = calculator();
        calc.start().unwrap();
        let (screen, plotter, _) = calc.free();
        assert_eq!(screen.ops, [Op::Glyph(PI_GLYPH_SLOT), Op::Clear]);
        assert_eq!(plotter.blanks, 1);
    }

    #[test]
    fn calculator_mode_prints_the_answer() {
        static INPUT: SharedInput = Mutex::new(RefCell::new(crate::input::KeyInput::new()));
        let link = InputLink::new(&INPUT);
        let mut calc = calculator();

        type_keys(link, b"2+3");
        assert_eq!(calc.poll(link, false), Ok(Outcome::Idle));
        type_keys(link, b"=");
        assert_eq!(calc.poll(link, false), Ok(Outcome::Answer(5.0)));
        assert_eq!(calc.poll(link, false), Ok(Outcome::Idle));

        let (screen, _, _) = calc.free();
        assert_eq!(
            screen.ops,
            [
                Op::Clear,
                Op::Char(b'2'),
                Op::Char(b'+'),
                Op::Char(b'3'),
                Op::Cursor(15, 0),
                text("="),
                Op::Cursor(0, 1),
                text("5.00"),
            ]
        );
    }

    #[test]
    fn evaluation_error_shows_nan() {
        static INPUT: SharedInput = Mutex::new(RefCell::new(crate::input::KeyInput::new()));
        let link = InputLink::new(&INPUT);
        let mut calc = calculator();

        type_function(link, "sqrt(");
        type_keys(link, b"4=");
        assert_eq!(
            calc.poll(link, false),
            Ok(Outcome::NotANumber(EvalError::UnexpectedEnd))
        );
        let (screen, _, _) = calc.free();
        assert_eq!(screen.ops.first(), Some(&Op::Clear));
        assert_eq!(screen.ops.get(1), Some(&text("sqrt(")));
        assert_eq!(screen.ops.last(), Some(&text(NAN_TEXT)));
    }

    #[test]
    fn function_keys_are_evaluated() {
        static INPUT: SharedInput = Mutex::new(RefCell::new(crate::input::KeyInput::new()));
        let link = InputLink::new(&INPUT);
        let mut calc = calculator();

        type_function(link, "sqrt(");
        type_keys(link, b"9");
        type_function(link, ")");
        type_keys(link, b"=");
        assert_eq!(calc.poll(link, false), Ok(Outcome::Answer(3.0)));
        let (screen, _, _) = calc.free();
        assert_eq!(screen.ops.last(), Some(&text("3.00")));
    }

    #[test]
    fn plot_mode_asks_for_range_then_plots() {
        static INPUT: SharedInput = Mutex::new(RefCell::new(crate::input::KeyInput::new()));
        let link = InputLink::new(&INPUT);
        let mut calc = calculator();

        link.set_plot_mode(true);
        type_function(link, "x");
        type_keys(link, b"*2=");
        assert_eq!(calc.poll(link, true), Ok(Outcome::AwaitingRange));
        assert!(link.awaiting_range());

        // the range is typed next to the prompt, without clearing
        type_keys(link, b"5=");
        assert_eq!(calc.poll(link, true), Ok(Outcome::Plotted));
        assert!(!link.awaiting_range());

        let (screen, plotter, _) = calc.free();
        assert_eq!(plotter.plots, [("x*2".to_string(), 5.0)]);
        let prompt = screen.ops.iter().position(|op| *op == text(RANGE_PROMPT)).unwrap();
        assert_eq!(screen.ops[prompt + 1], Op::Cursor(RANGE_COLUMN, 1));
        assert_eq!(screen.ops[prompt + 2], Op::Char(b'5'));
        assert_eq!(screen.ops.len(), prompt + 3);
    }

    #[test]
    fn zero_range_is_rejected() {
        static INPUT: SharedInput = Mutex::new(RefCell::new(crate::input::KeyInput::new()));
        let link = InputLink::new(&INPUT);
        let mut calc = calculator();

        type_keys(link, b"1=");
        assert_eq!(calc.poll(link, true), Ok(Outcome::AwaitingRange));
        type_keys(link, b"0=");
        assert_eq!(calc.poll(link, true), Ok(Outcome::RangeError));

        let (screen, plotter, _) = calc.free();
        assert!(plotter.plots.is_empty());
        assert_eq!(screen.ops[screen.ops.len() - 2..], [Op::Clear, text(RANGE_ERROR)]);
    }

    #[test]
    fn broken_function_is_reported() {
        static INPUT: SharedInput = Mutex::new(RefCell::new(crate::input::KeyInput::new()));
        let link = InputLink::new(&INPUT);
        let mut calc = calculator();

        type_function(link, "cos(");
        type_keys(link, b"=");
        assert_eq!(calc.poll(link, true), Ok(Outcome::AwaitingRange));
        type_keys(link, b"2=");
        assert_eq!(
            calc.poll(link, true),
            Ok(Outcome::FunctionError(EvalError::UnexpectedEnd))
        );
        let (screen, _, _) = calc.free();
        assert_eq!(screen.ops.last(), Some(&text(FUNCTION_ERROR)));
    }

    #[test]
    fn leaving_plot_mode_forgets_the_function() {
        static INPUT: SharedInput = Mutex::new(RefCell::new(crate::input::KeyInput::new()));
        let link = InputLink::new(&INPUT);
        let mut calc = calculator();

        type_keys(link, b"3=");
        assert_eq!(calc.poll(link, true), Ok(Outcome::AwaitingRange));
        assert_eq!(calc.poll(link, false), Ok(Outcome::Idle));
        assert!(!link.awaiting_range());

        type_keys(link, b"7=");
        assert_eq!(calc.poll(link, false), Ok(Outcome::Answer(7.0)));
    }
}
