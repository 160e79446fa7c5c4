//! Key presses from the matrix lines through to the display

use core::cell::RefCell;
use core::convert::Infallible;
use std::rc::Rc;

use critical_section::Mutex;
use embedded_hal_mock::delay::MockNoop;

use keycalc_firmware::application::eval::{Arithmetic, Evaluator};
use keycalc_firmware::application::plot::{sample_function, PlotError, Plotter};
use keycalc_firmware::application::{Calculator, Outcome, Screen};
use keycalc_firmware::config::TFT_WIDTH;
use keycalc_firmware::drivers::keypad::{KeypadScanner, MatrixLines, TickSource};
use keycalc_firmware::input::{InputError, InputLink, KeyInput, SharedInput};

/// One key held down at a time; `key` is (row, bit in the column bitmap)
#[derive(Default)]
struct Matrix {
    key: Option<(u8, u8)>,
    sensing_columns: bool,
}

impl MatrixLines for Matrix {
    fn sense_rows(&mut self) {
        self.sensing_columns = false;
    }

    fn sense_columns(&mut self) {
        self.sensing_columns = true;
    }

    fn rows(&self) -> u8 {
        match self.key {
            Some((row, _)) if !self.sensing_columns => 1 << row,
            _ => 0,
        }
    }

    fn columns(&self) -> u8 {
        match self.key {
            Some((_, bit)) if self.sensing_columns => 1 << bit,
            _ => 0,
        }
    }

    fn set_wake_enabled(&mut self, _: bool) {}

    fn clear_wake_flags(&mut self) {}
}

#[derive(Default)]
struct Tick;

impl TickSource for Tick {
    fn arm(&mut self) {}
    fn disarm(&mut self) {}
}

#[derive(Default)]
struct Lcd {
    text: String,
}

impl Screen for Lcd {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Infallible> {
        self.text.clear();
        Ok(())
    }

    fn set_cursor(&mut self, _: u8, row: u8) -> Result<(), Infallible> {
        if row > 0 {
            self.text.push('|');
        }
        Ok(())
    }

    fn write_char(&mut self, c: u8) -> Result<(), Infallible> {
        self.text.push(if c < 8 { '#' } else { c as char });
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        self.text.push_str(s);
        Ok(())
    }

    fn define_glyph(&mut self, _: u8, _: &[u8; 8]) -> Result<(), Infallible> {
        Ok(())
    }
}

#[derive(Default)]
struct Panel {
    traces: Vec<[u8; TFT_WIDTH]>,
}

impl Plotter for Panel {
    fn blank(&mut self) -> Result<(), PlotError> {
        Ok(())
    }

    fn plot<E: Evaluator>(&mut self, evaluator: &E, expr: &str, range: f64) -> Result<(), PlotError> {
        let mut rows = [0u8; TFT_WIDTH];
        sample_function(evaluator, expr, range, &mut rows)?;
        self.traces.push(rows);
        Ok(())
    }
}

/// Shared handle so the test can hold keys down while the scanner owns the lines
struct Lines(Rc<RefCell<Matrix>>);

impl MatrixLines for Lines {
    fn sense_rows(&mut self) {
        self.0.borrow_mut().sense_rows();
    }

    fn sense_columns(&mut self) {
        self.0.borrow_mut().sense_columns();
    }

    fn rows(&self) -> u8 {
        self.0.borrow().rows()
    }

    fn columns(&self) -> u8 {
        self.0.borrow().columns()
    }

    fn set_wake_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().set_wake_enabled(enabled);
    }

    fn clear_wake_flags(&mut self) {
        self.0.borrow_mut().clear_wake_flags();
    }
}

struct Keyboard {
    matrix: Rc<RefCell<Matrix>>,
    scanner: KeypadScanner<Lines, Tick, MockNoop>,
}

impl Keyboard {
    fn new() -> Self {
        let matrix = Rc::new(RefCell::new(Matrix::default()));
        let scanner = KeypadScanner::new(Lines(matrix.clone()), Tick, MockNoop::new());
        Self { matrix, scanner }
    }

    /// Hold `key` through one wake/tick cycle and feed the result to `link`
    fn press(&mut self, link: InputLink<'_>, key: (u8, u8)) -> Result<(), InputError> {
        self.matrix.borrow_mut().key = Some(key);
        self.scanner.on_wake();
        let event = self.scanner.on_tick();
        self.matrix.borrow_mut().key = None;
        match event {
            Some(event) => link.on_key(event),
            None => Ok(()),
        }
    }

    fn type_legends(&mut self, link: InputLink<'_>, legends: &str) {
        for c in legends.chars() {
            self.press(link, primary(c)).unwrap();
        }
    }
}

/// Primary keypad position of a legend in "/=0.*987-654+321"
fn primary(legend: char) -> (u8, u8) {
    let index = "/=0.*987-654+321".find(legend).unwrap() as u8;
    (index / 4, index % 4)
}

/// Secondary keypad position; its columns sit in bits 4..8
fn secondary(index: u8) -> (u8, u8) {
    (index / 4, 4 + index % 4)
}

#[test]
fn two_plus_three() {
    static INPUT: SharedInput = Mutex::new(RefCell::new(KeyInput::new()));
    let link = InputLink::new(&INPUT);
    let mut keys = Keyboard::new();
    let mut calc = Calculator::new(Lcd::default(), Panel::default(), Arithmetic);

    keys.type_legends(link, "2+3=");
    assert_eq!(calc.poll(link, false), Ok(Outcome::Answer(5.0)));

    let (lcd, _, _) = calc.free();
    assert_eq!(lcd.text, "2+3=|5.00");
}

#[test]
fn pi_key_shows_glyph_and_evaluates() {
    static INPUT: SharedInput = Mutex::new(RefCell::new(KeyInput::new()));
    let link = InputLink::new(&INPUT);
    let mut keys = Keyboard::new();
    let mut calc = Calculator::new(Lcd::default(), Panel::default(), Arithmetic);

    keys.type_legends(link, "2*");
    keys.press(link, secondary(0)).unwrap();
    keys.type_legends(link, "=");
    let Ok(Outcome::Answer(value)) = calc.poll(link, false) else {
        panic!("expected an answer");
    };
    assert!((value - 2.0 * core::f64::consts::PI).abs() < 1e-12);

    let (lcd, _, _) = calc.free();
    assert_eq!(lcd.text, "2*#=|6.28");
}

#[test]
fn plot_session() {
    static INPUT: SharedInput = Mutex::new(RefCell::new(KeyInput::new()));
    let link = InputLink::new(&INPUT);
    let mut keys = Keyboard::new();
    let mut calc = Calculator::new(Lcd::default(), Panel::default(), Arithmetic);
    link.set_plot_mode(true);

    // x ^ 2 =
    keys.press(link, secondary(7)).unwrap();
    keys.press(link, secondary(6)).unwrap();
    keys.type_legends(link, "2=");
    assert_eq!(calc.poll(link, true), Ok(Outcome::AwaitingRange));

    keys.type_legends(link, "3=");
    assert_eq!(calc.poll(link, true), Ok(Outcome::Plotted));

    let (lcd, panel, _) = calc.free();
    assert_eq!(lcd.text, "x^2|Range:|3");
    assert_eq!(panel.traces.len(), 1);
    let trace = &panel.traces[0];
    // a parabola: highest at the left edge, lowest in the middle
    assert_eq!(trace[TFT_WIDTH / 2], 64);
    assert!(trace[0] > trace[TFT_WIDTH / 4]);
}

#[test]
fn delete_key_starts_over() {
    static INPUT: SharedInput = Mutex::new(RefCell::new(KeyInput::new()));
    let link = InputLink::new(&INPUT);
    let mut keys = Keyboard::new();
    let mut calc = Calculator::new(Lcd::default(), Panel::default(), Arithmetic);

    keys.type_legends(link, "99");
    keys.press(link, secondary(1)).unwrap();
    keys.type_legends(link, "4=");
    assert_eq!(calc.poll(link, false), Ok(Outcome::Answer(4.0)));
}
