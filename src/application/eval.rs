//! Expression evaluation and result formatting

use core::f64::consts::PI;
use heapless::String;
use ufmt::uwrite;

/// Results above this magnitude are shown in scientific notation
pub const SCIENTIFIC_THRESHOLD: f64 = 10e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EvalError {
    /// Input ended inside an expression
    UnexpectedEnd,
    /// Byte offset of a character that does not fit the grammar
    UnexpectedChar(usize),
    BadNumber,
    /// Neither a constant, the plot variable nor a known function
    UnknownName,
    /// `x` appeared outside plot mode
    MissingVariable,
    /// Division by zero, overflow, or an argument outside the domain
    NotFinite,
}

/// Turns an expression into a number. `x` is the plot variable, `None`
/// outside plot mode.
pub trait Evaluator {
    fn evaluate(&self, expr: &str, x: Option<f64>) -> Result<f64, EvalError>;
}

/// Recursive-descent evaluator for `+ - * / ^`, parentheses, unary minus,
/// decimals, `pi`, `x` and the functions on the second keypad.
///
/// ```text
/// expr   = term  (("+" | "-") term)*
/// term   = unary (("*" | "/") unary)*
/// unary  = ("-" | "+") unary | power
/// power  = atom ("^" unary)?
/// atom   = number | name | name "(" expr ")" | "(" expr ")"
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Arithmetic;

impl Evaluator for Arithmetic {
    fn evaluate(&self, expr: &str, x: Option<f64>) -> Result<f64, EvalError> {
        let mut parser = Parser {
            src: expr.as_bytes(),
            pos: 0,
            x,
        };
        let value = parser.expr()?;
        parser.skip_spaces();
        if parser.pos != parser.src.len() {
            return Err(EvalError::UnexpectedChar(parser.pos));
        }
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NotFinite)
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    x: Option<f64>,
}

impl<'a> Parser<'a> {
    fn skip_spaces(&mut self) {
        while self.src.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_spaces();
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        loop {
            if self.eat(b'+') {
                value += self.term()?;
            } else if self.eat(b'-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(b'*') {
                value *= self.unary()?;
            } else if self.eat(b'/') {
                value /= self.unary()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, EvalError> {
        if self.eat(b'-') {
            Ok(-self.unary()?)
        } else if self.eat(b'+') {
            self.unary()
        } else {
            self.power()
        }
    }

    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.atom()?;
        if self.eat(b'^') {
            let exponent = self.unary()?;
            Ok(libm::pow(base, exponent))
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> Result<f64, EvalError> {
        match self.peek() {
            None => Err(EvalError::UnexpectedEnd),
            Some(b'(') => {
                self.pos += 1;
                self.group()
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.name(),
            Some(_) => Err(EvalError::UnexpectedChar(self.pos)),
        }
    }

    fn number(&mut self) -> Result<f64, EvalError> {
        let start = self.pos;
        while matches!(self.src.get(self.pos), Some(c) if c.is_ascii_digit() || *c == b'.') {
            self.pos += 1;
        }
        core::str::from_utf8(&self.src[start..self.pos])
            .ok()
            .and_then(|digits| digits.parse::<f64>().ok())
            .ok_or(EvalError::BadNumber)
    }

    /// Rest of a parenthesised expression, after the `(`
    fn group(&mut self) -> Result<f64, EvalError> {
        let value = self.expr()?;
        if self.eat(b')') {
            Ok(value)
        } else if self.peek().is_none() {
            Err(EvalError::UnexpectedEnd)
        } else {
            Err(EvalError::UnexpectedChar(self.pos))
        }
    }

    fn name(&mut self) -> Result<f64, EvalError> {
        let start = self.pos;
        while matches!(self.src.get(self.pos), Some(c) if c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let src = self.src;
        let name = &src[start..self.pos];
        if self.eat(b'(') {
            let apply = function(name).ok_or(EvalError::UnknownName)?;
            return Ok(apply(self.group()?));
        }
        match name {
            b"pi" => Ok(PI),
            b"x" => self.x.ok_or(EvalError::MissingVariable),
            _ => Err(EvalError::UnknownName),
        }
    }
}

/// Functions typed by the second keypad, by name without the `(`
fn function(name: &[u8]) -> Option<fn(f64) -> f64> {
    let f: fn(f64) -> f64 = match name {
        b"sqrt" => libm::sqrt,
        b"sin" => libm::sin,
        b"cos" => libm::cos,
        b"tan" => libm::tan,
        b"asin" => libm::asin,
        b"acos" => libm::acos,
        b"atan" => libm::atan,
        b"exp" => libm::exp,
        b"ln" => libm::log,
        b"log10" => libm::log10,
        _ => return None,
    };
    Some(f)
}

/// Text shown for a failed evaluation
pub const NAN_TEXT: &str = "NaN";

/// Render `value` for the 16-column display: two decimals, or
/// `d.ddE+XX` once the magnitude passes [`SCIENTIFIC_THRESHOLD`].
pub fn format_result(value: f64) -> String<16> {
    let mut out = String::new();
    if !value.is_finite() {
        let _ = out.push_str(NAN_TEXT);
        return out;
    }
    let negative = value < 0.0;
    let magnitude = if negative { -value } else { value };

    if magnitude > SCIENTIFIC_THRESHOLD {
        let (mantissa, exponent) = scientific_parts(magnitude);
        if negative {
            let _ = out.push('-');
        }
        let exp_sign = if exponent < 0 { "-" } else { "+" };
        let exp = exponent.unsigned_abs();
        let _ = uwrite!(
            out,
            "{}.{}{}E{}{}{}",
            mantissa / 100,
            (mantissa / 10) % 10,
            mantissa % 10,
            exp_sign,
            exp / 10,
            exp % 10
        );
    } else {
        let hundredths = (magnitude * 100.0 + 0.5) as u64;
        if negative && hundredths != 0 {
            let _ = out.push('-');
        }
        let frac = hundredths % 100;
        let _ = uwrite!(out, "{}.{}{}", hundredths / 100, frac / 10, frac % 10);
    }
    out
}

/// Three significant digits and a decimal exponent for a positive value
fn scientific_parts(mut magnitude: f64) -> (u32, i16) {
    let mut exponent = 0i16;
    while magnitude >= 10.0 {
        magnitude /= 10.0;
        exponent += 1;
    }
    while magnitude < 1.0 && magnitude > 0.0 {
        magnitude *= 10.0;
        exponent -= 1;
    }
    let mut mantissa = (magnitude * 100.0 + 0.5) as u32;
    if mantissa >= 1000 {
        mantissa = 100;
        exponent += 1;
    }
    (mantissa, exponent)
}
