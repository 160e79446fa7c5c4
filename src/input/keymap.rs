//! Key legends of both keypads

use crate::drivers::keypad::{Keypad, KeypadEvent, KEYS_PER_PAD};

/// CGRAM slot holding the pi glyph
pub const PI_GLYPH_SLOT: u8 = 0;

pub const PI_GLYPH: [u8; 8] = [0x00, 0x00, 0x1F, 0x0A, 0x0A, 0x0A, 0x13, 0x00];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Key {
    /// Digit, operator or decimal point
    Symbol(u8),
    /// Ends the expression
    Equals,
    /// Multi-character legend, typed in full
    Function(&'static str),
    /// The plot variable
    Variable,
    /// Clear entry
    Delete,
}

pub(crate) const PRIMARY: [u8; KEYS_PER_PAD as usize] = *b"/=0.*987-654+321";

pub(crate) const SECONDARY: [&str; KEYS_PER_PAD as usize] = [
    "pi", "d", ")", "(", "log10(", "sqrt(", "^", "x", "ln(", "atan(", "acos(", "asin(", "exp(",
    "tan(", "cos(", "sin(",
];

impl Key {
    pub fn from_event(event: KeypadEvent) -> Option<Self> {
        let index = usize::from(event.index);
        match event.keypad {
            Keypad::Primary => {
                let legend = *PRIMARY.get(index)?;
                Some(if legend == b'=' {
                    Key::Equals
                } else {
                    Key::Symbol(legend)
                })
            }
            Keypad::Secondary => Some(match *SECONDARY.get(index)? {
                "d" => Key::Delete,
                "x" => Key::Variable,
                legend => Key::Function(legend),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(index: u8) -> Option<Key> {
        Key::from_event(KeypadEvent {
            index,
            keypad: Keypad::Primary,
        })
    }

    fn secondary(index: u8) -> Option<Key> {
        Key::from_event(KeypadEvent {
            index,
            keypad: Keypad::Secondary,
        })
    }

    #[test]
    fn primary_legends() {
        assert_eq!(primary(0), Some(Key::Symbol(b'/')));
        assert_eq!(primary(1), Some(Key::Equals));
        assert_eq!(primary(3), Some(Key::Symbol(b'.')));
        assert_eq!(primary(12), Some(Key::Symbol(b'+')));
        assert_eq!(primary(15), Some(Key::Symbol(b'1')));
    }

    #[test]
    fn secondary_legends() {
        assert_eq!(secondary(0), Some(Key::Function("pi")));
        assert_eq!(secondary(1), Some(Key::Delete));
        assert_eq!(secondary(5), Some(Key::Function("sqrt(")));
        assert_eq!(secondary(7), Some(Key::Variable));
        assert_eq!(secondary(15), Some(Key::Function("sin(")));
    }

    #[test]
    fn out_of_range_index_is_no_key() {
        assert_eq!(primary(16), None);
        assert_eq!(secondary(200), None);
    }
}
