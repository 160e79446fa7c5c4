//! From key presses to expressions

pub mod keymap;
pub mod pipeline;
pub mod tokens;

pub use keymap::Key;
pub use pipeline::{Echo, Expression, InputLink, KeyInput, SharedInput};
pub use tokens::{TokenStream, SENTINEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// No room left for another token
    ExpressionFull,
    /// Only ASCII may be typed
    InvalidToken(u8),
}
