pub mod keypad;
pub mod lcd;

pub use keypad::{Keypad, KeypadEvent, KeypadScanner, MatrixLines, ScanState, TickSource};
pub use lcd::{Font, TextDisplay};
