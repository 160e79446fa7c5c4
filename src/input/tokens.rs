//! The expression being typed, one ASCII token per slot

use heapless::{String, Vec};

use super::InputError;

/// Terminates a finished expression
pub const SENTINEL: u8 = b'=';

/// Fixed-capacity token sequence.
///
/// Appended from the keypad interrupt, drained by the main loop once the
/// sentinel has been published. The caller provides the mutual exclusion.
#[derive(Debug)]
pub struct TokenStream<const N: usize> {
    tokens: Vec<u8, N>,
}

impl<const N: usize> TokenStream<N> {
    pub const fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Free slots left
    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.tokens.len()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    pub fn append(&mut self, token: u8) -> Result<(), InputError> {
        if !token.is_ascii() {
            return Err(InputError::InvalidToken(token));
        }
        self.tokens
            .push(token)
            .map_err(|_| InputError::ExpressionFull)
    }

    /// Copy the tokens in front of the sentinel, looking at no more than
    /// `expected_len` of them, and leave the stream empty.
    pub fn drain_to_string(&mut self, expected_len: usize) -> String<N> {
        let mut out = String::new();
        for &token in self.tokens.iter().take(expected_len) {
            if token == SENTINEL {
                break;
            }
            // every token is ASCII and N bounds both sides
            let _ = out.push(token as char);
        }
        self.tokens.clear();
        out
    }
}

impl<const N: usize> Default for TokenStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_up_to_sentinel() {
        let mut stream: TokenStream<8> = TokenStream::new();
        for &t in b"2+3=" {
            stream.append(t).unwrap();
        }
        assert_eq!(stream.len(), 4);
        assert_eq!(stream.drain_to_string(4).as_str(), "2+3");
        assert!(stream.is_empty());
    }

    #[test]
    fn expected_len_bounds_the_copy() {
        let mut stream: TokenStream<8> = TokenStream::new();
        for &t in b"12345" {
            stream.append(t).unwrap();
        }
        assert_eq!(stream.drain_to_string(3).as_str(), "123");
        assert!(stream.is_empty());
    }

    #[test]
    fn empty_drain_is_empty() {
        let mut stream: TokenStream<4> = TokenStream::new();
        assert_eq!(stream.drain_to_string(10).as_str(), "");
        assert_eq!(stream.remaining(), 4);
    }

    #[test]
    fn full_stream_rejects_appends() {
        let mut stream: TokenStream<3> = TokenStream::new();
        stream.append(b'1').unwrap();
        stream.append(b'2').unwrap();
        stream.append(b'=').unwrap();
        assert_eq!(stream.append(b'3'), Err(InputError::ExpressionFull));
        assert_eq!(stream.drain_to_string(3).as_str(), "12");
    }

    #[test]
    fn non_ascii_is_rejected() {
        let mut stream: TokenStream<4> = TokenStream::new();
        assert_eq!(stream.append(0xF7), Err(InputError::InvalidToken(0xF7)));
        assert!(stream.is_empty());
    }

    #[test]
    fn drains_are_independent() {
        let mut stream: TokenStream<16> = TokenStream::default();
        for &t in b"sqrt(4)=" {
            stream.append(t).unwrap();
        }
        assert_eq!(stream.drain_to_string(8).as_str(), "sqrt(4)");
        for &t in b"pi=" {
            stream.append(t).unwrap();
        }
        assert_eq!(stream.drain_to_string(3).as_str(), "pi");
    }
}
