//! Fixed-capacity circular queue shared between ISRs and the main loop
//!
//! One slot is always kept free so that `read == write` unambiguously means
//! empty. Pushing into a full buffer drops the oldest unread element.
//!
//! The buffer itself is not synchronised. When an ISR and the main loop
//! share one, wrap it in `critical_section::Mutex<RefCell<_>>` so that every
//! index update happens with interrupts masked.

use core::mem::MaybeUninit;

pub struct CircularBuffer<T: Copy, const N: usize> {
    storage: [MaybeUninit<T>; N],
    read: usize,
    write: usize,
}

impl<T: Copy, const N: usize> CircularBuffer<T, N> {
    const MIN_SLOTS: () = assert!(N > 1, "a circular buffer needs at least two slots");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::MIN_SLOTS;
        Self {
            storage: [MaybeUninit::uninit(); N],
            read: 0,
            write: 0,
        }
    }

    /// Number of elements the buffer can hold at once
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        (self.write + 1) % N == self.read
    }

    pub fn len(&self) -> usize {
        (self.write + N - self.read) % N
    }

    /// Append `item`. On a full buffer the oldest element is discarded and
    /// handed back.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.storage[self.write] = MaybeUninit::new(item);
        self.write = (self.write + 1) % N;

        if self.write == self.read {
            // SAFETY: `read` trails `write`, so its slot was written by an
            // earlier push and has not been consumed yet.
            let dropped = unsafe { self.storage[self.read].assume_init() };
            self.read = (self.read + 1) % N;
            Some(dropped)
        } else {
            None
        }
    }

    /// Take the oldest element, leaving the buffer untouched when empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: every slot between `read` and `write` has been pushed.
        let item = unsafe { self.storage[self.read].assume_init() };
        self.read = (self.read + 1) % N;
        Some(item)
    }

    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }
}

impl<T: Copy, const N: usize> Default for CircularBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
