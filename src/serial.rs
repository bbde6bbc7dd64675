//! Serial numbers tagging focus changes and button/key presses
//!
//! A serial is a 32-bit counter shared by every seat of a display. Clients
//! echo serials back in focus-sensitive requests (cursor changes, grabs) and
//! the seat rejects anything that does not match the current focus epoch.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A serial handed out by a [`SerialCounter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Serial(u32);

impl Serial {
    pub const fn new(raw: u32) -> Self {
        Serial(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether a request carrying `request` may act on state stamped with
    /// `self`.
    ///
    /// Anything more than half the serial space behind `self` is treated as
    /// stale, and anything ahead of it as not yet issued.
    pub const fn accepts(self, request: Serial) -> bool {
        self.0.wrapping_sub(request.0) <= u32::MAX / 2
    }
}

impl From<u32> for Serial {
    fn from(raw: u32) -> Self {
        Serial(raw)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> Self {
        serial.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared serial source
///
/// Clones share one counter, so every seat created from the same counter
/// draws from the same sequence.
#[derive(Debug, Clone, Default)]
pub struct SerialCounter {
    serial: Arc<AtomicU32>,
}

impl SerialCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter whose next serial is `raw + 1`.
    pub fn starting_at(raw: u32) -> Self {
        Self {
            serial: Arc::new(AtomicU32::new(raw)),
        }
    }

    /// Issues a fresh serial. Wraps at `u32::MAX`.
    pub fn next_serial(&self) -> Serial {
        Serial(self.serial.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
    }

    /// Last issued serial.
    pub fn current(&self) -> Serial {
        Serial(self.serial.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn counter_is_shared_between_clones() {
        let a = SerialCounter::new();
        let b = a.clone();
        assert_eq!(a.next_serial(), Serial::new(1));
        assert_eq!(b.next_serial(), Serial::new(2));
        assert_eq!(a.current(), Serial::new(2));
    }

    #[test]
    fn counter_wraps() {
        let counter = SerialCounter::starting_at(u32::MAX);
        assert_eq!(counter.next_serial(), Serial::new(0));
    }

    #[test]
    fn acceptance_window() {
        let current = Serial::new(1000);
        assert!(current.accepts(Serial::new(1000)));
        assert!(current.accepts(Serial::new(999)));
        assert!(!current.accepts(Serial::new(1001)));
        assert!(!current.accepts(Serial::new(1000u32.wrapping_sub(u32::MAX / 2 + 1))));
        assert!(current.accepts(Serial::new(1000u32.wrapping_sub(u32::MAX / 2))));
    }

    proptest! {
        #[test]
        fn acceptance_holds_across_wraparound(current in any::<u32>(), back in 0u32..=u32::MAX / 2) {
            let s = Serial::new(current);
            prop_assert!(s.accepts(Serial::new(current.wrapping_sub(back))));
            prop_assert!(!s.accepts(Serial::new(current.wrapping_add(1))));
            prop_assert!(!s.accepts(Serial::new(current.wrapping_sub(u32::MAX / 2 + 1))));
        }
    }
}
