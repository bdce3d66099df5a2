//! Monotonic identifier counters
//!
//! Registries hand out identities from an `IdCounter`. Zero is reserved as
//! "no id requested", so the first id handed out is 1. When records are
//! restored with explicit ids the counter is fast-forwarded past them so
//! freshly allocated ids never collide with restored ones.

use core::fmt;

/// Monotonic 64-bit id counter
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct IdCounter {
    last: u64,
}

impl IdCounter {
    /// Create a counter whose first id will be 1
    #[inline]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Create a counter that resumes after `last`
    #[inline]
    pub const fn starting_after(last: u64) -> Self {
        Self { last }
    }

    /// Allocate the next id
    #[inline]
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// The most recently allocated (or observed) id
    #[inline]
    pub const fn last(&self) -> u64 {
        self.last
    }

    /// Make sure `id` will never be handed out again
    #[inline]
    pub fn observe(&mut self, id: u64) {
        if id > self.last {
            self.last = id;
        }
    }

    /// Overwrite the counter state (used when restoring a saved counter)
    #[inline]
    pub fn reset(&mut self, last: u64) {
        self.last = last;
    }
}

impl fmt::Debug for IdCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdCounter(last={})", self.last)
    }
}
