//! Atomic reference counting for memory objects.
//!
//! Retain and release never touch a lock. The count refuses to move away
//! from zero, so a destroyed object cannot be resurrected and a racing
//! release cannot underflow.

use std::sync::atomic::{AtomicU32, Ordering};

/// Outcome of a successful [`RefCount::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Other references remain.
    Shared(u32),
    /// This call dropped the last reference. Exactly one caller sees this.
    Last,
}

/// An atomic reference count that starts at one.
#[derive(Debug)]
pub struct RefCount(AtomicU32);

impl RefCount {
    /// Create a count holding one reference.
    pub const fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    /// Add a reference. Returns the new count, or `None` if the count has
    /// already reached zero.
    pub fn retain(&self) -> Option<u32> {
        self.0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                if n == 0 {
                    None
                } else {
                    n.checked_add(1)
                }
            })
            .ok()
            .map(|prev| prev + 1)
    }

    /// Drop a reference. Returns `None` if the count was already zero.
    pub fn release(&self) -> Option<Released> {
        let prev = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()?;

        if prev == 1 {
            Some(Released::Last)
        } else {
            Some(Released::Shared(prev - 1))
        }
    }

    /// Current count. Only a snapshot under concurrency.
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Whether the last reference has been released.
    pub fn is_dead(&self) -> bool {
        self.get() == 0
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}
