//! Synchronization primitives.
//!
//! The registry lock wraps std or parking_lot mutexes; reference counts
//! are plain atomics and never take a lock.

pub(crate) mod mutex;
pub(crate) mod refcount;
