//! Buffer manager interface.
//!
//! The memory-object layer never touches physical memory directly. It asks
//! a [`BufferManager`] for opaque [`BackingBuffer`]s and drives mapping,
//! pinning and uploads through them.
//!
//! ## Backends
//! - [`HostBufferManager`]: host-memory backend for tests and tooling.
//!   Other backends (DRM, GEM) implement the same traits outside this crate.

pub mod traits;
pub use traits::{BackingBuffer, BufferError, BufferManager};

pub mod host;
pub use host::{HostBuffer, HostBufferManager, HostBufferStats};
