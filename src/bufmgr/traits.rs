//! Buffer manager traits and errors.
//!
//! These define the backend interface without pulling in any driver
//! dependency, so memory objects depend on traits, not implementations.

use thiserror::Error;

/// Failures reported by a backing buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The requested mapping conflicts with an active mapping on the other
    /// channel.
    #[error("buffer is already mapped through another channel")]
    AlreadyMapped,
    /// Unmap without a matching map.
    #[error("buffer is not mapped")]
    NotMapped,
    /// Unpin without a matching pin.
    #[error("buffer is not pinned")]
    NotPinned,
    /// A sub-data access falls outside the buffer.
    #[error("access of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
    /// Pin granularity is not a power of two.
    #[error("invalid pin granularity {0}")]
    BadGranularity(usize),
}

/// An opaque allocation handed out by a [`BufferManager`].
///
/// A backing buffer is exclusively owned by one memory object.
pub trait BackingBuffer: Send {
    /// Debug label given at allocation time.
    fn label(&self) -> &str;

    /// Size in bytes.
    fn size(&self) -> usize;

    /// Alignment of the allocation start.
    fn alignment(&self) -> usize;

    /// Map for CPU access. Nested CPU maps are counted.
    fn map(&mut self, write_enable: bool) -> Result<(), BufferError>;

    /// Undo one [`map`](Self::map).
    fn unmap(&mut self) -> Result<(), BufferError>;

    /// Map through the graphics translation table. Cannot be combined
    /// with a live CPU mapping.
    fn map_gtt(&mut self) -> Result<(), BufferError>;

    /// Undo one [`map_gtt`](Self::map_gtt).
    fn unmap_gtt(&mut self) -> Result<(), BufferError>;

    /// Start of the mapped range, or `None` while unmapped.
    fn virtual_address(&mut self) -> Option<*mut u8>;

    /// The mapped range as a slice, or `None` while unmapped.
    fn mapped_bytes(&mut self) -> Option<&mut [u8]>;

    /// Fix the allocation at a `granularity`-aligned device offset and
    /// return that offset.
    fn pin(&mut self, granularity: usize) -> Result<u64, BufferError>;

    /// Undo one [`pin`](Self::pin).
    fn unpin(&mut self) -> Result<(), BufferError>;

    /// Whether the buffer is currently pinned.
    fn is_pinned(&self) -> bool;

    /// Upload `src` at `offset` without an explicit mapping.
    fn write_subdata(&mut self, offset: usize, src: &[u8]) -> Result<(), BufferError>;

    /// Download into `dst` from `offset` without an explicit mapping.
    fn read_subdata(&self, offset: usize, dst: &mut [u8]) -> Result<(), BufferError>;
}

/// Source of backing buffers.
///
/// This trait is object-safe for use with `Arc<dyn BufferManager>`.
pub trait BufferManager: Send + Sync {
    /// Allocate `size` bytes aligned to `alignment`. `None` means the
    /// manager could not satisfy the request.
    fn allocate(&self, label: &str, size: usize, alignment: usize)
        -> Option<Box<dyn BackingBuffer>>;

    /// Return a buffer to the manager.
    fn release(&self, buffer: Box<dyn BackingBuffer>);
}

/// Bounds check shared by backends for sub-data access.
pub(crate) fn check_range(offset: usize, len: usize, size: usize) -> Result<(), BufferError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(BufferError::OutOfBounds { offset, len, size }),
    }
}
