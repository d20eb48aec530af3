//! Error types returned by memory-object operations.

use thiserror::Error;

use crate::bufmgr::BufferError;

/// Result alias for memory-object operations.
pub type MemResult<T> = Result<T, MemError>;

/// Errors returned by memory-object construction, mapping and queries.
///
/// None of these are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemError {
    /// Host data missing, unexpected, or too short for the request.
    #[error("invalid host pointer")]
    InvalidHostPtr,
    /// Requested size is zero or above the device allocation limit.
    #[error("invalid buffer size")]
    InvalidBufferSize,
    /// The buffer manager could not provide backing memory.
    #[error("memory object allocation failure")]
    AllocationFailure,
    /// Image format has no pixel size or no device encoding.
    #[error("invalid image format descriptor")]
    InvalidImageFormatDescriptor,
    /// Image dimensions or pitches are out of range.
    #[error("invalid image size")]
    InvalidImageSize,
    /// The object is destroyed or lacks the capability for this operation.
    #[error("invalid memory object")]
    InvalidMemObject,
    /// Unknown parameter, undersized output, or malformed argument.
    #[error("invalid value")]
    InvalidValue,
    /// The request names a mode this runtime does not implement.
    #[error("not supported: {0}")]
    NotSupported(&'static str),
    /// A mapping could not be established.
    #[error("failed to map memory object")]
    MapFailure,
    /// Any other buffer manager failure.
    #[error("buffer manager error: {0}")]
    Backend(#[from] BufferError),
}

impl MemError {
    /// The OpenCL status code an API layer reports for this error.
    pub fn code(&self) -> i32 {
        match self {
            MemError::InvalidHostPtr => -37,
            MemError::InvalidBufferSize => -61,
            MemError::AllocationFailure => -4,
            MemError::InvalidImageFormatDescriptor => -39,
            MemError::InvalidImageSize => -40,
            MemError::InvalidMemObject => -38,
            MemError::InvalidValue => -30,
            MemError::NotSupported(_) => -59,
            MemError::MapFailure => -12,
            MemError::Backend(_) => -5,
        }
    }
}
