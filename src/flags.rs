//! Memory object creation flags.

use bitflags::bitflags;

bitflags! {
    /// Access and host-pointer semantics requested at creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemFlags: u64 {
        /// Kernels may read and write
        const READ_WRITE = 1 << 0;
        /// Kernels may only write
        const WRITE_ONLY = 1 << 1;
        /// Kernels may only read
        const READ_ONLY = 1 << 2;
        /// Use caller memory as backing store (unsupported)
        const USE_HOST_PTR = 1 << 3;
        /// Allocate host-accessible backing store (unsupported)
        const ALLOC_HOST_PTR = 1 << 4;
        /// Initialize from caller data
        const COPY_HOST_PTR = 1 << 5;
        /// Allow pinning at a fixed device location
        const PINNABLE = 1 << 10;
    }
}

impl MemFlags {
    /// Host-pointer modes that need zero-copy backing memory.
    pub const ZERO_COPY: MemFlags = MemFlags::USE_HOST_PTR.union(MemFlags::ALLOC_HOST_PTR);
}
