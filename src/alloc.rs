//! Allocation service: validates a request, obtains backing memory and
//! registers the new object with its context.

use std::sync::Arc;

use crate::bufmgr::BackingBuffer;
use crate::context::Context;
use crate::error::{MemError, MemResult};
use crate::flags::MemFlags;
use crate::object::{ImageInfo, MemObject, MemObjectType};
use crate::registry::RegistryKey;
use crate::util::size::{human_bytes, kib};

/// Alignment for ordinary allocations.
const DEFAULT_ALIGNMENT: usize = 64;

/// Alignment for pinnable or tiled allocations.
pub(crate) const PAGE_ALIGNMENT: usize = kib(4);

const LABEL: &str = "gpumem object";

/// A registered allocation that has not become a [`MemObject`] yet.
///
/// Dropping it releases the backing buffer and unlinks the registry entry,
/// so a constructor that fails after allocating cannot leak either.
pub(crate) struct Allocation {
    context: Option<Arc<Context>>,
    buffer: Option<Box<dyn BackingBuffer>>,
    key: RegistryKey,
    kind: MemObjectType,
    flags: MemFlags,
    size: usize,
}

impl Allocation {
    /// The backing buffer, for initial uploads.
    pub(crate) fn buffer_mut(&mut self) -> MemResult<&mut dyn BackingBuffer> {
        match self.buffer.as_mut() {
            Some(buffer) => Ok(&mut **buffer),
            None => Err(MemError::InvalidMemObject),
        }
    }

    /// Finish construction.
    pub(crate) fn into_object(mut self, image: Option<ImageInfo>) -> MemResult<Arc<MemObject>> {
        let (context, buffer) = match (self.context.take(), self.buffer.take()) {
            (Some(context), Some(buffer)) => (context, buffer),
            _ => return Err(MemError::InvalidMemObject),
        };
        Ok(Arc::new(MemObject::new(
            self.kind, self.flags, self.size, image, self.key, context, buffer,
        )))
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if let (Some(context), Some(buffer)) = (self.context.take(), self.buffer.take()) {
            mo_debug!("discarding partially constructed {:?}", self.kind);
            release_backing(&context, self.key, buffer);
        }
    }
}

/// Allocate and register `size` bytes of backing memory.
pub(crate) fn allocate(
    context: &Arc<Context>,
    flags: MemFlags,
    kind: MemObjectType,
    size: usize,
    is_tiled: bool,
) -> MemResult<Allocation> {
    if flags.intersects(MemFlags::ZERO_COPY) {
        mo_emit!(MO001);
        return Err(MemError::NotSupported("USE_HOST_PTR and ALLOC_HOST_PTR"));
    }

    if size == 0 || size > context.device().max_alloc_size {
        return Err(MemError::InvalidBufferSize);
    }

    let alignment = if flags.contains(MemFlags::PINNABLE) || is_tiled {
        PAGE_ALIGNMENT
    } else {
        DEFAULT_ALIGNMENT
    };

    let buffer = match context.buffer_manager().allocate(LABEL, size, alignment) {
        Some(buffer) => buffer,
        None => {
            mo_emit!(MO002);
            return Err(MemError::AllocationFailure);
        }
    };

    let key = context.register(kind, size);
    mo_debug!(
        "allocated {:?} of {} (align {}) in context {}",
        kind,
        human_bytes(size),
        alignment,
        context.id().get()
    );

    Ok(Allocation {
        context: Some(Arc::clone(context)),
        buffer: Some(buffer),
        key,
        kind,
        flags,
        size,
    })
}

/// Give the buffer back to the manager and unlink the registry entry.
pub(crate) fn release_backing(context: &Context, key: RegistryKey, buffer: Box<dyn BackingBuffer>) {
    context.buffer_manager().release(buffer);
    if !context.unregister(key) {
        mo_emit!(MO901);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bufmgr::HostBufferManager;
    use crate::config::DeviceInfo;

    fn setup() -> (Arc<HostBufferManager>, Arc<Context>) {
        let mgr = Arc::new(HostBufferManager::new());
        let ctx = Context::new(DeviceInfo::gen7().with_max_alloc_size(1 << 20), mgr.clone());
        (mgr, ctx)
    }

    #[test]
    fn test_alignment_policy() {
        let (_mgr, ctx) = setup();

        let mut plain = allocate(&ctx, MemFlags::empty(), MemObjectType::Buffer, 100, false).unwrap();
        assert_eq!(plain.buffer_mut().unwrap().alignment(), 64);

        let mut pinnable = allocate(&ctx, MemFlags::PINNABLE, MemObjectType::Buffer, 100, false).unwrap();
        assert_eq!(pinnable.buffer_mut().unwrap().alignment(), 4096);

        let mut tiled = allocate(&ctx, MemFlags::empty(), MemObjectType::Image2D, 4096, true).unwrap();
        assert_eq!(tiled.buffer_mut().unwrap().alignment(), 4096);
    }

    #[test]
    fn test_dropped_allocation_is_released() {
        let (mgr, ctx) = setup();
        {
            let _a = allocate(&ctx, MemFlags::empty(), MemObjectType::Buffer, 64, false).unwrap();
            assert_eq!(ctx.object_count(), 1);
            assert_eq!(Context::reference_count(&ctx), 2);
        }
        assert_eq!(ctx.object_count(), 0);
        assert_eq!(Context::reference_count(&ctx), 1);
        assert_eq!(mgr.stats().live_buffers(), 0);
    }

    #[test]
    fn test_size_limits() {
        let (mgr, ctx) = setup();
        let max = ctx.device().max_alloc_size;

        for size in [0, max + 1] {
            let err = allocate(&ctx, MemFlags::empty(), MemObjectType::Buffer, size, false).err();
            assert_eq!(err, Some(MemError::InvalidBufferSize));
        }
        assert!(allocate(&ctx, MemFlags::empty(), MemObjectType::Buffer, max, false).is_ok());
        assert_eq!(mgr.stats().allocations, 1);
    }

    #[test]
    fn test_zero_copy_modes_not_supported() {
        let (mgr, ctx) = setup();
        for flags in [MemFlags::USE_HOST_PTR, MemFlags::ALLOC_HOST_PTR | MemFlags::READ_WRITE] {
            let err = allocate(&ctx, flags, MemObjectType::Buffer, 64, false).err();
            assert!(matches!(err, Some(MemError::NotSupported(_))));
        }
        assert_eq!(mgr.stats().allocations, 0);
        assert_eq!(ctx.object_count(), 0);
    }
}
