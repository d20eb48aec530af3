//! Memory objects: lifecycle, mapping and pinning.
//!
//! A memory object carries an explicit reference count on top of Rust's
//! own ownership. `Arc<MemObject>` keeps the struct reachable; the count
//! decides when the backing buffer goes back to the buffer manager. The
//! release that drives the count to zero tears the object down exactly
//! once, and every later operation reports [`MemError::InvalidMemObject`].

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::alloc::{release_backing, PAGE_ALIGNMENT};
use crate::bufmgr::{BackingBuffer, BufferError};
use crate::context::{Context, ContextId};
use crate::error::{MemError, MemResult};
use crate::flags::MemFlags;
use crate::format::ImageFormat;
use crate::registry::RegistryKey;
use crate::sync::mutex::Mutex;
use crate::sync::refcount::{RefCount, Released};
use crate::tiling::TilingMode;

thread_local! {
    /// Objects whose mapped view is lent to a `with_mapped` callback on this
    /// thread. Their state lock is held until the callback returns.
    static LENT: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks an object as lent for the guard's lifetime.
struct LendGuard(usize);

impl LendGuard {
    fn new(addr: usize) -> Self {
        LENT.with(|lent| lent.borrow_mut().push(addr));
        Self(addr)
    }
}

impl Drop for LendGuard {
    fn drop(&mut self) {
        LENT.with(|lent| {
            let mut lent = lent.borrow_mut();
            if let Some(i) = lent.iter().rposition(|&a| a == self.0) {
                lent.swap_remove(i);
            }
        });
    }
}

/// Kind of memory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemObjectType {
    Buffer,
    Image2D,
    Image3D,
    Image2DArray,
    Image1D,
    Image1DArray,
    Image1DBuffer,
}

impl MemObjectType {
    /// OpenCL object type code.
    pub fn raw(self) -> u32 {
        match self {
            MemObjectType::Buffer => 0x10F0,
            MemObjectType::Image2D => 0x10F1,
            MemObjectType::Image3D => 0x10F2,
            MemObjectType::Image2DArray => 0x10F3,
            MemObjectType::Image1D => 0x10F4,
            MemObjectType::Image1DArray => 0x10F5,
            MemObjectType::Image1DBuffer => 0x10F6,
        }
    }

    /// Whether this kind is an image.
    pub fn is_image(self) -> bool {
        self != MemObjectType::Buffer
    }
}

/// Layout metadata of an image object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    /// Aligned row pitch in device memory.
    pub row_pitch: usize,
    /// Aligned number of rows per slice.
    pub aligned_height: usize,
    /// Bytes per slice in device memory.
    pub slice_size: usize,
    pub bytes_per_pixel: usize,
    pub format: ImageFormat,
    /// Device surface format code.
    pub device_code: u32,
    pub tiling: TilingMode,
}

/// Mutable part of an object. Emptied by destruction.
struct ObjectState {
    buffer: Option<Box<dyn BackingBuffer>>,
    context: Option<Arc<Context>>,
}

/// A buffer or image allocation owned by a context.
pub struct MemObject {
    kind: MemObjectType,
    flags: MemFlags,
    size: usize,
    image: Option<ImageInfo>,
    key: RegistryKey,
    context_id: ContextId,
    ref_count: RefCount,
    map_count: AtomicU32,
    state: Mutex<ObjectState>,
}

impl MemObject {
    pub(crate) fn new(
        kind: MemObjectType,
        flags: MemFlags,
        size: usize,
        image: Option<ImageInfo>,
        key: RegistryKey,
        context: Arc<Context>,
        buffer: Box<dyn BackingBuffer>,
    ) -> Self {
        Self {
            kind,
            flags,
            size,
            image,
            key,
            context_id: context.id(),
            ref_count: RefCount::new(),
            map_count: AtomicU32::new(0),
            state: Mutex::new(ObjectState {
                buffer: Some(buffer),
                context: Some(context),
            }),
        }
    }

    pub fn kind(&self) -> MemObjectType {
        self.kind
    }

    pub fn flags(&self) -> MemFlags {
        self.flags
    }

    /// Size of the backing allocation in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Image layout, `None` for buffers.
    pub fn image(&self) -> Option<&ImageInfo> {
        self.image.as_ref()
    }

    /// Key of this object in its context's registry.
    pub fn registry_key(&self) -> RegistryKey {
        self.key
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Owning context, while the object is alive.
    pub fn context(&self) -> MemResult<Arc<Context>> {
        self.check_not_lent()?;
        self.state
            .lock()
            .context
            .clone()
            .ok_or(MemError::InvalidMemObject)
    }

    /// Current reference count. Zero once destroyed.
    pub fn reference_count(&self) -> u32 {
        self.ref_count.get()
    }

    /// Number of outstanding CPU and GTT mappings.
    pub fn map_count(&self) -> u32 {
        self.map_count.load(Ordering::Relaxed)
    }

    /// Whether the last reference has been released.
    pub fn is_destroyed(&self) -> bool {
        self.ref_count.is_dead()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Add a reference. Lock-free.
    pub fn retain(&self) -> MemResult<()> {
        self.ref_count
            .retain()
            .map(|_| ())
            .ok_or(MemError::InvalidMemObject)
    }

    /// Drop a reference. Returns `true` if this call destroyed the object.
    pub fn release(&self) -> MemResult<bool> {
        self.check_not_lent()?;
        match self.ref_count.release() {
            Some(Released::Shared(_)) => Ok(false),
            Some(Released::Last) => {
                self.destroy();
                Ok(true)
            }
            None => {
                mo_emit!(MO004);
                Err(MemError::InvalidMemObject)
            }
        }
    }

    /// Return the backing buffer, unlink from the registry and drop the
    /// context reference. The per-object lock is released before the
    /// registry lock is taken.
    fn destroy(&self) {
        let (buffer, context) = {
            let mut state = self.state.lock();
            (state.buffer.take(), state.context.take())
        };

        if let (Some(buffer), Some(context)) = (buffer, context) {
            mo_debug!("destroying {:?} of {} bytes", self.kind, self.size);
            release_backing(&context, self.key, buffer);
        }
    }

    /// Run `f` on the live backing buffer.
    fn with_buffer<R>(
        &self,
        f: impl FnOnce(&mut dyn BackingBuffer) -> MemResult<R>,
    ) -> MemResult<R> {
        self.check_not_lent()?;
        let mut state = self.state.lock();
        match state.buffer.as_mut() {
            Some(buffer) => f(&mut **buffer),
            None => Err(MemError::InvalidMemObject),
        }
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    /// Refuse calls made from inside this object's own `with_mapped`
    /// callback, which would otherwise deadlock on the state lock.
    fn check_not_lent(&self) -> MemResult<()> {
        let addr = self.addr();
        if LENT.with(|lent| lent.borrow().contains(&addr)) {
            mo_emit!(MO102);
            return Err(MemError::MapFailure);
        }
        Ok(())
    }

    // =========================================================================
    // Mapping
    // =========================================================================

    /// Map for CPU access. The pointer stays valid until [`unmap`](Self::unmap)
    /// and must not outlive the object.
    pub fn map(&self) -> MemResult<*mut u8> {
        let ptr = self.with_buffer(|buffer| {
            buffer.map(true).map_err(mapping_error)?;
            match buffer.virtual_address() {
                Some(ptr) => Ok(ptr),
                None => {
                    buffer.unmap()?;
                    Err(MemError::MapFailure)
                }
            }
        })?;
        self.map_count.fetch_add(1, Ordering::Relaxed);
        Ok(ptr)
    }

    pub fn unmap(&self) -> MemResult<()> {
        self.with_buffer(|buffer| Ok(buffer.unmap()?))?;
        self.map_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }

    /// Map through the graphics translation table. Cannot be nested with a
    /// CPU mapping of the same object.
    pub fn map_gtt(&self) -> MemResult<*mut u8> {
        let ptr = self.with_buffer(|buffer| {
            buffer.map_gtt().map_err(mapping_error)?;
            match buffer.virtual_address() {
                Some(ptr) => Ok(ptr),
                None => {
                    buffer.unmap_gtt()?;
                    Err(MemError::MapFailure)
                }
            }
        })?;
        self.map_count.fetch_add(1, Ordering::Relaxed);
        Ok(ptr)
    }

    pub fn unmap_gtt(&self) -> MemResult<()> {
        self.with_buffer(|buffer| Ok(buffer.unmap_gtt()?))?;
        self.map_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }

    /// Map, run `f` over the mapped bytes, unmap.
    ///
    /// # Locking
    ///
    /// The object stays locked while `f` runs, so no other thread can map
    /// it or tear it down underneath the slice. Other threads touching
    /// the object block until `f` returns. Calls on the same object made
    /// from inside `f` fail with [`MemError::MapFailure`] instead of
    /// deadlocking. Other objects can be used freely.
    pub fn with_mapped<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> MemResult<R> {
        self.with_buffer(|buffer| {
            buffer.map(true).map_err(mapping_error)?;
            let result = {
                let _lent = LendGuard::new(self.addr());
                buffer.mapped_bytes().map(f)
            };
            buffer.unmap()?;
            result.ok_or(MemError::MapFailure)
        })
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the object.
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> MemResult<()> {
        self.with_buffer(|buffer| Ok(buffer.read_subdata(offset, dst)?))
    }

    /// Copy `src` into the object at `offset`.
    pub fn write(&self, offset: usize, src: &[u8]) -> MemResult<()> {
        self.with_buffer(|buffer| Ok(buffer.write_subdata(offset, src)?))
    }

    // =========================================================================
    // Pinning
    // =========================================================================

    /// Fix the allocation at a page-aligned device location. Requires
    /// [`MemFlags::PINNABLE`].
    pub fn pin(&self) -> MemResult<()> {
        if !self.flags.contains(MemFlags::PINNABLE) {
            return Err(MemError::InvalidMemObject);
        }
        self.with_buffer(|buffer| {
            let offset = buffer.pin(PAGE_ALIGNMENT)?;
            mo_debug!("pinned {:?} at device offset {:#x}", self.kind, offset);
            Ok(())
        })
    }

    pub fn unpin(&self) -> MemResult<()> {
        if !self.flags.contains(MemFlags::PINNABLE) {
            return Err(MemError::InvalidMemObject);
        }
        self.with_buffer(|buffer| Ok(buffer.unpin()?))
    }

    /// Whether the backing buffer is pinned.
    pub fn is_pinned(&self) -> bool {
        self.with_buffer(|buffer| Ok(buffer.is_pinned()))
            .unwrap_or(false)
    }

    /// Pin for the lifetime of the returned guard.
    pub fn pin_scoped(&self) -> MemResult<PinGuard<'_>> {
        self.pin()?;
        Ok(PinGuard { object: self })
    }
}

/// Report mixed mapping channels as a map failure.
fn mapping_error(err: BufferError) -> MemError {
    match err {
        BufferError::AlreadyMapped => {
            mo_emit!(MO101);
            MemError::MapFailure
        }
        other => MemError::Backend(other),
    }
}

impl Drop for MemObject {
    fn drop(&mut self) {
        if !self.ref_count.is_dead() {
            mo_emit!(MO003);
            self.destroy();
        }
    }
}

impl fmt::Debug for MemObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemObject")
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("size", &self.size)
            .field("image", &self.image)
            .field("ref_count", &self.ref_count.get())
            .field("context", &self.context_id)
            .finish()
    }
}

/// RAII guard for pinning a memory object.
pub struct PinGuard<'a> {
    object: &'a MemObject,
}

impl<'a> PinGuard<'a> {
    /// The pinned object.
    pub fn object(&self) -> &'a MemObject {
        self.object
    }
}

impl<'a> Drop for PinGuard<'a> {
    fn drop(&mut self) {
        // Fails only if the object was destroyed while pinned.
        let _ = self.object.unpin();
    }
}
