//! Contexts: one device connection shared by many memory objects.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bufmgr::BufferManager;
use crate::config::DeviceInfo;
use crate::format::{FormatCatalog, StandardFormats};
use crate::registry::{Registry, RegistryEntry, RegistryKey};
use crate::object::MemObjectType;
use crate::sync::mutex::Mutex;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique context identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Raw value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A compute context.
///
/// Memory objects hold an `Arc<Context>`, so a context lives as long as
/// any of its objects. The registry only lists objects, it does not keep
/// them alive.
pub struct Context {
    id: ContextId,
    device: DeviceInfo,
    bufmgr: Arc<dyn BufferManager>,
    formats: Box<dyn FormatCatalog>,
    /// The only context-level lock. Guards registry links only.
    registry: Mutex<Registry>,
}

impl Context {
    /// Create a context using the standard format catalog.
    pub fn new(device: DeviceInfo, bufmgr: Arc<dyn BufferManager>) -> Arc<Self> {
        Self::with_formats(device, bufmgr, Box::new(StandardFormats))
    }

    /// Create a context with a custom format catalog.
    pub fn with_formats(
        device: DeviceInfo,
        bufmgr: Arc<dyn BufferManager>,
        formats: Box<dyn FormatCatalog>,
    ) -> Arc<Self> {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        mo_debug!("context {} created (gen {})", id.0, device.hardware_generation);
        Arc::new(Self {
            id,
            device,
            bufmgr,
            formats,
            registry: Mutex::new(Registry::new()),
        })
    }

    /// Identifier of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Device descriptor.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Buffer manager backing this context.
    pub fn buffer_manager(&self) -> &Arc<dyn BufferManager> {
        &self.bufmgr
    }

    /// Format catalog.
    pub fn formats(&self) -> &dyn FormatCatalog {
        self.formats.as_ref()
    }

    /// Strong references to the context, including one per live object.
    pub fn reference_count(this: &Arc<Self>) -> usize {
        Arc::strong_count(this)
    }

    /// Number of live memory objects.
    pub fn object_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Live memory objects, newest first.
    pub fn live_objects(&self) -> Vec<RegistryEntry> {
        self.registry.lock().entries()
    }

    pub(crate) fn register(&self, kind: MemObjectType, size: usize) -> RegistryKey {
        self.registry.lock().insert(kind, size)
    }

    pub(crate) fn unregister(&self, key: RegistryKey) -> bool {
        self.registry.lock().remove(key)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("objects", &self.object_count())
            .finish_non_exhaustive()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        mo_debug!("context {} destroyed", self.id.0);
    }
}
