//! Host-memory buffer manager.
//!
//! Backs every allocation with zero-filled RAM and simulates the mapping
//! and pinning rules of a GEM-style driver. Used by tests, benches and
//! tools that need memory objects without GPU hardware.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::traits::{check_range, BackingBuffer, BufferError, BufferManager};
use crate::util::layout::{align_offset, align_up, is_aligned};

/// A backing buffer living in host memory.
#[derive(Debug)]
pub struct HostBuffer {
    label: String,
    /// Over-allocated so the visible range can start on `alignment`.
    storage: Vec<u8>,
    start: usize,
    size: usize,
    alignment: usize,
    cpu_maps: u32,
    gtt_maps: u32,
    pin_count: u32,
    pinned_at: Option<u64>,
    /// Shared bump pointer for simulated device offsets.
    next_offset: Arc<AtomicU64>,
}

impl HostBuffer {
    fn new(label: &str, size: usize, alignment: usize, next_offset: Arc<AtomicU64>) -> Self {
        let storage = vec![0u8; size + alignment];
        let start = align_offset(storage.as_ptr() as usize, alignment);
        debug_assert!(is_aligned(storage.as_ptr() as usize + start, alignment));
        Self {
            label: label.to_owned(),
            storage,
            start,
            size,
            alignment,
            cpu_maps: 0,
            gtt_maps: 0,
            pin_count: 0,
            pinned_at: None,
            next_offset,
        }
    }

    fn is_mapped(&self) -> bool {
        self.cpu_maps > 0 || self.gtt_maps > 0
    }

    fn bytes(&self) -> &[u8] {
        &self.storage[self.start..self.start + self.size]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.start + self.size]
    }

    /// Device offset of the pinned allocation, if pinned.
    pub fn pinned_offset(&self) -> Option<u64> {
        self.pinned_at
    }
}

impl BackingBuffer for HostBuffer {
    fn label(&self) -> &str {
        &self.label
    }

    fn size(&self) -> usize {
        self.size
    }

    fn alignment(&self) -> usize {
        self.alignment
    }

    fn map(&mut self, _write_enable: bool) -> Result<(), BufferError> {
        if self.gtt_maps > 0 {
            return Err(BufferError::AlreadyMapped);
        }
        self.cpu_maps += 1;
        Ok(())
    }

    fn unmap(&mut self) -> Result<(), BufferError> {
        if self.cpu_maps == 0 {
            return Err(BufferError::NotMapped);
        }
        self.cpu_maps -= 1;
        Ok(())
    }

    fn map_gtt(&mut self) -> Result<(), BufferError> {
        if self.cpu_maps > 0 {
            return Err(BufferError::AlreadyMapped);
        }
        self.gtt_maps += 1;
        Ok(())
    }

    fn unmap_gtt(&mut self) -> Result<(), BufferError> {
        if self.gtt_maps == 0 {
            return Err(BufferError::NotMapped);
        }
        self.gtt_maps -= 1;
        Ok(())
    }

    fn virtual_address(&mut self) -> Option<*mut u8> {
        self.mapped_bytes().map(|bytes| bytes.as_mut_ptr())
    }

    fn mapped_bytes(&mut self) -> Option<&mut [u8]> {
        if self.is_mapped() {
            Some(self.bytes_mut())
        } else {
            None
        }
    }

    fn pin(&mut self, granularity: usize) -> Result<u64, BufferError> {
        if !granularity.is_power_of_two() {
            return Err(BufferError::BadGranularity(granularity));
        }

        if let Some(offset) = self.pinned_at {
            self.pin_count += 1;
            return Ok(offset);
        }

        let size = self.size as u64;
        let prev = self
            .next_offset
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some(align_up(cur as usize, granularity) as u64 + size)
            })
            .unwrap_or(0);
        let offset = align_up(prev as usize, granularity) as u64;

        self.pinned_at = Some(offset);
        self.pin_count = 1;
        Ok(offset)
    }

    fn unpin(&mut self) -> Result<(), BufferError> {
        if self.pin_count == 0 {
            return Err(BufferError::NotPinned);
        }
        self.pin_count -= 1;
        if self.pin_count == 0 {
            self.pinned_at = None;
        }
        Ok(())
    }

    fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    fn write_subdata(&mut self, offset: usize, src: &[u8]) -> Result<(), BufferError> {
        check_range(offset, src.len(), self.size)?;
        self.bytes_mut()[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn read_subdata(&self, offset: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        check_range(offset, dst.len(), self.size)?;
        dst.copy_from_slice(&self.bytes()[offset..offset + dst.len()]);
        Ok(())
    }
}

/// Snapshot of [`HostBufferManager`] counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostBufferStats {
    /// Successful allocations.
    pub allocations: usize,
    /// Buffers returned through `release`.
    pub releases: usize,
    /// Refused allocations.
    pub failed_allocations: usize,
    /// Bytes currently allocated.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_bytes: usize,
}

impl HostBufferStats {
    /// Buffers allocated and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.allocations - self.releases
    }
}

/// Buffer manager backed by host memory.
#[derive(Debug)]
pub struct HostBufferManager {
    /// Upper bound on live bytes (`usize::MAX` = unlimited).
    capacity: usize,
    allocations: AtomicUsize,
    releases: AtomicUsize,
    failed_allocations: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    next_offset: Arc<AtomicU64>,
}

impl HostBufferManager {
    /// Create an unlimited manager.
    pub fn new() -> Self {
        Self::with_capacity_limit(usize::MAX)
    }

    /// Create a manager that refuses allocations once `capacity` bytes are
    /// live.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity,
            allocations: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            failed_allocations: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            next_offset: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> HostBufferStats {
        HostBufferStats {
            allocations: self.allocations.load(Ordering::Acquire),
            releases: self.releases.load(Ordering::Acquire),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
        }
    }

    /// Reserve `size` bytes against the capacity limit.
    fn reserve(&self, size: usize) -> bool {
        let reserved = self
            .live_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |live| {
                live.checked_add(size).filter(|&total| total <= self.capacity)
            });

        match reserved {
            Ok(prev) => {
                self.peak_bytes.fetch_max(prev + size, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }
}

impl Default for HostBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferManager for HostBufferManager {
    fn allocate(
        &self,
        label: &str,
        size: usize,
        alignment: usize,
    ) -> Option<Box<dyn BackingBuffer>> {
        if size == 0 || !alignment.is_power_of_two() || !self.reserve(size) {
            self.failed_allocations.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let buffer = HostBuffer::new(label, size, alignment, Arc::clone(&self.next_offset));
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Some(Box::new(buffer))
    }

    fn release(&self, buffer: Box<dyn BackingBuffer>) {
        self.live_bytes.fetch_sub(buffer.size(), Ordering::Relaxed);
        self.releases.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_aligned_and_zeroed() {
        let mgr = HostBufferManager::new();
        let mut buf = mgr.allocate("test", 100, 4096).unwrap();
        assert_eq!(buf.size(), 100);
        assert_eq!(buf.alignment(), 4096);

        buf.map(true).unwrap();
        let addr = buf.virtual_address().unwrap() as usize;
        assert_eq!(addr % 4096, 0);
        assert!(buf.mapped_bytes().unwrap().iter().all(|&b| b == 0));
        buf.unmap().unwrap();
        assert!(buf.mapped_bytes().is_none());
    }

    #[test]
    fn test_cpu_and_gtt_maps_do_not_nest() {
        let mgr = HostBufferManager::new();
        let mut buf = mgr.allocate("test", 64, 64).unwrap();

        buf.map(false).unwrap();
        assert_eq!(buf.map_gtt(), Err(BufferError::AlreadyMapped));
        buf.unmap().unwrap();

        buf.map_gtt().unwrap();
        assert_eq!(buf.map(true), Err(BufferError::AlreadyMapped));
        buf.unmap_gtt().unwrap();
        assert_eq!(buf.unmap_gtt(), Err(BufferError::NotMapped));
    }

    #[test]
    fn test_pin_offsets_are_aligned_and_stable() {
        let mgr = HostBufferManager::new();
        let mut a = mgr.allocate("a", 100, 4096).unwrap();
        let mut b = mgr.allocate("b", 100, 4096).unwrap();

        let off_a = a.pin(4096).unwrap();
        let off_b = b.pin(4096).unwrap();
        assert_eq!(off_a % 4096, 0);
        assert_eq!(off_b % 4096, 0);
        assert_ne!(off_a, off_b);

        // Nested pin keeps the location
        assert_eq!(a.pin(4096).unwrap(), off_a);
        a.unpin().unwrap();
        assert!(a.is_pinned());
        a.unpin().unwrap();
        assert!(!a.is_pinned());
        assert_eq!(a.unpin(), Err(BufferError::NotPinned));
        assert_eq!(a.pin(3), Err(BufferError::BadGranularity(3)));
    }

    #[test]
    fn test_subdata_bounds() {
        let mgr = HostBufferManager::new();
        let mut buf = mgr.allocate("test", 16, 64).unwrap();

        buf.write_subdata(4, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 6];
        buf.read_subdata(2, &mut out).unwrap();
        assert_eq!(out, [0, 0, 1, 2, 3, 4]);

        assert_eq!(
            buf.write_subdata(14, &[0; 4]),
            Err(BufferError::OutOfBounds { offset: 14, len: 4, size: 16 })
        );
    }

    #[test]
    fn test_capacity_limit_and_stats() {
        let mgr = HostBufferManager::with_capacity_limit(8192);
        let a = mgr.allocate("a", 4096, 64).unwrap();
        let b = mgr.allocate("b", 4096, 64).unwrap();
        assert!(mgr.allocate("c", 1, 64).is_none());

        mgr.release(a);
        let stats = mgr.stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.failed_allocations, 1);
        assert_eq!(stats.live_bytes, 4096);
        assert_eq!(stats.peak_bytes, 8192);
        assert_eq!(stats.live_buffers(), 1);

        mgr.release(b);
        assert_eq!(mgr.stats().live_bytes, 0);
    }
}
