//! Per-context registry of live memory objects.
//!
//! Slots are index-stable and carry a generation so a stale key can never
//! unlink a newer occupant. Live slots form a doubly linked list through
//! `prev`/`next` indices, newest first, giving O(1) insert and unlink
//! without raw pointers. The registry only records membership; it never
//! owns the objects it lists.
//!
//! All methods take `&mut self`: callers hold the context's registry lock.

use crate::object::MemObjectType;

/// Generation counter for key validation.
type Generation = u32;

/// A stable key identifying one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    index: u32,
    generation: Generation,
}

impl RegistryKey {
    /// Get the raw index (for debugging).
    pub fn raw_index(&self) -> u32 {
        self.index
    }

    /// Get the generation (for debugging).
    pub fn raw_generation(&self) -> u32 {
        self.generation
    }
}

/// What the registry knows about a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub key: RegistryKey,
    pub kind: MemObjectType,
    pub size: usize,
}

/// Internal slot.
#[derive(Debug)]
struct Slot {
    generation: Generation,
    in_use: bool,
    prev: Option<u32>,
    next: Option<u32>,
    kind: MemObjectType,
    size: usize,
}

/// Intrusive list of live memory objects.
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    head: Option<u32>,
    len: usize,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a new entry at the head of the list.
    pub fn insert(&mut self, kind: MemObjectType, size: usize) -> RegistryKey {
        let next = self.head;

        let (index, generation) = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.in_use = true;
            slot.prev = None;
            slot.next = next;
            slot.kind = kind;
            slot.size = size;
            (index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                in_use: true,
                prev: None,
                next,
                kind,
                size,
            });
            (index, 1)
        };

        if let Some(old_head) = next {
            self.slots[old_head as usize].prev = Some(index);
        }
        self.head = Some(index);
        self.len += 1;

        RegistryKey { index, generation }
    }

    /// Unlink `key`. Returns `false` if the key is stale or already removed.
    pub fn remove(&mut self, key: RegistryKey) -> bool {
        if !self.contains(key) {
            return false;
        }

        let (prev, next) = {
            let slot = &mut self.slots[key.index as usize];
            slot.in_use = false;
            (slot.prev.take(), slot.next.take())
        };

        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.slots[n as usize].prev = prev;
        }

        self.free_list.push(key.index);
        self.len -= 1;
        true
    }

    /// Check if a key refers to a live entry.
    pub fn contains(&self, key: RegistryKey) -> bool {
        self.slots
            .get(key.index as usize)
            .map_or(false, |slot| slot.in_use && slot.generation == key.generation)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Key of the most recently inserted live entry.
    pub fn head(&self) -> Option<RegistryKey> {
        self.head.map(|index| self.key_at(index))
    }

    /// Live entries, newest first.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let slot = &self.slots[index as usize];
            out.push(RegistryEntry {
                key: self.key_at(index),
                kind: slot.kind,
                size: slot.size,
            });
            cursor = slot.next;
        }
        out
    }

    fn key_at(&self, index: u32) -> RegistryKey {
        RegistryKey {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Walk the list both ways and check every link. Test support.
    #[cfg(test)]
    fn assert_consistent(&self) {
        let mut forward = Vec::new();
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let slot = &self.slots[index as usize];
            assert!(slot.in_use);
            assert_eq!(slot.prev, prev, "broken prev link at {}", index);
            forward.push(index);
            prev = Some(index);
            cursor = slot.next;
        }
        assert_eq!(forward.len(), self.len);
        assert_eq!(self.slots.iter().filter(|s| s.in_use).count(), self.len);
    }
}
