//! Generational arena holding every host object of an `Env`.

use std::fmt;

use super::HostObject;

/// Handle to a heap-allocated host object.
///
/// Copyable and cheap to pass around. The generation lets the heap reject
/// handles whose object has already been collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into the heap's slot table
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectHandle {
    /// Create a new object handle.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Heap storage for host objects with generational indices.
///
/// Freed slots are reused with a bumped generation. The reference count
/// here counts persistent references only; handle scopes and reachability
/// are accounted for by the collector in `Env`.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

struct HeapSlot {
    generation: u32,
    value: Option<HostObject>,
    ref_count: u32,
}

impl HeapSlot {
    fn matches(&self, handle: ObjectHandle) -> bool {
        self.generation == handle.generation && self.value.is_some()
    }
}

impl ObjectHeap {
    /// Create a new empty object heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate a new object. It starts with no persistent references.
    pub fn allocate(&mut self, object: HostObject) -> ObjectHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(object);
            slot.ref_count = 0;
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(object),
                ref_count: 0,
            });
            ObjectHandle::new(index, 0)
        }
    }

    /// Check whether a handle still refers to a live object.
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.matches(handle))
    }

    /// Get an immutable reference to an object.
    pub fn get(&self, handle: ObjectHandle) -> Option<&HostObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Get a mutable reference to an object.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut HostObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Increment the persistent reference count.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.matches(handle)
        {
            slot.ref_count = slot.ref_count.saturating_add(1);
            return true;
        }
        false
    }

    /// Decrement the persistent reference count.
    ///
    /// Returns the remaining count, or `None` for a stale handle. An object
    /// at zero is not freed here; the collector decides.
    pub fn release(&mut self, handle: ObjectHandle) -> Option<u32> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if !slot.matches(handle) {
            return None;
        }
        slot.ref_count = slot.ref_count.saturating_sub(1);
        Some(slot.ref_count)
    }

    /// Remove an object, returning it so the caller can finalize it.
    pub fn free(&mut self, handle: ObjectHandle) -> Option<HostObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let object = slot.value.take()?;
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        Some(object)
    }

    /// Get the persistent reference count for an object.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.matches(handle) {
            Some(slot.ref_count)
        } else {
            None
        }
    }

    /// Handles of every live object.
    pub fn live_handles(&self) -> Vec<ObjectHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some())
            .map(|(index, slot)| ObjectHandle::new(index as u32, slot.generation))
            .collect()
    }

    /// Handles of live objects held by at least one persistent reference.
    pub fn referenced(&self) -> Vec<ObjectHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some() && slot.ref_count > 0)
            .map(|(index, slot)| ObjectHandle::new(index as u32, slot.generation))
            .collect()
    }

    /// Total slots, live or free.
    pub fn slot_capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Whether the heap holds no live objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}
