//! Handle-based object heap with a mark-and-sweep collector.
//!
//! Objects live in a dense table indexed by [`ObjectRef`] handles. Handles
//! are stable: the collector reclaims dead table entries for reuse instead
//! of moving survivors, so a reachable handle read before a collection is
//! still valid after it.
//!
//! Allocation is a safe point. When the live count crosses the collection
//! threshold, [`Heap::allocate`] first collects using the roots supplied by
//! the caller; the execution context passes the live prefix of its operand
//! stack.

use nona_core::{ObjectRef, Value, VmError, VmResult};

use crate::shape::{ShapeId, ShapeTable, SlotDescriptor, SlotId};

/// Live-object count at which allocation triggers a collection.
pub const DEFAULT_GC_THRESHOLD: usize = 1024;

/// One heap object: its layout plus its slot storage.
#[derive(Debug)]
struct ObjectData {
    shape: ShapeId,
    slots: Vec<Value>,
}

/// Counters maintained across the heap's lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapStats {
    /// Objects allocated since construction.
    pub allocated: u64,
    /// Collections performed.
    pub collections: u64,
    /// Objects reclaimed across all collections.
    pub reclaimed: u64,
}

/// The managed heap.
pub struct Heap {
    objects: Vec<Option<ObjectData>>,
    free: Vec<u32>,
    shapes: ShapeTable,
    threshold: usize,
    stats: HeapStats,
}

impl Heap {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_GC_THRESHOLD)
    }

    /// A heap that collects once the live count reaches `threshold`.
    ///
    /// A threshold of `usize::MAX` never collects on allocation, which the
    /// tests use as a no-op collector.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            objects: Vec::new(),
            free: Vec::new(),
            shapes: ShapeTable::new(),
            threshold,
            stats: HeapStats::default(),
        }
    }

    /// Allocate a fresh empty object, collecting first if the live count has
    /// reached the threshold. `roots` must cover every live reference the
    /// caller holds; anything not reachable from them is reclaimed.
    pub fn allocate(&mut self, roots: &[Value]) -> ObjectRef {
        if self.live_count() >= self.threshold {
            self.collect(roots);
        }

        self.stats.allocated += 1;
        let data = ObjectData {
            shape: ShapeId::EMPTY,
            slots: Vec::new(),
        };

        match self.free.pop() {
            Some(index) => {
                debug_assert!(self.objects[index as usize].is_none());
                self.objects[index as usize] = Some(data);
                ObjectRef::new(index)
            }
            None => {
                let index = self.objects.len() as u32;
                self.objects.push(Some(data));
                ObjectRef::new(index)
            }
        }
    }

    /// Look up a slot on an object. `Ok(None)` means the object's shape does
    /// not carry the slot.
    pub fn lookup(&self, object: ObjectRef, slot: SlotId) -> VmResult<Option<SlotDescriptor>> {
        let data = self.data(object)?;
        Ok(self.shapes.lookup(data.shape, slot))
    }

    /// Read a slot through its descriptor.
    pub fn get_slot(&self, object: ObjectRef, descriptor: SlotDescriptor) -> VmResult<Value> {
        let data = self.data(object)?;
        data.slots
            .get(descriptor.offset as usize)
            .copied()
            .ok_or_else(|| VmError::internal("slot descriptor out of bounds"))
    }

    /// Write a slot through its descriptor.
    pub fn set_slot(
        &mut self,
        object: ObjectRef,
        descriptor: SlotDescriptor,
        value: Value,
    ) -> VmResult<()> {
        let data = self.data_mut(object)?;
        match data.slots.get_mut(descriptor.offset as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::internal("slot descriptor out of bounds")),
        }
    }

    /// Transition an object's shape by appending a slot, returning the new
    /// slot's descriptor. The slot is initialized to integer zero.
    pub fn transition(&mut self, object: ObjectRef, slot: SlotId) -> VmResult<SlotDescriptor> {
        let shape = self.data(object)?.shape;
        let (next, descriptor) = self.shapes.transition(shape, slot);
        let data = self.data_mut(object)?;
        data.shape = next;
        debug_assert_eq!(data.slots.len() as u32, descriptor.offset);
        data.slots.push(Value::ZERO);
        Ok(descriptor)
    }

    /// Mark from `roots` and sweep everything unmarked.
    pub fn collect(&mut self, roots: &[Value]) {
        let mut marked = vec![false; self.objects.len()];
        let mut worklist: Vec<ObjectRef> = roots
            .iter()
            .filter_map(|value| value.as_object())
            .collect();

        while let Some(object) = worklist.pop() {
            let index = object.index() as usize;
            if index >= marked.len() || marked[index] {
                continue;
            }
            marked[index] = true;
            if let Some(data) = &self.objects[index] {
                worklist.extend(data.slots.iter().filter_map(|value| value.as_object()));
            }
        }

        for (index, entry) in self.objects.iter_mut().enumerate() {
            if entry.is_some() && !marked[index] {
                *entry = None;
                self.free.push(index as u32);
                self.stats.reclaimed += 1;
            }
        }
        self.stats.collections += 1;
    }

    /// Whether `object` is a live handle.
    pub fn contains(&self, object: ObjectRef) -> bool {
        self.objects
            .get(object.index() as usize)
            .is_some_and(|entry| entry.is_some())
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.objects.len() - self.free.len()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    fn data(&self, object: ObjectRef) -> VmResult<&ObjectData> {
        self.objects
            .get(object.index() as usize)
            .and_then(|entry| entry.as_ref())
            .ok_or_else(|| VmError::internal(format!("dead object handle {object}")))
    }

    fn data_mut(&mut self, object: ObjectRef) -> VmResult<&mut ObjectData> {
        self.objects
            .get_mut(object.index() as usize)
            .and_then(|entry| entry.as_mut())
            .ok_or_else(|| VmError::internal(format!("dead object handle {object}")))
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_roots() -> [Value; 0] {
        []
    }

    #[test]
    fn test_allocate_and_slot_round_trip() {
        let mut heap = Heap::new();
        let object = heap.allocate(&no_roots());

        assert!(heap.contains(object));
        assert_eq!(heap.lookup(object, SlotId(1)).unwrap(), None);

        let descriptor = heap.transition(object, SlotId(1)).unwrap();
        heap.set_slot(object, descriptor, Value::integer(42)).unwrap();

        let found = heap.lookup(object, SlotId(1)).unwrap().unwrap();
        assert_eq!(found, descriptor);
        assert_eq!(heap.get_slot(object, found).unwrap(), Value::integer(42));
    }

    #[test]
    fn test_objects_with_same_slot_order_share_a_shape() {
        let mut heap = Heap::new();
        let a = heap.allocate(&no_roots());
        let b = heap.allocate(&no_roots());

        let da = heap.transition(a, SlotId(5)).unwrap();
        let db = heap.transition(b, SlotId(5)).unwrap();
        assert_eq!(da, db);
    }

    #[test]
    fn test_collect_reclaims_unreachable() {
        let mut heap = Heap::new();
        let kept = heap.allocate(&no_roots());
        let _dropped = heap.allocate(&no_roots());

        let roots = [Value::object(kept)];
        heap.collect(&roots);

        assert_eq!(heap.live_count(), 1);
        assert!(heap.contains(kept));
        assert_eq!(heap.stats().reclaimed, 1);
    }

    #[test]
    fn test_collect_traces_through_slots() {
        let mut heap = Heap::new();
        let outer = heap.allocate(&no_roots());
        let inner = heap.allocate(&no_roots());

        let descriptor = heap.transition(outer, SlotId(1)).unwrap();
        heap.set_slot(outer, descriptor, Value::object(inner)).unwrap();

        heap.collect(&[Value::object(outer)]);

        assert!(heap.contains(outer));
        assert!(heap.contains(inner), "slot-referenced object survives");
    }

    #[test]
    fn test_handles_stay_valid_across_collect() {
        let mut heap = Heap::new();
        let object = heap.allocate(&no_roots());
        let descriptor = heap.transition(object, SlotId(9)).unwrap();
        heap.set_slot(object, descriptor, Value::integer(-7)).unwrap();

        heap.collect(&[Value::object(object)]);

        // Same handle, same contents after the collection.
        assert_eq!(heap.get_slot(object, descriptor).unwrap(), Value::integer(-7));
    }

    #[test]
    fn test_dead_handle_is_an_error() {
        let mut heap = Heap::new();
        let object = heap.allocate(&no_roots());
        heap.collect(&no_roots());

        assert!(!heap.contains(object));
        assert!(heap.lookup(object, SlotId(1)).is_err());
    }

    #[test]
    fn test_freed_entries_are_reused() {
        let mut heap = Heap::new();
        let first = heap.allocate(&no_roots());
        heap.collect(&no_roots());

        let second = heap.allocate(&no_roots());
        assert_eq!(first.index(), second.index());
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn test_threshold_triggers_collection_on_allocate() {
        let mut heap = Heap::with_threshold(2);
        let _a = heap.allocate(&no_roots());
        let _b = heap.allocate(&no_roots());
        // Third allocation hits the threshold; nothing is rooted, so both
        // earlier objects are reclaimed.
        let _c = heap.allocate(&no_roots());

        assert_eq!(heap.stats().collections, 1);
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn test_cycles_are_collected() {
        let mut heap = Heap::new();
        let a = heap.allocate(&no_roots());
        let b = heap.allocate(&no_roots());

        let da = heap.transition(a, SlotId(1)).unwrap();
        let db = heap.transition(b, SlotId(1)).unwrap();
        heap.set_slot(a, da, Value::object(b)).unwrap();
        heap.set_slot(b, db, Value::object(a)).unwrap();

        heap.collect(&no_roots());
        assert_eq!(heap.live_count(), 0);
    }
}
