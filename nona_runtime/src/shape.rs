//! Shape system for object layouts.
//!
//! Objects that acquired their slots in the same order share a [`Shape`].
//! A shape records the slot ids it carries, in insertion order; the position
//! of a slot id is the object's storage offset for that slot.
//!
//! Shapes form a transition tree rooted at the empty shape:
//!
//! ```text
//!     EmptyShape
//!         |
//!     +---+---+
//!     |       |
//!   slot 1  slot 2
//!     |       |
//!  Shape1  Shape2
//!     |
//!   slot 2
//!     |
//!  Shape3 (carries slots 1 and 2)
//! ```
//!
//! Adding a slot either follows an existing edge or appends a new shape and
//! records the edge, so repeated construction of same-layout objects reuses
//! shapes.

use rustc_hash::FxHashMap;

/// Identifier of a slot, taken from the instruction immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SlotId(pub u32);

impl SlotId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier of a shape in the [`ShapeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ShapeId(u32);

impl ShapeId {
    /// The shape with no slots. Every freshly allocated object starts here.
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Where a slot lives inside an object's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDescriptor {
    /// Offset into the object's slot storage.
    pub offset: u32,
}

/// One object layout: the slot ids an object carries, in insertion order.
#[derive(Debug)]
struct Shape {
    /// Slot id to storage offset. Positions follow insertion order.
    offsets: FxHashMap<SlotId, u32>,
    /// Number of slots, which is also the next free offset.
    slot_count: u32,
}

/// The shared table of shapes and their transition edges.
///
/// Owned by the heap; shape ids are only meaningful within one table.
#[derive(Debug)]
pub struct ShapeTable {
    shapes: Vec<Shape>,
    /// Transition edges: (current shape, appended slot) to successor shape.
    transitions: FxHashMap<(ShapeId, SlotId), ShapeId>,
}

impl ShapeTable {
    /// Create a table holding only the empty shape.
    pub fn new() -> Self {
        Self {
            shapes: vec![Shape {
                offsets: FxHashMap::default(),
                slot_count: 0,
            }],
            transitions: FxHashMap::default(),
        }
    }

    /// Look up a slot in a shape.
    #[inline]
    pub fn lookup(&self, shape: ShapeId, slot: SlotId) -> Option<SlotDescriptor> {
        self.shapes[shape.raw() as usize]
            .offsets
            .get(&slot)
            .map(|&offset| SlotDescriptor { offset })
    }

    /// Number of slots carried by a shape.
    #[inline]
    pub fn slot_count(&self, shape: ShapeId) -> u32 {
        self.shapes[shape.raw() as usize].slot_count
    }

    /// Transition a shape by appending a slot.
    ///
    /// Follows the existing edge when one object has made this transition
    /// before; otherwise creates the successor shape and records the edge.
    /// Returns the successor shape and the new slot's descriptor.
    pub fn transition(&mut self, shape: ShapeId, slot: SlotId) -> (ShapeId, SlotDescriptor) {
        debug_assert!(
            self.lookup(shape, slot).is_none(),
            "transition with a slot the shape already carries"
        );

        if let Some(&next) = self.transitions.get(&(shape, slot)) {
            let descriptor = self
                .lookup(next, slot)
                .expect("transition edge leads to a shape carrying the slot");
            return (next, descriptor);
        }

        let parent = &self.shapes[shape.raw() as usize];
        let offset = parent.slot_count;
        let mut offsets = parent.offsets.clone();
        offsets.insert(slot, offset);

        let next = ShapeId(self.shapes.len() as u32);
        self.shapes.push(Shape {
            offsets,
            slot_count: offset + 1,
        });
        self.transitions.insert((shape, slot), next);

        (next, SlotDescriptor { offset })
    }

    /// Number of shapes in the table, the empty shape included.
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}

impl Default for ShapeTable {
    fn default() -> Self {
        Self::new()
    }
}
