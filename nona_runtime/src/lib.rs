//! Object model for the Nona virtual machine.
//!
//! The execution engine treats heap values as opaque tagged cells and defers
//! allocation, slot lookup and collection to this crate:
//!
//! - **Shapes**: objects that gained their slots in the same order share a
//!   layout; adding a slot follows (or creates) a transition edge to the next
//!   shape
//! - **Heap**: a handle-based object table; a `Value` object payload indexes
//!   into it, so handles stay valid across collections
//! - **Collector**: mark-and-sweep from caller-supplied roots; allocation is
//!   a safe point and may collect
//!
//! Object handles whose objects have been reclaimed are dead; the heap
//! reports touching one as an internal error rather than corrupting memory.

pub mod heap;
pub mod shape;

pub use heap::{Heap, HeapStats, DEFAULT_GC_THRESHOLD};
pub use shape::{ShapeId, ShapeTable, SlotDescriptor, SlotId};
