//! Recycling heap for objects and frames.
//!
//! Cells live in a single vector of slots. Freed slots go on a free list and
//! are handed out again before the vector grows; each reuse bumps the slot's
//! generation so older handles stop resolving.
//!
//! # Memory Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ [0: Frame g0][1: Text g0][2: free g1][3: List g0]... │
//! └──────────────────────────────────────────────────────┘
//!                            ↑
//!                            free list
//! ```

use super::object::{Cell, Frame, FrameRef, Handle, HeapObject, ObjRef};

struct Slot {
    generation: u32,
    marked: bool,
    cell: Option<Cell>,
}

/// Number of cells released by a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    /// Objects freed
    pub objects: usize,
    /// Frames freed
    pub frames: usize,
}

/// Storage for every object and activation record.
#[derive(Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, cell: Cell) -> Handle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.cell = Some(cell);
            slot.marked = false;
            return Handle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            marked: false,
            cell: Some(cell),
        });
        Handle {
            index,
            generation: 0,
        }
    }

    fn slot(&self, handle: Handle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    /// Allocates an object.
    pub fn alloc(&mut self, object: HeapObject) -> ObjRef {
        ObjRef(self.allocate(Cell::Object(object)))
    }

    /// Allocates a text object.
    pub fn alloc_text(&mut self, text: impl Into<String>) -> ObjRef {
        self.alloc(HeapObject::Text(text.into()))
    }

    /// Allocates an activation record.
    pub fn alloc_frame(&mut self, frame: Frame) -> FrameRef {
        FrameRef(self.allocate(Cell::Frame(frame)))
    }

    /// Resolves an object handle.
    pub fn get(&self, r: ObjRef) -> Option<&HeapObject> {
        match self.slot(r.0)?.cell.as_ref()? {
            Cell::Object(object) => Some(object),
            Cell::Frame(_) => None,
        }
    }

    /// Resolves an object handle mutably.
    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut HeapObject> {
        match self.slot_mut(r.0)?.cell.as_mut()? {
            Cell::Object(object) => Some(object),
            Cell::Frame(_) => None,
        }
    }

    /// Resolves a frame handle.
    pub fn frame(&self, r: FrameRef) -> Option<&Frame> {
        match self.slot(r.0)?.cell.as_ref()? {
            Cell::Frame(frame) => Some(frame),
            Cell::Object(_) => None,
        }
    }

    /// Resolves a frame handle mutably.
    pub fn frame_mut(&mut self, r: FrameRef) -> Option<&mut Frame> {
        match self.slot_mut(r.0)?.cell.as_mut()? {
            Cell::Frame(frame) => Some(frame),
            Cell::Object(_) => None,
        }
    }

    /// Returns the text behind a handle, if it is a text object.
    pub fn text(&self, r: ObjRef) -> Option<&str> {
        match self.get(r)? {
            HeapObject::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Number of occupied cells (objects and frames).
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of occupied cells holding objects.
    pub fn object_count(&self) -> usize {
        self.cells()
            .filter(|cell| matches!(cell, Cell::Object(_)))
            .count()
    }

    /// Number of occupied cells holding frames.
    pub fn frame_count(&self) -> usize {
        self.cells()
            .filter(|cell| matches!(cell, Cell::Frame(_)))
            .count()
    }

    /// Number of slots ever created, occupied or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.slots.iter().filter_map(|slot| slot.cell.as_ref())
    }

    /// Marks an object. Returns `true` if it was live and not yet marked.
    pub(crate) fn mark_object(&mut self, r: ObjRef) -> bool {
        Self::mark(self.slot_mut(r.0))
    }

    /// Marks a frame. Returns `true` if it was live and not yet marked.
    pub(crate) fn mark_frame(&mut self, r: FrameRef) -> bool {
        Self::mark(self.slot_mut(r.0))
    }

    fn mark(slot: Option<&mut Slot>) -> bool {
        match slot {
            Some(slot) if slot.cell.is_some() && !slot.marked => {
                slot.marked = true;
                true
            }
            _ => false,
        }
    }

    /// Whether an object survived the current mark phase.
    pub(crate) fn is_marked(&self, r: ObjRef) -> bool {
        self.slot(r.0).is_some_and(|slot| slot.marked)
    }

    /// Releases a single object immediately.
    pub(crate) fn free(&mut self, r: ObjRef) -> Option<HeapObject> {
        let index = r.0.index;
        let slot = self.slot_mut(r.0)?;
        let cell = slot.cell.take()?;
        slot.marked = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        match cell {
            Cell::Object(object) => Some(object),
            Cell::Frame(_) => None,
        }
    }

    /// Frees every unmarked cell and clears the marks on the rest.
    pub(crate) fn sweep(&mut self) -> SweepCounts {
        let mut counts = SweepCounts::default();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marked {
                slot.marked = false;
                continue;
            }
            match slot.cell.take() {
                Some(Cell::Object(_)) => counts.objects += 1,
                Some(Cell::Frame(_)) => counts.frames += 1,
                None => continue,
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }
        self.live -= counts.objects + counts.frames;
        counts
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("slots", &self.slots.len())
            .field("live", &self.live)
            .field("free", &self.free.len())
            .finish()
    }
}
