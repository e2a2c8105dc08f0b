//! Garbage collection.
//!
//! A stop-the-world mark-sweep collector over the shared object/frame heap.
//!
//! Roots are the operand stack, the current and global frames and the pool
//! entries referenced by loaded code. A function entry left behind by a
//! unit that failed to compile is therefore reclaimed like any other. Marking follows list elements, struct fields, closure
//! environments and both frame chains. Unreached pool entries are dropped
//! from the pool before the sweep frees the cells.

mod heap;
mod object;

pub use heap::{Heap, SweepCounts};
pub use object::{Closure, Frame, FrameKind, FrameRef, HeapObject, ObjRef, StructInstance};

use tracing::debug;

use crate::config::VmConfig;
use crate::runtime::{ConstIndex, ConstPool, Value};

/// Pending references discovered while marking.
#[derive(Debug, Default)]
pub struct Worklist {
    objects: Vec<ObjRef>,
    frames: Vec<FrameRef>,
}

impl Worklist {
    /// Queues a value if it refers to an object.
    pub fn value(&mut self, value: Value) {
        if let Value::Object(r) = value {
            self.objects.push(r);
        }
    }

    /// Queues a frame.
    pub fn frame(&mut self, frame: FrameRef) {
        self.frames.push(frame);
    }
}

/// Trait for cells that hold references to other cells.
pub trait Trace {
    /// Pushes every directly referenced cell onto the worklist.
    fn trace(&self, worklist: &mut Worklist);
}

impl Trace for HeapObject {
    fn trace(&self, worklist: &mut Worklist) {
        match self {
            HeapObject::Text(_) => {}
            HeapObject::List(items) => items.iter().for_each(|v| worklist.value(*v)),
            HeapObject::Struct(instance) => {
                instance.values.iter().for_each(|v| worklist.value(*v))
            }
            HeapObject::Closure(closure) => {
                if let Some(env) = closure.env() {
                    worklist.frame(env);
                }
            }
        }
    }
}

impl Trace for Frame {
    fn trace(&self, worklist: &mut Worklist) {
        self.slots.iter().for_each(|v| worklist.value(*v));
        if let Some(control) = self.control {
            worklist.frame(control);
        }
        if let Some(access) = self.access {
            worklist.frame(access);
        }
    }
}

/// The root set for one collection.
pub struct Roots<'a> {
    /// Operand stack contents
    pub stack: &'a [Value],
    /// Frames reachable from the interpreter registers
    pub frames: &'a [FrameRef],
    /// Pool indices referenced by loaded code
    pub code_refs: &'a [ConstIndex],
}

/// Statistics for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects freed by the sweep
    pub freed_objects: usize,
    /// Frames freed by the sweep
    pub freed_frames: usize,
    /// Constant pool entries reclaimed
    pub reclaimed_constants: usize,
    /// Cells still live afterwards
    pub live: usize,
    /// Threshold for the next automatic collection
    pub next_threshold: usize,
}

/// Decides when to collect and runs collections.
#[derive(Debug, Clone)]
pub struct Collector {
    threshold: usize,
    growth: usize,
    stress: bool,
    collections: usize,
}

impl Collector {
    /// Creates a collector from the VM settings.
    pub fn new(config: &VmConfig) -> Self {
        Self {
            threshold: config.gc_threshold.max(1),
            growth: config.gc_growth_factor.max(1),
            stress: config.gc_stress,
            collections: 0,
        }
    }

    /// Whether a frame teardown should trigger a collection.
    pub fn should_collect(&self, heap: &Heap) -> bool {
        self.stress || heap.live_count() >= self.threshold
    }

    /// Current automatic collection threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of collections run so far.
    pub fn collections(&self) -> usize {
        self.collections
    }

    /// Runs a full mark, pool clean and sweep.
    pub fn collect(&mut self, heap: &mut Heap, pool: &mut ConstPool, roots: Roots<'_>) -> GcStats {
        let before = heap.live_count();
        mark(heap, pool, &roots);
        let reclaimed_constants = pool.clean_table(heap);
        let swept = heap.sweep();

        self.collections += 1;
        self.threshold = self.threshold.saturating_mul(self.growth);

        let stats = GcStats {
            freed_objects: swept.objects,
            freed_frames: swept.frames,
            reclaimed_constants,
            live: heap.live_count(),
            next_threshold: self.threshold,
        };
        debug!(
            target: "glaux::gc",
            before,
            live = stats.live,
            freed_objects = stats.freed_objects,
            freed_frames = stats.freed_frames,
            reclaimed_constants,
            threshold = self.threshold,
            "collection finished"
        );
        stats
    }
}

fn mark(heap: &mut Heap, pool: &ConstPool, roots: &Roots<'_>) {
    let mut worklist = Worklist::default();

    roots.stack.iter().for_each(|v| worklist.value(*v));
    roots.frames.iter().for_each(|f| worklist.frame(*f));
    roots
        .code_refs
        .iter()
        .filter_map(|index| pool.get(*index))
        .for_each(|v| worklist.value(v));

    loop {
        if let Some(r) = worklist.objects.pop() {
            if heap.mark_object(r) {
                if let Some(object) = heap.get(r) {
                    object.trace(&mut worklist);
                }
            }
        } else if let Some(f) = worklist.frames.pop() {
            if heap.mark_frame(f) {
                if let Some(frame) = heap.frame(f) {
                    frame.trace(&mut worklist);
                }
            }
        } else {
            break;
        }
    }
}
