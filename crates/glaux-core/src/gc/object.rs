//! Heap cells: object handles, heap objects and activation records.
//!
//! Objects and frames share one allocator. A handle is an index into the
//! heap plus the generation of the slot it was issued for, so a handle that
//! outlives its cell is detected instead of aliasing whatever reuses the
//! slot.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::compiler::resolver::ScopeId;
use crate::runtime::function::{FunctionDescriptor, StructLayout};
use crate::runtime::value::Value;

/// Generational index shared by both handle kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Handle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// A handle to a heap object (text, list, closure or struct instance).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) Handle);

/// A handle to an activation record.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef(pub(crate) Handle);

impl ObjRef {
    /// Returns the heap slot index.
    pub fn index(self) -> usize {
        self.0.index as usize
    }
}

impl FrameRef {
    /// Returns the heap slot index.
    pub fn index(self) -> usize {
        self.0.index as usize
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({}@{})", self.0.index, self.0.generation)
    }
}

impl fmt::Debug for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameRef({}@{})", self.0.index, self.0.generation)
    }
}

/// A heap-allocated object.
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// Immutable text
    Text(String),
    /// Double-ended list of values
    List(VecDeque<Value>),
    /// A function paired with its captured environment
    Closure(Closure),
    /// A struct instance (struct definitions store a prototype instance)
    Struct(StructInstance),
}

impl HeapObject {
    /// Short type name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::Text(_) => "text",
            HeapObject::List(_) => "list",
            HeapObject::Closure(_) => "function",
            HeapObject::Struct(_) => "struct",
        }
    }
}

/// A callable value.
///
/// `env` is the frame the function was defined in. It is bound once, on
/// first capture, and never rebound.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Code location, arity and frame size
    pub function: Rc<FunctionDescriptor>,
    env: Option<FrameRef>,
}

impl Closure {
    /// Creates an unbound closure.
    pub fn new(function: Rc<FunctionDescriptor>) -> Self {
        Self {
            function,
            env: None,
        }
    }

    /// Returns the captured environment, if bound.
    pub fn env(&self) -> Option<FrameRef> {
        self.env
    }

    /// Binds the environment. Returns `false` if one was already bound.
    pub fn bind(&mut self, env: FrameRef) -> bool {
        if self.env.is_some() {
            return false;
        }
        self.env = Some(env);
        true
    }
}

/// An instance of a user-defined struct type.
#[derive(Debug, Clone)]
pub struct StructInstance {
    /// Type name and field order
    pub layout: Rc<StructLayout>,
    /// Field values by declaration position
    pub values: Vec<Value>,
}

impl StructInstance {
    /// Creates the prototype instance for a layout: every field nil.
    pub fn prototype(layout: Rc<StructLayout>) -> Self {
        let values = vec![Value::Nil; layout.fields.len()];
        Self { layout, values }
    }

    /// Reads a field by name.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.layout.slot(field).map(|slot| self.values[slot])
    }

    /// Writes a field by name. Returns `false` if the field does not exist.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.layout.slot(field) {
            Some(slot) => {
                self.values[slot] = value;
                true
            }
            None => false,
        }
    }
}

/// What created an activation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The single top-level frame
    Global,
    /// A function call
    Call,
    /// A nested block
    Block,
}

/// An activation record.
///
/// Frames form two chains. `control` points at whoever must resume when
/// this frame ends. `access` points at the frame of the lexically
/// enclosing scope and is what upvalue loads walk.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame origin
    pub kind: FrameKind,
    /// Scope whose variables live in `slots`
    pub scope: ScopeId,
    /// Variable storage, slot 0 reserved
    pub slots: Vec<Value>,
    /// Instruction to resume at after a call returns
    pub return_address: usize,
    /// Dynamic link
    pub control: Option<FrameRef>,
    /// Static link
    pub access: Option<FrameRef>,
    /// Number of frames below this one on the control chain
    pub depth: usize,
}

impl Frame {
    /// Creates the global frame.
    pub fn global(slots: usize) -> Self {
        Self {
            kind: FrameKind::Global,
            scope: ScopeId::GLOBAL,
            slots: vec![Value::Nil; slots],
            return_address: 0,
            control: None,
            access: None,
            depth: 0,
        }
    }
}

/// Contents of one occupied heap slot.
#[derive(Debug)]
pub(crate) enum Cell {
    Object(HeapObject),
    Frame(Frame),
}
