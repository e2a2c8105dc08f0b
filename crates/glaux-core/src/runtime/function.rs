//! Function and struct type descriptors.

use rustc_hash::FxHashMap;

use crate::compiler::resolver::ScopeId;

/// Everything the VM needs to activate a function.
///
/// Descriptors are created during resolution with `start` unset; code
/// generation fills in the entry point once the body has been emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    /// Function name (`lambda#N` for anonymous functions)
    pub name: String,
    /// Number of parameters
    pub arity: usize,
    /// Number of variables declared in the body scope, parameters included
    pub locals: usize,
    /// Address of the first body instruction
    pub start: Option<usize>,
    /// The body scope
    pub scope: ScopeId,
    /// The scope the function was declared in
    pub enclosing: ScopeId,
}

impl FunctionDescriptor {
    /// Creates a descriptor with no entry point yet.
    pub fn new(name: impl Into<String>, arity: usize, scope: ScopeId, enclosing: ScopeId) -> Self {
        Self {
            name: name.into(),
            arity,
            locals: arity,
            start: None,
            scope,
            enclosing,
        }
    }

    /// Slots an activation needs, slot 0 included.
    pub fn frame_size(&self) -> usize {
        self.locals + 1
    }
}

/// Field layout of a user-defined struct type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    /// Type name
    pub name: String,
    /// Field names in declaration order
    pub fields: Vec<String>,
    slots: FxHashMap<String, usize>,
}

impl StructLayout {
    /// Creates a layout. Fields keep their declaration order.
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        let slots = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.clone(), i))
            .collect();
        Self {
            name: name.into(),
            fields,
            slots,
        }
    }

    /// Position of a field.
    pub fn slot(&self, field: &str) -> Option<usize> {
        self.slots.get(field).copied()
    }
}
