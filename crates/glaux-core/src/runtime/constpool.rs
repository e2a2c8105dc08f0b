//! The constant pool.
//!
//! Literals, function descriptors and struct prototypes are addressed by
//! index from the instruction stream. Number and text literals are interned
//! so repeated literals share one entry. Closures and struct prototypes are
//! never deduplicated: each definition is its own entry.
//!
//! Text entries only hold weak references; the collector reclaims them via
//! [`ConstPool::clean_table`] once nothing reaches them, and the freed index
//! is reused by the next insertion.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::function::{FunctionDescriptor, StructLayout};
use super::value::Value;
use crate::gc::{Closure, Heap, HeapObject, StructInstance};

/// Index into the constant pool.
pub type ConstIndex = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InternKey {
    Integer(i64),
    Number(u64),
    Text(String),
}

/// Indexed store of compile-time constants.
#[derive(Debug, Default)]
pub struct ConstPool {
    entries: Vec<Option<Value>>,
    free: Vec<ConstIndex>,
    interned: FxHashMap<InternKey, ConstIndex>,
}

impl ConstPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value without deduplication, reusing a freed index if one
    /// is available.
    pub fn insert(&mut self, value: Value) -> ConstIndex {
        if let Some(index) = self.free.pop() {
            self.entries[index] = Some(value);
            return index;
        }
        self.entries.push(Some(value));
        self.entries.len() - 1
    }

    fn intern(&mut self, key: InternKey, make: impl FnOnce() -> Value) -> ConstIndex {
        if let Some(&index) = self.interned.get(&key) {
            return index;
        }
        let index = self.insert(make());
        self.interned.insert(key, index);
        index
    }

    /// Interns an integer literal.
    pub fn intern_integer(&mut self, n: i64) -> ConstIndex {
        self.intern(InternKey::Integer(n), || Value::Integer(n))
    }

    /// Interns a float literal.
    pub fn intern_number(&mut self, n: f64) -> ConstIndex {
        self.intern(InternKey::Number(n.to_bits()), || Value::Number(n))
    }

    /// Interns a text literal, allocating the text object on first use.
    pub fn intern_text(&mut self, heap: &mut Heap, text: &str) -> ConstIndex {
        self.intern(InternKey::Text(text.to_owned()), || {
            Value::Object(heap.alloc_text(text))
        })
    }

    /// Stores a new unbound closure for a function descriptor.
    pub fn insert_function(&mut self, heap: &mut Heap, function: FunctionDescriptor) -> ConstIndex {
        let closure = heap.alloc(HeapObject::Closure(Closure::new(Rc::new(function))));
        self.insert(Value::Object(closure))
    }

    /// Stores the prototype instance of a struct type.
    pub fn insert_struct(&mut self, heap: &mut Heap, layout: StructLayout) -> ConstIndex {
        let prototype = StructInstance::prototype(Rc::new(layout));
        let r = heap.alloc(HeapObject::Struct(prototype));
        self.insert(Value::Object(r))
    }

    /// Reads an entry.
    pub fn get(&self, index: ConstIndex) -> Option<Value> {
        self.entries.get(index).copied().flatten()
    }

    /// Reads a text entry.
    pub fn text<'h>(&self, heap: &'h Heap, index: ConstIndex) -> Option<&'h str> {
        heap.text(self.get(index)?.as_object()?)
    }

    /// Reads the descriptor of a function entry.
    pub fn function(&self, heap: &Heap, index: ConstIndex) -> Option<Rc<FunctionDescriptor>> {
        match heap.get(self.get(index)?.as_object()?)? {
            HeapObject::Closure(closure) => Some(Rc::clone(&closure.function)),
            _ => None,
        }
    }

    /// Mutable access to the descriptor of a function entry.
    pub fn function_mut<'h>(
        &self,
        heap: &'h mut Heap,
        index: ConstIndex,
    ) -> Option<&'h mut FunctionDescriptor> {
        match heap.get_mut(self.get(index)?.as_object()?)? {
            HeapObject::Closure(closure) => Some(Rc::make_mut(&mut closure.function)),
            _ => None,
        }
    }

    /// Number of occupied entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Returns true if no entry is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over occupied entries.
    pub fn iter(&self) -> impl Iterator<Item = (ConstIndex, Value)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.map(|value| (i, value)))
    }

    /// Drops every object entry the mark phase did not reach.
    ///
    /// Must run after marking and before the sweep. The object is released,
    /// its intern key removed and the index queued for reuse. Returns the
    /// number of entries reclaimed.
    pub fn clean_table(&mut self, heap: &mut Heap) -> usize {
        let mut reclaimed = 0;
        for index in 0..self.entries.len() {
            let Some(Value::Object(r)) = self.entries[index] else {
                continue;
            };
            if heap.is_marked(r) {
                continue;
            }
            if let Some(HeapObject::Text(text)) = heap.free(r) {
                self.interned.remove(&InternKey::Text(text));
            }
            self.entries[index] = None;
            self.free.push(index);
            reclaimed += 1;
        }
        reclaimed
    }
}
