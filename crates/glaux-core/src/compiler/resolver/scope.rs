//! Compile-time scope table.
//!
//! Scopes live in an arena indexed by [`ScopeId`]; each one points at its
//! enclosing scope, and the global scope is always id 0. A symbol's address
//! is its position in the scope plus one, slot 0 of every frame being
//! reserved.

use std::fmt::Write;

use rustc_hash::FxHashMap;

use super::{Diagnostic, DiagnosticKind};
use crate::runtime::ConstIndex;

/// Index of a scope in the [`ScopeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The global scope.
    pub const GLOBAL: ScopeId = ScopeId(0);

    /// Position in the table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Rebuilds an id from an instruction operand.
    pub fn from_index(index: usize) -> Self {
        ScopeId(index as u32)
    }
}

/// What introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Program top level
    Global,
    /// Function or lambda body
    Function,
    /// Nested block
    Block,
    /// Struct field list
    Struct,
}

/// What a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Mutable variable or parameter
    Variable,
    /// Named function (immutable binding)
    Function,
    /// Struct type name
    StructType,
}

/// A declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// The name
    pub name: String,
    /// Binding kind
    pub kind: SymbolKind,
    /// Frame slot (1-based)
    pub addr: usize,
    /// Nesting depth of the declaring scope (global = 0)
    pub depth: usize,
    /// Pool entry for function and struct bindings
    pub constant: Option<ConstIndex>,
}

/// A single lexical scope.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Display name (`global`, function name, `block#N`, ...)
    pub name: String,
    /// Scope origin
    pub kind: ScopeKind,
    /// Enclosing scope, `None` only for the global scope
    pub enclosing: Option<ScopeId>,
    /// Nesting depth (global = 0)
    pub depth: usize,
    symbols: Vec<Symbol>,
    index: FxHashMap<String, usize>,
}

impl Scope {
    fn new(name: String, kind: ScopeKind, enclosing: Option<ScopeId>, depth: usize) -> Self {
        Self {
            name,
            kind,
            enclosing,
            depth,
            symbols: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Looks a name up in this scope only.
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.symbols[i])
    }

    /// Declared symbols in address order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Number of declared symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if nothing is declared here.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Slots a frame for this scope needs, slot 0 included.
    pub fn frame_size(&self) -> usize {
        self.symbols.len() + 1
    }

    fn truncate(&mut self, len: usize) {
        for symbol in self.symbols.drain(len..) {
            self.index.remove(&symbol.name);
        }
    }
}

/// Saved table state used to undo a failed compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    scopes: usize,
    globals: usize,
}

/// Arena of every scope seen so far.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTable {
    /// Creates a table holding only the global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new("global".into(), ScopeKind::Global, None, 0)],
            current: ScopeId::GLOBAL,
        }
    }

    /// The scope declarations currently go into.
    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Looks a scope up by id.
    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index())
    }

    /// The global scope.
    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Number of scopes in the table.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always false: the global scope exists from the start.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Creates a child of the current scope without entering it.
    pub fn create(&mut self, name: impl Into<String>, kind: ScopeKind) -> ScopeId {
        let depth = self.scopes[self.current.index()].depth + 1;
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes
            .push(Scope::new(name.into(), kind, Some(self.current), depth));
        id
    }

    /// Makes `id` the current scope.
    pub fn enter(&mut self, id: ScopeId) {
        self.current = id;
    }

    /// Returns to the enclosing scope.
    pub fn leave(&mut self) {
        if let Some(enclosing) = self.scopes[self.current.index()].enclosing {
            self.current = enclosing;
        }
    }

    /// Declares a name in the current scope and returns its address.
    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        constant: Option<ConstIndex>,
    ) -> Result<usize, Diagnostic> {
        let scope = &mut self.scopes[self.current.index()];
        if scope.index.contains_key(name) {
            return Err(Diagnostic::new(DiagnosticKind::DuplicateDeclaration, name));
        }
        let addr = scope.symbols.len() + 1;
        scope.index.insert(name.to_owned(), scope.symbols.len());
        scope.symbols.push(Symbol {
            name: name.to_owned(),
            kind,
            addr,
            depth: scope.depth,
            constant,
        });
        Ok(addr)
    }

    /// Whether the current scope already declares `name`.
    pub fn exists_in_scope(&self, name: &str) -> bool {
        self.scopes[self.current.index()].index.contains_key(name)
    }

    /// Looks a name up from the current scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.chain(self.current)
            .find_map(|scope| scope.lookup_local(name))
    }

    /// Iterates from `start` out to the global scope.
    pub fn chain(&self, start: ScopeId) -> impl Iterator<Item = &Scope> {
        let mut next = self.get(start);
        std::iter::from_fn(move || {
            let scope = next?;
            next = scope.enclosing.and_then(|id| self.get(id));
            Some(scope)
        })
    }

    /// Saves the table size so a failed unit can be undone.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            scopes: self.scopes.len(),
            globals: self.global().len(),
        }
    }

    /// Drops every scope and global declared since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.scopes.truncate(checkpoint.scopes);
        self.scopes[0].truncate(checkpoint.globals);
        self.current = ScopeId::GLOBAL;
    }

    /// Renders the table as an indented tree.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_scope(ScopeId::GLOBAL, 0, &mut out);
        out
    }

    fn dump_scope(&self, id: ScopeId, indent: usize, out: &mut String) {
        let Some(scope) = self.get(id) else {
            return;
        };
        let pad = "  ".repeat(indent);
        let _ = writeln!(out, "{pad}{} ({:?}, #{})", scope.name, scope.kind, id.index());
        for symbol in &scope.symbols {
            let _ = write!(out, "{pad}  {:>3} {} {:?}", symbol.addr, symbol.name, symbol.kind);
            if let Some(constant) = symbol.constant {
                let _ = write!(out, " const#{constant}");
            }
            out.push('\n');
        }
        for (i, child) in self.scopes.iter().enumerate() {
            if child.enclosing == Some(id) {
                self.dump_scope(ScopeId(i as u32), indent + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_new() {
        let table = ScopeTable::new();
        assert_eq!(table.current(), ScopeId::GLOBAL);
        assert_eq!(table.len(), 1);
        assert!(table.global().is_empty());
    }

    #[test]
    fn test_declare_assigns_one_based_addresses() {
        let mut table = ScopeTable::new();
        assert_eq!(table.declare("a", SymbolKind::Variable, None), Ok(1));
        assert_eq!(table.declare("b", SymbolKind::Variable, None), Ok(2));
        assert_eq!(table.global().frame_size(), 3);
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut table = ScopeTable::new();
        table.declare("a", SymbolKind::Variable, None).unwrap();
        let err = table.declare("a", SymbolKind::Function, None).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::DuplicateDeclaration);
    }

    #[test]
    fn test_shadowing_in_child_scope() {
        let mut table = ScopeTable::new();
        table.declare("a", SymbolKind::Variable, None).unwrap();
        let inner = table.create("f", ScopeKind::Function);
        table.enter(inner);
        assert!(!table.exists_in_scope("a"));
        table.declare("a", SymbolKind::Variable, None).unwrap();
        assert_eq!(table.lookup("a").map(|s| s.depth), Some(1));
        table.leave();
        assert_eq!(table.current(), ScopeId::GLOBAL);
        assert_eq!(table.lookup("a").map(|s| s.depth), Some(0));
    }

    #[test]
    fn test_chain_walks_outward() {
        let mut table = ScopeTable::new();
        let f = table.create("f", ScopeKind::Function);
        table.enter(f);
        let b = table.create("block#0", ScopeKind::Block);
        let names: Vec<_> = table.chain(b).map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["block#0", "f", "global"]);
    }

    #[test]
    fn test_rollback() {
        let mut table = ScopeTable::new();
        table.declare("kept", SymbolKind::Variable, None).unwrap();
        let checkpoint = table.checkpoint();

        table.declare("dropped", SymbolKind::Variable, None).unwrap();
        let f = table.create("f", ScopeKind::Function);
        table.enter(f);
        table.rollback(checkpoint);

        assert_eq!(table.len(), 1);
        assert!(table.global().lookup_local("dropped").is_none());
        assert_eq!(table.declare("again", SymbolKind::Variable, None), Ok(2));
    }

    #[test]
    fn test_dump() {
        let mut table = ScopeTable::new();
        table.declare("f", SymbolKind::Function, Some(0)).unwrap();
        let f = table.create("f", ScopeKind::Function);
        table.enter(f);
        table.declare("x", SymbolKind::Variable, None).unwrap();
        let dump = table.dump();
        assert!(dump.starts_with("global (Global, #0)\n"));
        assert!(dump.contains("  1 f Function const#0"));
        assert!(dump.contains("  f (Function, #1)"));
        assert!(dump.contains("x Variable"));
    }
}
