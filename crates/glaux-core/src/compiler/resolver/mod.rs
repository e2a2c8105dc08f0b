//! Scope resolution.
//!
//! Resolution runs in two passes over the tree:
//!
//! 1. **Declaration** ([`declare`]): builds the [`ScopeTable`], assigns every
//!    declared name an address, creates pool entries for functions and
//!    struct prototypes, and annotates scope-introducing nodes with their
//!    [`ScopeId`].
//! 2. **Depth** ([`depth`]): walks the tree again with a stack of
//!    `name -> defined` maps shaped like the runtime frame chain, and
//!    annotates every identifier occurrence with its address and static
//!    [`ScopeLevel`].
//!
//! Diagnostics from both passes are collected; compilation fails once, with
//! all of them.

mod declare;
mod depth;
mod scope;

pub use scope::{Checkpoint, Scope, ScopeId, ScopeKind, ScopeTable, Symbol, SymbolKind};

use std::fmt;

use tracing::debug;

use super::CompileContext;
use crate::ast::Program;
use crate::error::CompileError;
use crate::runtime::ConstIndex;

/// How far away a binding lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLevel {
    /// In the global frame
    Global,
    /// In the frame `n` access-chain hops from the current one
    Local(usize),
}

/// Where an identifier occurrence is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Frame slot
    pub addr: usize,
    /// Static distance to the declaring frame
    pub level: ScopeLevel,
    /// Binding kind
    pub kind: SymbolKind,
    /// Pool entry for function and struct bindings
    pub constant: Option<ConstIndex>,
}

/// Category of a resolution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A name declared twice in one scope
    DuplicateDeclaration,
    /// A name used but never declared
    Undeclared,
    /// A variable read in its own initializer with no outer binding
    SelfReference,
    /// Assignment to a function binding
    AssignToFunction,
    /// Struct construction of something that is not a struct type
    NotAStruct,
    /// Assignment to something other than a variable, index or field
    InvalidAssignmentTarget,
    /// `return` at top level
    ReturnOutsideFunction,
}

/// A single resolution error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error category
    pub kind: DiagnosticKind,
    /// The offending name
    pub name: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn new(kind: DiagnosticKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.name;
        match self.kind {
            DiagnosticKind::DuplicateDeclaration => {
                write!(f, "'{name}' is already declared in this scope")
            }
            DiagnosticKind::Undeclared => write!(f, "'{name}' is not declared"),
            DiagnosticKind::SelfReference => {
                write!(f, "'{name}' is read in its own initializer")
            }
            DiagnosticKind::AssignToFunction => write!(f, "cannot assign to function '{name}'"),
            DiagnosticKind::NotAStruct => write!(f, "'{name}' is not a struct type"),
            DiagnosticKind::InvalidAssignmentTarget => {
                write!(f, "cannot assign to {name} expression")
            }
            DiagnosticKind::ReturnOutsideFunction => write!(f, "'return' outside of a function"),
        }
    }
}

/// Resolves every scope and identifier in `program`.
///
/// Globals already present in the table (from earlier units of the same
/// session) are treated as defined.
pub fn resolve(program: &mut Program, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
    let predefined = ctx.scopes.global().len();
    let mut diagnostics = Vec::new();

    declare::Declarer::new(ctx, &mut diagnostics).declare_program(program);
    depth::DepthResolver::new(ctx.scopes, predefined, &mut diagnostics).resolve_program(program)?;

    if diagnostics.is_empty() {
        debug!(
            target: "glaux::compiler",
            scopes = ctx.scopes.len(),
            globals = ctx.scopes.global().len(),
            "resolution finished"
        );
        Ok(())
    } else {
        debug!(target: "glaux::compiler", errors = diagnostics.len(), "resolution failed");
        Err(CompileError::Resolution(diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{Expr, Stmt};
    use crate::config::CompilerConfig;
    use crate::gc::Heap;
    use crate::runtime::ConstPool;

    struct Fixture {
        scopes: ScopeTable,
        pool: ConstPool,
        heap: Heap,
        config: CompilerConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scopes: ScopeTable::new(),
                pool: ConstPool::new(),
                heap: Heap::new(),
                config: CompilerConfig::default(),
            }
        }

        fn resolve(&mut self, program: &mut Program) -> Result<(), CompileError> {
            let mut ctx = CompileContext {
                scopes: &mut self.scopes,
                pool: &mut self.pool,
                heap: &mut self.heap,
                config: &self.config,
            };
            resolve(program, &mut ctx)
        }
    }

    fn diagnostics(program: &mut Program) -> Vec<Diagnostic> {
        match Fixture::new().resolve(program) {
            Err(CompileError::Resolution(diagnostics)) => diagnostics,
            other => panic!("expected resolution errors, got {other:?}"),
        }
    }

    fn resolution_of(expr: &Expr) -> Resolution {
        match expr {
            Expr::Ident(ident) => ident.resolution.expect("unresolved identifier"),
            other => panic!("not an identifier: {other:?}"),
        }
    }

    fn returned(stmt: &Stmt) -> &Expr {
        match stmt {
            Stmt::Return { value: Some(value) } => value,
            other => panic!("not a return: {other:?}"),
        }
    }

    #[test]
    fn test_global_and_local_levels() {
        let mut tree = program(vec![
            let_stmt("g", int(1)),
            function("f", &["a"], vec![return_stmt(binary(BinaryOp::Add, var("a"), var("g")))]),
        ]);
        Fixture::new().resolve(&mut tree).unwrap();

        let Stmt::Function(def) = &tree.body[1] else {
            panic!("expected function");
        };
        let Expr::Binary { left, right, .. } = returned(&def.body[0]) else {
            panic!("expected binary");
        };
        let a = resolution_of(left);
        assert_eq!((a.addr, a.level), (1, ScopeLevel::Local(0)));
        let g = resolution_of(right);
        assert_eq!((g.addr, g.level), (1, ScopeLevel::Global));
        assert_eq!(def.name.resolution.map(|r| r.kind), Some(SymbolKind::Function));
    }

    #[test]
    fn test_upvalue_depth() {
        let mut tree = program(vec![function(
            "make",
            &["x"],
            vec![return_stmt(lambda(&[], vec![return_stmt(var("x"))]))],
        )]);
        Fixture::new().resolve(&mut tree).unwrap();

        let Stmt::Function(def) = &tree.body[0] else {
            panic!("expected function");
        };
        let Expr::Lambda(inner) = returned(&def.body[0]) else {
            panic!("expected lambda");
        };
        let x = resolution_of(returned(&inner.body[0]));
        assert_eq!((x.addr, x.level), (1, ScopeLevel::Local(1)));
    }

    #[test]
    fn test_later_local_shadows_outer_binding_in_nested_function() {
        let outer = |with_global: bool| {
            let mut body = Vec::new();
            if with_global {
                body.push(let_stmt("y", int(1)));
            }
            body.push(function(
                "f",
                &[],
                vec![
                    function("g", &[], vec![return_stmt(var("y"))]),
                    let_stmt("y", int(2)),
                    return_stmt(call("g", vec![])),
                ],
            ));
            program(body)
        };

        for with_global in [true, false] {
            let mut tree = outer(with_global);
            Fixture::new().resolve(&mut tree).unwrap();

            let Some(Stmt::Function(f)) = tree.body.last() else {
                panic!("expected function");
            };
            let Stmt::Function(g) = &f.body[0] else {
                panic!("expected function");
            };
            let y = resolution_of(returned(&g.body[0]));
            assert_eq!(y.level, ScopeLevel::Local(1), "global y: {with_global}");
        }
    }

    #[test]
    fn test_block_adds_a_level() {
        let mut tree = program(vec![function(
            "f",
            &["x"],
            vec![block(vec![return_stmt(var("x"))])],
        )]);
        Fixture::new().resolve(&mut tree).unwrap();

        let Stmt::Function(def) = &tree.body[0] else {
            panic!("expected function");
        };
        let Stmt::Block(inner) = &def.body[0] else {
            panic!("expected block");
        };
        let x = resolution_of(returned(&inner.body[0]));
        assert_eq!(x.level, ScopeLevel::Local(1));
    }

    #[test]
    fn test_hoisted_function_can_be_called_before_definition() {
        let mut tree = program(vec![
            expr_stmt(call("later", vec![])),
            function("later", &[], vec![return_nil()]),
        ]);
        Fixture::new().resolve(&mut tree).unwrap();
    }

    #[test]
    fn test_self_reference_resolves_outward() {
        let mut tree = program(vec![
            let_stmt("x", int(1)),
            function("f", &[], vec![let_stmt("x", var("x")), return_stmt(var("x"))]),
        ]);
        Fixture::new().resolve(&mut tree).unwrap();

        let Stmt::Function(def) = &tree.body[1] else {
            panic!("expected function");
        };
        let Stmt::Let {
            init: Some(init), ..
        } = &def.body[0]
        else {
            panic!("expected let");
        };
        assert_eq!(resolution_of(init).level, ScopeLevel::Global);
        assert_eq!(resolution_of(returned(&def.body[1])).level, ScopeLevel::Local(0));
    }

    #[test]
    fn test_self_reference_without_outer_binding() {
        let mut tree = program(vec![let_stmt("x", binary(BinaryOp::Add, var("x"), int(1)))]);
        let found = diagnostics(&mut tree);
        assert_eq!(found, vec![Diagnostic::new(DiagnosticKind::SelfReference, "x")]);
    }

    #[test]
    fn test_collects_all_diagnostics() {
        let mut tree = program(vec![
            let_stmt("a", int(1)),
            let_stmt("a", int(2)),
            println(var("missing")),
            function("f", &[], vec![return_nil()]),
            expr_stmt(assign(var("f"), int(3))),
            expr_stmt(make("a", vec![])),
            return_nil(),
            expr_stmt(assign(int(1), int(2))),
        ]);
        let kinds: Vec<_> = diagnostics(&mut tree).into_iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::DuplicateDeclaration,
                DiagnosticKind::Undeclared,
                DiagnosticKind::AssignToFunction,
                DiagnosticKind::NotAStruct,
                DiagnosticKind::ReturnOutsideFunction,
                DiagnosticKind::InvalidAssignmentTarget,
            ]
        );
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let mut tree = program(vec![
            let_stmt("n", int(3)),
            function(
                "count",
                &["k"],
                vec![
                    while_loop(
                        binary(BinaryOp::Gt, var("k"), int(0)),
                        vec![expr_stmt(decrement("k"))],
                    ),
                    return_stmt(lambda(&["y"], vec![return_stmt(var("n"))])),
                ],
            ),
            block(vec![let_stmt("inner", var("n"))]),
        ]);
        Fixture::new().resolve(&mut tree).unwrap();
        let first = tree.clone();
        Fixture::new().resolve(&mut tree).unwrap();
        assert_eq!(first, tree);
    }

    #[test]
    fn test_predefined_globals_are_visible() {
        let mut fixture = Fixture::new();
        let mut first = program(vec![let_stmt("x", int(1))]);
        fixture.resolve(&mut first).unwrap();

        let mut second = program(vec![println(var("x"))]);
        fixture.resolve(&mut second).unwrap();
        let Stmt::Print { value, .. } = &second.body[0] else {
            panic!("expected print");
        };
        assert_eq!(resolution_of(value).addr, 1);
    }
}
