//! Depth pass: annotates identifier occurrences.
//!
//! The pass keeps one `name -> defined` map per runtime frame between the
//! global frame and the current one. A `let` marks its name declared before
//! the initializer is resolved and defined afterwards, so the initializer
//! can see an outer binding of the same name. Function and struct names are
//! defined up front for the whole scope (hoisting).

use rustc_hash::FxHashMap;

use super::{
    Diagnostic, DiagnosticKind, Resolution, ScopeId, ScopeKind, ScopeLevel, ScopeTable, SymbolKind,
};
use crate::ast::{Expr, Ident, Program, Stmt};
use crate::error::CompileError;

pub(super) struct DepthResolver<'a> {
    scopes: &'a ScopeTable,
    scope: ScopeId,
    levels: Vec<FxHashMap<String, bool>>,
    functions: usize,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> DepthResolver<'a> {
    pub(super) fn new(
        scopes: &'a ScopeTable,
        predefined: usize,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        let globals = scopes
            .global()
            .symbols()
            .iter()
            .take(predefined)
            .map(|symbol| (symbol.name.clone(), true))
            .collect();
        Self {
            scopes,
            scope: ScopeId::GLOBAL,
            levels: vec![globals],
            functions: 0,
            diagnostics,
        }
    }

    pub(super) fn resolve_program(&mut self, program: &mut Program) -> Result<(), CompileError> {
        self.hoist(&program.body);
        self.resolve_stmts(&mut program.body)
    }

    fn report(&mut self, kind: DiagnosticKind, name: &str) {
        self.diagnostics.push(Diagnostic::new(kind, name));
    }

    fn mark(&mut self, name: &str, defined: bool) {
        if let Some(level) = self.levels.last_mut() {
            level.insert(name.to_owned(), defined);
        }
    }

    fn hoist(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Function(def) => self.mark(&def.name.name, true),
                Stmt::Struct(def) => self.mark(&def.name.name, true),
                Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.hoist(then_branch);
                    if let Some(else_branch) = else_branch {
                        self.hoist(else_branch);
                    }
                }
                Stmt::While { body, .. } => self.hoist(body),
                _ => {}
            }
        }
    }

    fn enter(&mut self, scope: Option<ScopeId>, what: &str) -> Result<ScopeId, CompileError> {
        let scope = scope.ok_or_else(|| {
            CompileError::Internal(format!("{what} reached the depth pass without a scope"))
        })?;
        let previous = self.scope;
        self.scope = scope;
        self.levels.push(FxHashMap::default());
        Ok(previous)
    }

    fn exit(&mut self, previous: ScopeId) {
        self.levels.pop();
        self.scope = previous;
    }

    fn resolve_function(
        &mut self,
        scope: Option<ScopeId>,
        params: &mut [Ident],
        body: &mut [Stmt],
    ) -> Result<(), CompileError> {
        let previous = self.enter(scope, "function")?;
        for param in params.iter_mut() {
            self.mark(&param.name, true);
            self.resolve_ident(param)?;
        }
        self.functions += 1;
        self.hoist(body);
        let result = self.resolve_stmts(body);
        self.functions -= 1;
        self.exit(previous);
        result
    }

    fn resolve_stmts(&mut self, stmts: &mut [Stmt]) -> Result<(), CompileError> {
        stmts.iter_mut().try_for_each(|stmt| self.resolve_stmt(stmt))
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Function(def) => {
                self.resolve_ident(&mut def.name)?;
                self.resolve_function(def.scope, &mut def.params, &mut def.body)
            }
            Stmt::Struct(def) => self.resolve_ident(&mut def.name),
            Stmt::Block(block) => {
                let previous = self.enter(block.scope, "block")?;
                self.hoist(&block.body);
                let result = self.resolve_stmts(&mut block.body);
                self.exit(previous);
                result
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmts(then_branch)?;
                match else_branch {
                    Some(else_branch) => self.resolve_stmts(else_branch),
                    None => Ok(()),
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmts(body)
            }
            Stmt::Let { name, init } => {
                self.mark(&name.name, false);
                if let Some(init) = init {
                    self.resolve_expr(init)?;
                }
                self.mark(&name.name, true);
                self.resolve_ident(name)
            }
            Stmt::Print { value, .. } => self.resolve_expr(value),
            Stmt::Return { value } => {
                if self.functions == 0 {
                    self.report(DiagnosticKind::ReturnOutsideFunction, "return");
                }
                match value {
                    Some(value) => self.resolve_expr(value),
                    None => Ok(()),
                }
            }
            Stmt::Expression { expr } => self.resolve_expr(expr),
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Literal { .. } => Ok(()),
            Expr::Ident(ident) => self.resolve_ident(ident),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expr::Unary { operand, .. } => self.resolve_expr(operand),
            Expr::Assign { target, value } => {
                self.resolve_expr(value)?;
                if let Expr::Ident(ident) = target.as_mut() {
                    self.resolve_ident(ident)?;
                    self.check_assignable(ident);
                    return Ok(());
                }
                if !matches!(**target, Expr::Index { .. } | Expr::Field { .. }) {
                    self.report(DiagnosticKind::InvalidAssignmentTarget, describe(target));
                }
                self.resolve_expr(target)
            }
            Expr::Update { target, .. } => {
                self.resolve_ident(target)?;
                self.check_assignable(target);
                Ok(())
            }
            Expr::Lambda(lambda) => {
                self.resolve_function(lambda.scope, &mut lambda.params, &mut lambda.body)
            }
            Expr::Call { callee, args } => {
                self.resolve_expr(callee)?;
                args.iter_mut().try_for_each(|arg| self.resolve_expr(arg))
            }
            Expr::List { items } => items.iter_mut().try_for_each(|item| self.resolve_expr(item)),
            Expr::Index { target, index } => {
                self.resolve_expr(target)?;
                self.resolve_expr(index)
            }
            Expr::Field { target, .. } => self.resolve_expr(target),
            Expr::Append { list, item } | Expr::Push { list, item } => {
                self.resolve_expr(list)?;
                self.resolve_expr(item)
            }
            Expr::Size { list } => self.resolve_expr(list),
            Expr::StructInit { name, args } => {
                self.resolve_ident(name)?;
                if name
                    .resolution
                    .is_some_and(|r| r.kind != SymbolKind::StructType)
                {
                    self.report(DiagnosticKind::NotAStruct, &name.name);
                }
                args.iter_mut().try_for_each(|arg| self.resolve_expr(arg))
            }
        }
    }

    fn check_assignable(&mut self, ident: &Ident) {
        if ident
            .resolution
            .is_some_and(|r| r.kind == SymbolKind::Function)
        {
            self.report(DiagnosticKind::AssignToFunction, &ident.name);
        }
    }

    /// Finds the frame distance of `ident` and writes its resolution.
    ///
    /// The nearest scope that declares the name wins, whether or not its
    /// declaration has been reached yet. Only a `let` whose initializer is
    /// being resolved is skipped, so the initializer sees the outer binding.
    fn resolve_ident(&mut self, ident: &mut Ident) -> Result<(), CompileError> {
        let innermost = self.levels.len() - 1;
        let mut skipped = false;
        let mut hops = None;
        for (k, scope) in self.scopes.chain(self.scope).enumerate() {
            let marked = innermost
                .checked_sub(k)
                .and_then(|i| self.levels.get(i))
                .and_then(|level| level.get(&ident.name).copied());
            match marked {
                Some(false) if k == 0 => skipped = true,
                Some(_) => {
                    hops = Some(k);
                    break;
                }
                // declared later in this scope
                None if scope.lookup_local(&ident.name).is_some() => {
                    hops = Some(k);
                    break;
                }
                None => {}
            }
        }

        let Some(hops) = hops else {
            ident.resolution = None;
            let kind = if skipped {
                DiagnosticKind::SelfReference
            } else {
                DiagnosticKind::Undeclared
            };
            self.report(kind, &ident.name);
            return Ok(());
        };

        let scope = self.scopes.chain(self.scope).nth(hops).ok_or_else(|| {
            CompileError::Internal(format!("scope chain too short for '{}'", ident.name))
        })?;
        let symbol = scope.lookup_local(&ident.name).ok_or_else(|| {
            CompileError::Internal(format!(
                "'{}' missing from scope '{}'",
                ident.name, scope.name
            ))
        })?;
        let level = match scope.kind {
            ScopeKind::Global => ScopeLevel::Global,
            _ => ScopeLevel::Local(hops),
        };
        ident.resolution = Some(Resolution {
            addr: symbol.addr,
            level,
            kind: symbol.kind,
            constant: symbol.constant,
        });
        Ok(())
    }
}

fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Literal { .. } => "literal",
        Expr::Call { .. } => "call",
        Expr::Binary { .. } | Expr::Unary { .. } => "operator",
        Expr::Lambda(_) => "function",
        Expr::List { .. } => "list",
        Expr::StructInit { .. } => "struct construction",
        Expr::Assign { .. } | Expr::Update { .. } => "assignment",
        Expr::Append { .. } | Expr::Push { .. } | Expr::Size { .. } => "list operation",
        Expr::Ident(_) | Expr::Index { .. } | Expr::Field { .. } => "place",
    }
}
