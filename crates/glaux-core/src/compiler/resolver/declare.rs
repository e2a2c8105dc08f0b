//! Declaration pass: builds the scope table.

use super::{Diagnostic, ScopeId, ScopeKind, ScopeTable, SymbolKind};
use crate::ast::{Expr, Ident, Program, Stmt};
use crate::compiler::CompileContext;
use crate::gc::Heap;
use crate::runtime::{ConstIndex, ConstPool, FunctionDescriptor, StructLayout};

pub(super) struct Declarer<'c> {
    scopes: &'c mut ScopeTable,
    pool: &'c mut ConstPool,
    heap: &'c mut Heap,
    diagnostics: &'c mut Vec<Diagnostic>,
}

impl<'c> Declarer<'c> {
    pub(super) fn new(ctx: &'c mut CompileContext<'_>, diagnostics: &'c mut Vec<Diagnostic>) -> Self {
        Self {
            scopes: &mut *ctx.scopes,
            pool: &mut *ctx.pool,
            heap: &mut *ctx.heap,
            diagnostics,
        }
    }

    pub(super) fn declare_program(&mut self, program: &mut Program) {
        self.scopes.enter(ScopeId::GLOBAL);
        self.declare_stmts(&mut program.body);
    }

    fn declare(&mut self, name: &str, kind: SymbolKind, constant: Option<ConstIndex>) {
        if let Err(diagnostic) = self.scopes.declare(name, kind, constant) {
            self.diagnostics.push(diagnostic);
        }
    }

    fn declare_stmts(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.declare_stmt(stmt);
        }
    }

    fn declare_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Function(def) => {
                let (scope, function) =
                    self.declare_function(Some(&def.name.name), &mut def.params, &mut def.body);
                def.scope = Some(scope);
                def.function = Some(function);
            }
            Stmt::Struct(def) => {
                let layout = StructLayout::new(def.name.name.clone(), def.fields.clone());
                let prototype = self.pool.insert_struct(self.heap, layout);
                self.declare(&def.name.name, SymbolKind::StructType, Some(prototype));

                let scope = self.scopes.create(def.name.name.clone(), ScopeKind::Struct);
                self.scopes.enter(scope);
                for field in &def.fields {
                    self.declare(field, SymbolKind::Variable, None);
                }
                self.scopes.leave();

                def.scope = Some(scope);
                def.prototype = Some(prototype);
            }
            Stmt::Block(block) => {
                let name = format!("block#{}", self.scopes.len());
                let scope = self.scopes.create(name, ScopeKind::Block);
                self.scopes.enter(scope);
                self.declare_stmts(&mut block.body);
                self.scopes.leave();
                block.scope = Some(scope);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.declare_expr(condition);
                self.declare_stmts(then_branch);
                if let Some(else_branch) = else_branch {
                    self.declare_stmts(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.declare_expr(condition);
                self.declare_stmts(body);
            }
            Stmt::Let { name, init } => {
                if let Some(init) = init {
                    self.declare_expr(init);
                }
                self.declare(&name.name, SymbolKind::Variable, None);
            }
            Stmt::Print { value, .. } => self.declare_expr(value),
            Stmt::Return { value } => {
                if let Some(value) = value {
                    self.declare_expr(value);
                }
            }
            Stmt::Expression { expr } => self.declare_expr(expr),
        }
    }

    /// Creates the body scope and pool entry of a function. Named functions
    /// are also bound in the enclosing scope.
    fn declare_function(
        &mut self,
        name: Option<&str>,
        params: &mut [Ident],
        body: &mut [Stmt],
    ) -> (ScopeId, ConstIndex) {
        let enclosing = self.scopes.current();
        let scope_name = match name {
            Some(name) => name.to_owned(),
            None => format!("lambda#{}", self.scopes.len()),
        };
        let scope = self.scopes.create(scope_name.clone(), ScopeKind::Function);
        let descriptor = FunctionDescriptor::new(scope_name, params.len(), scope, enclosing);
        let function = self.pool.insert_function(self.heap, descriptor);
        if let Some(name) = name {
            self.declare(name, SymbolKind::Function, Some(function));
        }

        self.scopes.enter(scope);
        for param in params.iter() {
            self.declare(&param.name, SymbolKind::Variable, None);
        }
        self.declare_stmts(body);
        let locals = self.scopes.get(scope).map_or(params.len(), |s| s.len());
        self.scopes.leave();

        if let Some(descriptor) = self.pool.function_mut(self.heap, function) {
            descriptor.locals = locals;
        }
        (scope, function)
    }

    fn declare_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Literal { .. } | Expr::Ident(_) | Expr::Update { .. } => {}
            Expr::Lambda(lambda) => {
                let (scope, function) =
                    self.declare_function(None, &mut lambda.params, &mut lambda.body);
                lambda.scope = Some(scope);
                lambda.function = Some(function);
            }
            Expr::Binary { left, right, .. } => {
                self.declare_expr(left);
                self.declare_expr(right);
            }
            Expr::Unary { operand, .. } => self.declare_expr(operand),
            Expr::Assign { target, value } => {
                self.declare_expr(target);
                self.declare_expr(value);
            }
            Expr::Call { callee, args } => {
                self.declare_expr(callee);
                args.iter_mut().for_each(|arg| self.declare_expr(arg));
            }
            Expr::List { items } => items.iter_mut().for_each(|item| self.declare_expr(item)),
            Expr::Index { target, index } => {
                self.declare_expr(target);
                self.declare_expr(index);
            }
            Expr::Field { target, .. } => self.declare_expr(target),
            Expr::Append { list, item } | Expr::Push { list, item } => {
                self.declare_expr(list);
                self.declare_expr(item);
            }
            Expr::Size { list } => self.declare_expr(list),
            Expr::StructInit { args, .. } => {
                args.iter_mut().for_each(|arg| self.declare_expr(arg))
            }
        }
    }
}
