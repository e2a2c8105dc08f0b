//! Statement compilation.
//!
//! | Statement | Emitted sequence |
//! |-----------|------------------|
//! | `fn` | `jump` over body, body, `ldimm nil`, `retfun`, `mkclosure`, store |
//! | `struct` | `defstruct`, store |
//! | block | `entblk`, body, `retblk` |
//! | `if` | condition, `brf` else, then, `jump` end, else |
//! | `while` | condition, `brf` end, body, `jump` top |
//! | `let` | initializer (or `ldimm nil`), store |
//! | `print` | value, `print` (`newline` for println) |
//! | `return` | value (or `ldimm nil`), `retfun` |
//! | expression | value, `popstack` |

use super::CodeGenerator;
use crate::ast::{Expr, Stmt};
use crate::compiler::bytecode::{Instruction, OpCode};
use crate::compiler::resolver::ScopeId;
use crate::error::CompileError;
use crate::runtime::{ConstIndex, Value};

impl CodeGenerator<'_, '_> {
    pub(super) fn gen_stmts(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        stmts.iter().try_for_each(|stmt| self.gen_stmt(stmt))
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Function(def) => {
                self.gen_function(def.scope, def.function, &def.body)?;
                self.emit_store(&def.name)
            }
            Stmt::Struct(def) => {
                let prototype = def.prototype.ok_or_else(|| {
                    CompileError::Internal(format!("struct '{}' has no prototype", def.name.name))
                })?;
                self.emit(Instruction::with_operand(
                    OpCode::DefineStruct,
                    prototype as i64,
                ))?;
                self.emit_store(&def.name)
            }
            Stmt::Block(block) => {
                let (scope, slots) = self.frame_size(block.scope)?;
                self.emit(Instruction::with_operands(
                    OpCode::EnterBlock,
                    &[slots as i64, scope.index() as i64],
                ))?;
                self.gen_stmts(&block.body)?;
                self.emit_op(OpCode::LeaveBlock)?;
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.gen_if(condition, then_branch, else_branch.as_deref()),
            Stmt::While { condition, body } => self.gen_while(condition, body),
            Stmt::Let { name, init } => {
                match init {
                    Some(init) => self.gen_expr(init)?,
                    None => {
                        self.emit(Instruction::load_immediate(Value::Nil))?;
                    }
                }
                self.emit_store(name)
            }
            Stmt::Print { value, newline } => {
                self.gen_expr(value)?;
                self.emit_op(OpCode::Print)?;
                if *newline {
                    self.emit_op(OpCode::PrintNewline)?;
                }
                Ok(())
            }
            Stmt::Return { value } => {
                match value {
                    Some(value) => self.gen_expr(value)?,
                    None => {
                        self.emit(Instruction::load_immediate(Value::Nil))?;
                    }
                }
                self.emit_op(OpCode::Return)?;
                Ok(())
            }
            Stmt::Expression { expr } => {
                self.gen_expr(expr)?;
                self.emit_op(OpCode::Pop)?;
                Ok(())
            }
        }
    }

    fn gen_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
    ) -> Result<(), CompileError> {
        self.gen_expr(condition)?;
        let to_else = self.code.reserve()?;
        self.gen_stmts(then_branch)?;

        match else_branch {
            None => {
                let end = self.code.position();
                self.code.patch(to_else, Instruction::branch_if_false(end))
            }
            Some(else_branch) => {
                let to_end = self.code.reserve()?;
                let else_start = self.code.position();
                self.code
                    .patch(to_else, Instruction::branch_if_false(else_start))?;
                self.gen_stmts(else_branch)?;
                let end = self.code.position();
                self.code.patch(to_end, Instruction::jump(end))
            }
        }
    }

    fn gen_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        let top = self.code.position();
        self.gen_expr(condition)?;
        let exit = self.code.reserve()?;
        self.gen_stmts(body)?;
        self.emit(Instruction::jump(top))?;
        let end = self.code.position();
        self.code.patch(exit, Instruction::branch_if_false(end))
    }

    /// Emits a function body inline, skipped by a jump, followed by the
    /// `mkclosure` that leaves the closure on the stack.
    pub(super) fn gen_function(
        &mut self,
        scope: Option<ScopeId>,
        function: Option<ConstIndex>,
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        let function = function.ok_or_else(|| {
            CompileError::Internal("function reached code generation without a pool entry".into())
        })?;
        let (_, slots) = self.frame_size(scope)?;

        let skip = self.code.reserve()?;
        let start = self.code.position();
        let descriptor = self
            .ctx
            .pool
            .function_mut(self.ctx.heap, function)
            .ok_or_else(|| {
                CompileError::Internal(format!("pool entry {function} is not a function"))
            })?;
        descriptor.start = Some(start);
        descriptor.locals = slots - 1;

        self.gen_stmts(body)?;
        self.emit(Instruction::load_immediate(Value::Nil))?;
        self.emit_op(OpCode::Return)?;

        let after = self.code.position();
        self.code.patch(skip, Instruction::jump(after))?;
        self.emit(Instruction::with_operand(
            OpCode::MakeClosure,
            function as i64,
        ))?;
        Ok(())
    }
}
