//! Expression compilation.
//!
//! Every expression leaves exactly one value on the operand stack.

use super::CodeGenerator;
use crate::ast::{Expr, Ident, Literal, UpdateOp};
use crate::compiler::bytecode::{Instruction, OpCode};
use crate::compiler::resolver::{ScopeLevel, SymbolKind};
use crate::error::CompileError;
use crate::runtime::Value;

impl CodeGenerator<'_, '_> {
    pub(super) fn gen_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Literal { value } => self.gen_literal(value),
            Expr::Ident(ident) => self.emit_load(ident),
            Expr::Binary { op, left, right } => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                self.emit(Instruction::with_operand(OpCode::BinaryOp, op.code()))?;
                Ok(())
            }
            Expr::Unary { op, operand } => {
                self.gen_expr(operand)?;
                self.emit(Instruction::with_operand(OpCode::UnaryOp, op.code()))?;
                Ok(())
            }
            Expr::Assign { target, value } => self.gen_assign(target, value),
            Expr::Update { op, target } => {
                self.emit_load(target)?;
                self.emit_op(match op {
                    UpdateOp::Increment => OpCode::Increment,
                    UpdateOp::Decrement => OpCode::Decrement,
                })?;
                self.emit_op(OpCode::Dup)?;
                self.emit_store(target)
            }
            Expr::Lambda(lambda) => self.gen_function(lambda.scope, lambda.function, &lambda.body),
            Expr::Call { callee, args } => self.gen_call(callee, args),
            Expr::List { items } => {
                self.emit_op(OpCode::MakeList)?;
                for item in items {
                    self.gen_expr(item)?;
                    self.emit_op(OpCode::ListAppend)?;
                }
                Ok(())
            }
            Expr::Index { target, index } => {
                self.gen_expr(target)?;
                self.gen_expr(index)?;
                self.emit_op(OpCode::LoadIndex)?;
                Ok(())
            }
            Expr::Field { target, field } => {
                self.gen_expr(target)?;
                let name = self.ctx.pool.intern_text(self.ctx.heap, field);
                self.emit(Instruction::with_operand(OpCode::LoadField, name as i64))?;
                Ok(())
            }
            Expr::Append { list, item } => {
                self.gen_expr(list)?;
                self.gen_expr(item)?;
                self.emit_op(OpCode::ListAppend)?;
                Ok(())
            }
            Expr::Push { list, item } => {
                self.gen_expr(list)?;
                self.gen_expr(item)?;
                self.emit_op(OpCode::ListPush)?;
                Ok(())
            }
            Expr::Size { list } => {
                self.gen_expr(list)?;
                self.emit_op(OpCode::ListLength)?;
                Ok(())
            }
            Expr::StructInit { name, args } => {
                self.emit_load(name)?;
                for arg in args {
                    self.gen_expr(arg)?;
                }
                self.emit(Instruction::with_operand(
                    OpCode::MakeStruct,
                    args.len() as i64,
                ))?;
                Ok(())
            }
        }
    }

    fn gen_literal(&mut self, literal: &Literal) -> Result<(), CompileError> {
        let index = match literal {
            Literal::Number(text) => {
                if let Ok(n) = text.parse::<i64>() {
                    self.ctx.pool.intern_integer(n)
                } else if let Ok(n) = text.parse::<f64>() {
                    self.ctx.pool.intern_number(n)
                } else {
                    return Err(CompileError::InvalidLiteral(text.clone()));
                }
            }
            Literal::Text(text) => self.ctx.pool.intern_text(self.ctx.heap, text),
            Literal::True => return self.emit_immediate(Value::Boolean(true)),
            Literal::False => return self.emit_immediate(Value::Boolean(false)),
            Literal::Nil => return self.emit_immediate(Value::Nil),
        };
        self.emit(Instruction::with_operand(OpCode::LoadConst, index as i64))?;
        Ok(())
    }

    fn emit_immediate(&mut self, value: Value) -> Result<(), CompileError> {
        self.emit(Instruction::load_immediate(value))?;
        Ok(())
    }

    /// Assignment leaves the assigned value on the stack.
    fn gen_assign(&mut self, target: &Expr, value: &Expr) -> Result<(), CompileError> {
        self.gen_expr(value)?;
        self.emit_op(OpCode::Dup)?;
        match target {
            Expr::Ident(ident) => self.emit_store(ident),
            Expr::Index { target, index } => {
                self.gen_expr(target)?;
                self.gen_expr(index)?;
                self.emit_op(OpCode::StoreIndex)?;
                Ok(())
            }
            Expr::Field { target, field } => {
                self.gen_expr(target)?;
                let name = self.ctx.pool.intern_text(self.ctx.heap, field);
                self.emit(Instruction::with_operand(OpCode::StoreField, name as i64))?;
                Ok(())
            }
            _ => Err(CompileError::Internal(
                "invalid assignment target reached code generation".into(),
            )),
        }
    }

    /// Calls of a function binding go straight to its pool entry; anything
    /// else is evaluated and called through the closure on the stack.
    fn gen_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<(), CompileError> {
        for arg in args {
            self.gen_expr(arg)?;
        }
        let argc = args.len() as i64;

        if let Some((constant, depth)) = static_target(callee) {
            self.emit(Instruction::with_operands(
                OpCode::Call,
                &[constant as i64, argc, depth],
            ))?;
            return Ok(());
        }

        self.gen_expr(callee)?;
        self.emit(Instruction::with_operands(OpCode::Call, &[-1, argc, 0]))?;
        Ok(())
    }
}

fn static_target(callee: &Expr) -> Option<(usize, i64)> {
    let Expr::Ident(Ident {
        resolution: Some(resolution),
        ..
    }) = callee
    else {
        return None;
    };
    if resolution.kind != SymbolKind::Function {
        return None;
    }
    let depth = match resolution.level {
        ScopeLevel::Global => -1,
        ScopeLevel::Local(depth) => depth as i64,
    };
    resolution.constant.map(|constant| (constant, depth))
}
