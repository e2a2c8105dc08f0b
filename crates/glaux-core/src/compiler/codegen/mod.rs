//! Code generation from the resolved tree to bytecode.
//!
//! The generator only reads the annotations resolution left on the tree;
//! an identifier without a resolution at this point is an internal error.
//! Forward jumps use [`CodeBuilder::reserve`] and [`CodeBuilder::patch`].

mod expressions;
mod statements;

#[cfg(test)]
mod tests;

use super::CompileContext;
use super::builder::CodeBuilder;
use super::bytecode::{Instruction, OpCode};
use super::resolver::{Resolution, ScopeId, ScopeLevel};
use crate::ast::{Ident, Program};
use crate::error::CompileError;

/// Emits bytecode for resolved trees.
pub struct CodeGenerator<'g, 'a> {
    ctx: &'g mut CompileContext<'a>,
    code: &'g mut CodeBuilder,
}

impl<'g, 'a> CodeGenerator<'g, 'a> {
    /// Creates a generator that appends to `code`.
    pub fn new(ctx: &'g mut CompileContext<'a>, code: &'g mut CodeBuilder) -> Self {
        Self { ctx, code }
    }

    /// Generates code for every top-level statement. The caller emits the
    /// final `halt`.
    pub fn generate(&mut self, program: &Program) -> Result<(), CompileError> {
        self.gen_stmts(&program.body)
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    fn emit(&mut self, instruction: Instruction) -> Result<usize, CompileError> {
        self.code.emit(instruction)
    }

    fn emit_op(&mut self, opcode: OpCode) -> Result<usize, CompileError> {
        self.code.emit(Instruction::simple(opcode))
    }

    fn resolution(ident: &Ident) -> Result<Resolution, CompileError> {
        ident.resolution.ok_or_else(|| {
            CompileError::Internal(format!("'{}' reached code generation unresolved", ident.name))
        })
    }

    /// Pushes the value bound to `ident`.
    fn emit_load(&mut self, ident: &Ident) -> Result<(), CompileError> {
        let resolution = Self::resolution(ident)?;
        let addr = resolution.addr as i64;
        let instruction = match resolution.level {
            ScopeLevel::Global => Instruction::with_operand(OpCode::LoadGlobal, addr),
            ScopeLevel::Local(0) => Instruction::with_operand(OpCode::LoadLocal, addr),
            ScopeLevel::Local(depth) => {
                Instruction::with_operands(OpCode::LoadUpvalue, &[addr, depth as i64])
            }
        };
        self.emit(instruction)?;
        Ok(())
    }

    /// Pops the top of stack into the binding of `ident`.
    fn emit_store(&mut self, ident: &Ident) -> Result<(), CompileError> {
        let resolution = Self::resolution(ident)?;
        let addr = resolution.addr as i64;
        match resolution.level {
            ScopeLevel::Global => {
                self.emit(Instruction::with_operand(OpCode::LoadGlobalAddr, addr))?;
                self.emit_op(OpCode::StoreGlobal)?;
            }
            ScopeLevel::Local(0) => {
                self.emit(Instruction::with_operand(OpCode::LoadLocalAddr, addr))?;
                self.emit_op(OpCode::StoreLocal)?;
            }
            ScopeLevel::Local(depth) => {
                self.emit(Instruction::with_operand(OpCode::LoadLocalAddr, addr))?;
                self.emit(Instruction::with_operand(OpCode::StoreUpvalue, depth as i64))?;
            }
        }
        Ok(())
    }

    /// Frame size of a scope, checked against the configured maximum.
    fn frame_size(&self, scope: Option<ScopeId>) -> Result<(ScopeId, usize), CompileError> {
        let id = scope.ok_or_else(|| {
            CompileError::Internal("scope-introducing node without a scope".into())
        })?;
        let scope = self
            .ctx
            .scopes
            .get(id)
            .ok_or_else(|| CompileError::Internal(format!("unknown scope #{}", id.index())))?;
        let size = scope.frame_size();
        let max = self.ctx.config.max_frame_slots;
        if size > max {
            return Err(CompileError::TooManyLocals {
                scope: scope.name.clone(),
                count: size,
                max,
            });
        }
        Ok((id, size))
    }
}
