//! Bytecode compiler.
//!
//! Transforms a syntax tree into bytecode that can be executed by the VM.
//!
//! # Module Structure
//!
//! - `resolver`: Scope table and the two resolution passes
//! - `bytecode`: Instruction definitions and the disassembler
//! - `builder`: Instruction buffer with reserve/patch support
//! - `codegen`: Code generation from the resolved tree

pub mod builder;
pub mod bytecode;
pub mod codegen;
pub mod resolver;

pub use builder::{CodeBuilder, Reservation};
pub use bytecode::{Instruction, MNEMONICS, OpCode, disassemble};
pub use codegen::CodeGenerator;
pub use resolver::{ScopeId, ScopeTable};

use tracing::debug;

use crate::ast::Program;
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::gc::Heap;
use crate::runtime::ConstPool;

/// Everything a compilation pass reads or extends.
pub struct CompileContext<'a> {
    /// Scope table, extended by resolution
    pub scopes: &'a mut ScopeTable,
    /// Constant pool, extended by resolution and code generation
    pub pool: &'a mut ConstPool,
    /// Heap backing pool objects
    pub heap: &'a mut Heap,
    /// Limits
    pub config: &'a CompilerConfig,
}

/// Incremental compiler.
///
/// Successive units append to one instruction buffer: each unit starts
/// where the previous unit's `halt` was. A unit that fails to compile is
/// rolled back, leaving the buffer and scope table as they were.
#[derive(Debug, Clone)]
pub struct Compiler {
    config: CompilerConfig,
    scopes: ScopeTable,
    code: CodeBuilder,
}

impl Compiler {
    /// Creates a compiler with an empty buffer and scope table.
    pub fn new(config: CompilerConfig) -> Self {
        let code = CodeBuilder::new(config.code_capacity);
        Self {
            config,
            scopes: ScopeTable::new(),
            code,
        }
    }

    /// Compiles one unit and returns the address it starts at.
    pub fn compile_unit(
        &mut self,
        program: &mut Program,
        pool: &mut ConstPool,
        heap: &mut Heap,
    ) -> Result<usize, CompileError> {
        let checkpoint = self.scopes.checkpoint();
        let start = match self.code.instructions().last() {
            Some(last) if last.opcode == OpCode::Halt => self.code.len() - 1,
            _ => self.code.len(),
        };
        self.code.truncate(start);

        match self.generate_unit(program, pool, heap) {
            Ok(()) => {
                debug!(
                    target: "glaux::compiler",
                    start,
                    end = self.code.len(),
                    pool = pool.len(),
                    "compiled unit"
                );
                Ok(start)
            }
            Err(err) => {
                self.scopes.rollback(checkpoint);
                self.code.truncate(start);
                if start > 0 {
                    self.code.emit(Instruction::simple(OpCode::Halt))?;
                }
                debug!(target: "glaux::compiler", %err, "rolled back unit");
                Err(err)
            }
        }
    }

    fn generate_unit(
        &mut self,
        program: &mut Program,
        pool: &mut ConstPool,
        heap: &mut Heap,
    ) -> Result<(), CompileError> {
        let mut ctx = CompileContext {
            scopes: &mut self.scopes,
            pool,
            heap,
            config: &self.config,
        };
        resolver::resolve(program, &mut ctx)?;
        debug!(target: "glaux::compiler", "resolved scopes:\n{}", ctx.scopes.dump());

        let globals = ctx.scopes.global().frame_size();
        if globals > self.config.max_frame_slots {
            return Err(CompileError::TooManyLocals {
                scope: "global".into(),
                count: globals,
                max: self.config.max_frame_slots,
            });
        }

        CodeGenerator::new(&mut ctx, &mut self.code).generate(program)?;
        self.code.emit(Instruction::simple(OpCode::Halt))?;
        Ok(())
    }

    /// All instructions compiled so far.
    pub fn instructions(&self) -> &[Instruction] {
        self.code.instructions()
    }

    /// The scope table.
    pub fn scopes(&self) -> &ScopeTable {
        &self.scopes
    }

    /// Slots the global frame needs.
    pub fn global_slots(&self) -> usize {
        self.scopes.global().frame_size()
    }
}

/// Output of a one-shot compilation.
#[derive(Debug)]
pub struct Compiled {
    /// Instructions, ending in `halt`
    pub code: Vec<Instruction>,
    /// Constant pool
    pub pool: ConstPool,
    /// Heap holding pool objects
    pub heap: Heap,
    /// Resolved scopes
    pub scopes: ScopeTable,
}

impl Compiled {
    /// Slots the global frame needs.
    pub fn global_slots(&self) -> usize {
        self.scopes.global().frame_size()
    }

    /// Renders the instruction listing.
    pub fn disassemble(&self) -> String {
        disassemble(&self.code, &self.pool, &self.heap)
    }
}

/// Resolves and compiles a whole program.
pub fn compile(program: &mut Program, config: &CompilerConfig) -> Result<Compiled, CompileError> {
    let mut compiler = Compiler::new(config.clone());
    let mut pool = ConstPool::new();
    let mut heap = Heap::new();
    compiler.compile_unit(program, &mut pool, &mut heap)?;
    Ok(Compiled {
        code: compiler.code.into_instructions(),
        pool,
        heap,
        scopes: compiler.scopes,
    })
}
