//! Incremental compile-and-run sessions.
//!
//! A session owns one compiler and one VM. Globals, the constant pool, the
//! heap and the instruction array persist between units, so later units see
//! everything earlier ones defined.

use std::io::{self, Write};

use crate::ast::Program;
use crate::compiler::{Compiler, ScopeTable, disassemble};
use crate::config::Config;
use crate::error::{CompileError, Result};
use crate::runtime::Value;
use crate::vm::Vm;

/// A long-lived compiler and VM pair.
pub struct Session<W: Write = io::Stdout> {
    compiler: Compiler,
    vm: Vm<W>,
}

impl Session<io::Stdout> {
    /// Creates a session printing to standard output.
    pub fn new(config: Config) -> Self {
        Self::with_output(config, io::stdout())
    }
}

impl<W: Write> Session<W> {
    /// Creates a session printing to `out`.
    pub fn with_output(config: Config, out: W) -> Self {
        Self {
            compiler: Compiler::new(config.compiler),
            vm: Vm::with_output(config.vm, out),
        }
    }

    /// Compiles one unit without running it. Returns its entry address.
    pub fn compile(&mut self, program: &mut Program) -> std::result::Result<usize, CompileError> {
        let (pool, heap) = self.vm.parts_mut();
        self.compiler.compile_unit(program, pool, heap)
    }

    /// Compiles and runs one unit.
    pub fn eval(&mut self, program: &mut Program) -> Result<()> {
        let entry = self.compile(program)?;
        self.vm.load(
            self.compiler.instructions(),
            self.compiler.global_slots(),
            entry,
        );
        self.vm.run()?;
        Ok(())
    }

    /// Current value of a global.
    pub fn global(&self, name: &str) -> Option<Value> {
        let symbol = self.compiler.scopes().global().lookup_local(name)?;
        self.vm.global(symbol.addr)
    }

    /// Renders a value the way `print` would.
    pub fn render(&self, value: Value) -> String {
        value.display(self.vm.heap()).to_string()
    }

    /// The scope table built so far.
    pub fn scopes(&self) -> &ScopeTable {
        self.compiler.scopes()
    }

    /// Listing of every instruction compiled so far.
    pub fn disassemble(&self) -> String {
        disassemble(
            self.compiler.instructions(),
            self.vm.pool(),
            self.vm.heap(),
        )
    }

    /// The VM.
    pub fn vm(&self) -> &Vm<W> {
        &self.vm
    }

    /// The VM, mutably.
    pub fn vm_mut(&mut self) -> &mut Vm<W> {
        &mut self.vm
    }

    /// The output sink.
    pub fn output(&self) -> &W {
        self.vm.output()
    }
}
