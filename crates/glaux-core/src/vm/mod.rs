//! The bytecode virtual machine.
//!
//! A stack machine over the compiled instruction array. Activation records
//! live on the collected heap and carry two links: `control` back to the
//! caller and `access` out to the lexically enclosing frame.
//!
//! ## Structure
//!
//! - `interpreter` - Fetch/decode/execute loop, frames and calls
//! - `operators` - Arithmetic, logic and `incr`/`decr`
//! - `comparison` - The total order over values
//! - `trace` - Renderers for verbose execution traces

mod interpreter;
mod trace;

pub mod comparison;
pub mod operators;

pub use interpreter::Vm;

use std::io;

use crate::compiler::Compiled;
use crate::config::VmConfig;
use crate::error::RuntimeError;

/// Runs a one-shot compilation to completion, printing to standard output.
pub fn run(compiled: Compiled, config: &VmConfig) -> Result<(), RuntimeError> {
    Vm::from_compiled(compiled, config.clone(), io::stdout()).run()
}
