// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # glaux-core
//!
//! The execution core of the Glaux interpreter.
//!
//! ## Overview
//!
//! This crate takes a parsed syntax tree (see [`ast`]) and runs it:
//! - Scope resolution: every identifier gets a storage address and a
//!   static scope level
//! - Bytecode generation with reserve/patch forward jumps
//! - A constant pool of interned literals and function references
//! - A recycling heap for objects and activation records
//! - A stack-based virtual machine with dual-chain frames for closures
//! - A tracing mark-sweep garbage collector
//!
//! Lexing, parsing and the command-line harness live outside this crate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use glaux_core::ast::build::*;
//! use glaux_core::{Config, Session};
//!
//! let mut program = program(vec![println(binary(BinaryOp::Add, int(1), int(2)))]);
//! let mut session = Session::new(Config::default());
//! session.eval(&mut program)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod gc;
pub mod runtime;
pub mod vm;

mod session;

// Re-exports for convenience
pub use compiler::{Compiled, Compiler, compile};
pub use config::{CompilerConfig, Config, VmConfig};
pub use error::{CompileError, Error, Result, RuntimeError};
pub use runtime::value::Value;
pub use session::Session;
pub use vm::{Vm, run};
