// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Glaux - a bytecode compiler and virtual machine for a small dynamically
//! typed language with closures
//!
//! This is the command-line harness. Source text is parsed elsewhere; the
//! harness reads the resulting JSON syntax tree and then:
//!
//! - `glaux run <tree.json>` compiles and runs it
//! - `glaux disasm <tree.json>` prints the bytecode listing
//! - `glaux resolve <tree.json>` prints the resolved scope table
//! - `glaux` or `glaux repl` starts an interactive session

mod cli;
mod loader;
mod repl;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use glaux_core::{Config, Session, compile};
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {:#}", "Error".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never interleave with program output on stdout.
/// `RUST_LOG` wins over the configured verbosity.
fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "glaux=warn",
        _ => "glaux=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn execute(cli: &Cli) -> Result<()> {
    let mut config = loader::load_config(cli.config.as_deref())?;
    cli.apply(&mut config);
    init_tracing(config.vm.verbosity);
    debug!(?config, "effective configuration");

    match &cli.command {
        Some(Commands::Run(args)) => run_file(&args.file, config),
        Some(Commands::Disasm(args)) => {
            let compiled = compile_file(&args.file, &config)?;
            print!("{}", compiled.disassemble());
            Ok(())
        }
        Some(Commands::Resolve(args)) => {
            let compiled = compile_file(&args.file, &config)?;
            print!("{}", compiled.scopes.dump());
            Ok(())
        }
        Some(Commands::Repl) | None => {
            let mut repl = repl::Repl::new(config).context("failed to start the REPL")?;
            repl.run()?;
            Ok(())
        }
    }
}

fn run_file(path: &Path, config: Config) -> Result<()> {
    let mut program = loader::load_program(path)?;
    let mut session = Session::new(config);
    session.eval(&mut program)?;
    Ok(())
}

fn compile_file(path: &Path, config: &Config) -> Result<glaux_core::Compiled> {
    let mut program = loader::load_program(path)?;
    Ok(compile(&mut program, &config.compiler)?)
}
