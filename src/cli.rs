// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use glaux_core::Config;

/// glaux - compile and run Glaux syntax trees on the bytecode VM
#[derive(Parser, Debug)]
#[command(name = "glaux")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Trace execution (-v instructions, -vv adds the stack, -vvv adds frames)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Collect garbage on every frame teardown
    #[arg(long, global = true)]
    pub gc_stress: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile and run a syntax tree
    Run(FileArgs),

    /// Print the bytecode listing of a syntax tree
    #[command(alias = "dis")]
    Disasm(FileArgs),

    /// Print the resolved scope table of a syntax tree
    Resolve(FileArgs),

    /// Start an interactive session (the default)
    Repl,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// JSON syntax tree, or `-` for standard input
    pub file: PathBuf,
}

impl Cli {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        config.vm.verbosity = config.vm.verbosity.max(self.verbose.min(3));
        config.vm.gc_stress |= self.gc_stress;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::parse_from(["glaux", "-vv", "run", "tree.json", "--gc-stress"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.gc_stress);
        assert!(matches!(cli.command, Some(Commands::Run(ref args)) if args.file == PathBuf::from("tree.json")));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["glaux", "-vvvvv", "--gc-stress", "repl"]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.vm.verbosity, 3);
        assert!(config.vm.gc_stress);
    }

    #[test]
    fn test_no_subcommand_means_repl() {
        let cli = Cli::parse_from(["glaux"]);
        assert!(cli.command.is_none());
    }
}
