// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Reading syntax trees and configuration files.
//!
//! Syntax trees arrive as JSON from the external parser. A file may hold a
//! whole program (`{"body": [...]}`), a bare list of statements or a single
//! statement. Interactive input additionally accepts a bare expression,
//! which is printed.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glaux_core::Config;
use glaux_core::ast::{Expr, Program, Stmt};
use tracing::debug;

/// Default configuration file, `<config dir>/glaux/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("glaux").join("config.toml"))
}

/// Loads the configuration from `path`, or from the default location if it
/// exists, or falls back to the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };
    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    let config = parse_config(&text)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    debug!(path = %path.display(), ?config, "loaded configuration");
    Ok(config)
}

/// Parses a TOML configuration.
pub fn parse_config(text: &str) -> Result<Config> {
    Ok(toml::from_str(text)?)
}

/// Reads a syntax tree from a file, or from standard input for `-`.
pub fn load_program(path: &Path) -> Result<Program> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read standard input")?;
        text
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    parse_program(&text).with_context(|| format!("{} is not a valid syntax tree", path.display()))
}

/// Parses a program, a statement list or a single statement.
pub fn parse_program(text: &str) -> Result<Program> {
    let program_error = match serde_json::from_str::<Program>(text) {
        Ok(program) => return Ok(program),
        Err(err) => err,
    };
    if let Ok(body) = serde_json::from_str::<Vec<Stmt>>(text) {
        return Ok(Program { body });
    }
    if let Ok(stmt) = serde_json::from_str::<Stmt>(text) {
        return Ok(Program { body: vec![stmt] });
    }
    Err(program_error.into())
}

/// Parses one interactive unit. A bare expression is wrapped so its value
/// gets printed.
pub fn parse_unit(text: &str) -> Result<Program> {
    if let Ok(value) = serde_json::from_str::<Expr>(text) {
        return Ok(Program {
            body: vec![Stmt::Print {
                value,
                newline: true,
            }],
        });
    }
    parse_program(text)
}
