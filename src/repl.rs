// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive session.
//!
//! Each entry is one JSON syntax tree: a program, a statement list, a single
//! statement or a bare expression (which is printed). Entries compile as
//! incremental units against one [`Session`], so globals persist between
//! them.

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config as EditorConfig, Editor, Helper};
use glaux_core::{Config, Session};
use std::borrow::Cow;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::loader;

const HISTORY_FILE: &str = ".glaux_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// Words offered by completion: node kinds, operators and field names of
/// the JSON syntax tree.
const TREE_WORDS: &[&str] = &[
    // statements
    "function",
    "struct",
    "block",
    "if",
    "while",
    "let",
    "print",
    "return",
    "expression",
    // expressions
    "literal",
    "ident",
    "binary",
    "unary",
    "assign",
    "update",
    "lambda",
    "call",
    "list",
    "index",
    "field",
    "append",
    "push",
    "size",
    "struct_init",
    // operators
    "add",
    "sub",
    "mul",
    "div",
    "mod",
    "eq",
    "ne",
    "lt",
    "le",
    "gt",
    "ge",
    "and",
    "or",
    "not",
    "neg",
    "increment",
    "decrement",
    // fields
    "kind",
    "name",
    "params",
    "body",
    "fields",
    "condition",
    "then_branch",
    "else_branch",
    "init",
    "value",
    "newline",
    "expr",
    "op",
    "left",
    "right",
    "operand",
    "target",
    "callee",
    "args",
    "items",
    "number",
    "text",
];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Disasm,
    Scopes,
    Gc,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let parts: Vec<&str> = rest.splitn(2, char::is_whitespace).collect();
        let cmd = parts.first()?.to_lowercase();
        let arg = parts.get(1).copied();

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "disasm" | "dis" => Some((ReplCommand::Disasm, arg)),
            "scopes" => Some((ReplCommand::Scopes, arg)),
            "gc" => Some((ReplCommand::Gc, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Load and run a JSON syntax tree"),
            (".disasm", "Show the bytecode compiled so far"),
            (".scopes", "Show the resolved scope table"),
            (".gc", "Run the garbage collector"),
        ]
    }
}

/// Completion, hints, highlighting and validation for JSON input
struct GlauxHelper {
    words: Vec<String>,
}

impl GlauxHelper {
    fn new() -> Self {
        let mut words: Vec<String> = TREE_WORDS.iter().map(|w| w.to_string()).collect();
        words.extend(
            ReplCommand::all_commands()
                .iter()
                .filter_map(|(cmd, _)| cmd.split_whitespace().next())
                .map(str::to_string),
        );
        words.sort();
        words.dedup();
        Self { words }
    }
}

fn word_start(line: &str) -> usize {
    line.rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl Completer for GlauxHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[word_start(&line[..pos])..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for GlauxHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| w[word.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for GlauxHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut string = String::new();
        let mut in_string = false;
        let mut escape_next = false;

        for c in line.chars() {
            if in_string {
                string.push(c);
                if escape_next {
                    escape_next = false;
                } else if c == '\\' {
                    escape_next = true;
                } else if c == '"' {
                    result.push_str(&string.green().to_string());
                    string.clear();
                    in_string = false;
                }
                continue;
            }
            let colored = match c {
                '"' => {
                    in_string = true;
                    string.push(c);
                    continue;
                }
                '{' | '}' | '[' | ']' => c.yellow().to_string(),
                ':' | ',' => c.dimmed().to_string(),
                '0'..='9' | '-' | '.' => c.cyan().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }
        if !string.is_empty() {
            result.push_str(&string.green().to_string());
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for GlauxHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();

        if input.trim_start().starts_with('.') {
            return Ok(ValidationResult::Valid(None));
        }
        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        let trimmed = input.trim_end();
        if trimmed.ends_with(',') || trimmed.ends_with(':') {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

/// Check that JSON brackets and braces are balanced outside strings
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.pop() != Some(c) {
                    // mismatched; let the JSON parser report it
                    return true;
                }
            }
            _ => {}
        }
    }

    stack.is_empty() && !in_string
}

impl Helper for GlauxHelper {}

/// The interactive REPL for the Glaux VM
pub struct Repl {
    session: Session,
    editor: Editor<GlauxHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(config: Config) -> rustyline::Result<Self> {
        let editor_config = EditorConfig::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(editor_config)?;
        editor.set_helper(Some(GlauxHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glaux")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        Ok(Self {
            session: Session::new(config),
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            match self.editor.readline(&self.format_prompt()) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }
                    if trimmed.starts_with('.') {
                        print_error(&format!("Error: unknown command {trimmed}"));
                        continue;
                    }

                    self.eval(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "Glaux".bright_cyan().bold(),
            "v".dimmed(),
            env!("CARGO_PKG_VERSION").bright_yellow()
        );
        println!("  {}", "Bytecode VM for JSON syntax trees".dimmed());
        println!();
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn format_prompt(&self) -> String {
        format!("{} ", "glaux>".bright_green().bold())
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!("{}: {}", "Glaux".bright_cyan().bold(), env!("CARGO_PKG_VERSION").yellow());
            }
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(Path::new(path.trim())),
                None => eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    ".load".cyan(),
                    "requires a file path".dimmed()
                ),
            },
            ReplCommand::Disasm => print!("{}", self.session.disassemble()),
            ReplCommand::Scopes => print!("{}", self.session.scopes().dump()),
            ReplCommand::Gc => {
                let stats = self.session.vm_mut().collect();
                println!(
                    "{} {} objects, {} frames, {} constants; {} live, next at {}",
                    "freed".dimmed(),
                    stats.freed_objects.yellow(),
                    stats.freed_frames.yellow(),
                    stats.reclaimed_constants.yellow(),
                    stats.live.cyan(),
                    stats.next_threshold.cyan()
                );
            }
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();
        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }
        println!();
        println!("{}", "Input:".white().bold());
        println!();
        println!(
            "  {}",
            "A JSON program, statement list, statement or expression.".dimmed()
        );
        println!(
            "  {}",
            r#"{ "kind": "literal", "value": { "number": "42" } }"#.green()
        );
        println!();
    }

    fn load_file(&mut self, path: &Path) {
        match loader::load_program(path) {
            Ok(mut program) => {
                if let Err(e) = self.session.eval(&mut program) {
                    print_error(&e);
                }
            }
            Err(e) => print_error(&format!("Error: {e:#}")),
        }
    }

    fn eval(&mut self, input: &str) {
        match loader::parse_unit(input) {
            Ok(mut program) => {
                if let Err(e) = self.session.eval(&mut program) {
                    print_error(&e);
                }
            }
            Err(e) => print_error(&format!("SyntaxError: {e}")),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Print a formatted error message
fn print_error(error: &dyn Display) {
    let error_str = error.to_string();

    if let Some(colon_pos) = error_str.find(':') {
        let (error_type, message) = error_str.split_at(colon_pos);
        eprintln!("{}{}", error_type.red().bold(), message);
    } else {
        eprintln!("{}", error_str.red());
    }
}
