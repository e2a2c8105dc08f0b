//! Error types for compilation and execution.

use thiserror::Error;

use crate::compiler::resolver::Diagnostic;

/// Result type for the compile-and-run pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// Any error the pipeline can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// The program could not be compiled
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The program failed while running
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Errors raised while turning a syntax tree into bytecode.
#[derive(Debug, Error)]
pub enum CompileError {
    /// One or more resolution diagnostics were collected
    #[error("{}", render_diagnostics(.0))]
    Resolution(Vec<Diagnostic>),

    /// A literal's token text is not a valid number
    #[error("invalid numeric literal '{0}'")]
    InvalidLiteral(String),

    /// The fixed-capacity instruction buffer is full
    #[error("instruction buffer exhausted (capacity {capacity})")]
    CodeBufferExhausted {
        /// Configured buffer capacity
        capacity: usize,
    },

    /// A frame would need more slots than the configured maximum
    #[error("scope '{scope}' needs {count} slots, the maximum is {max}")]
    TooManyLocals {
        /// Name of the offending scope
        scope: String,
        /// Slots required
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// The generator reached an inconsistent state
    #[error("internal compiler error: {0}")]
    Internal(String),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors raised by the virtual machine.
///
/// Every operand shape the VM cannot handle ends up here instead of
/// corrupting interpreter state.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An operator was applied to operands of the wrong shape
    #[error("TypeError: cannot apply '{op}' to {operands}")]
    Type {
        /// The operation that failed
        op: &'static str,
        /// Description of the operand types
        operands: String,
    },

    /// Integer or float division (or remainder) by zero
    #[error("division by zero")]
    DivisionByZero,

    /// A list index outside `0..len`
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// List length
        len: usize,
    },

    /// A call target that is not a closure
    #[error("TypeError: {0} is not callable")]
    NotCallable(String),

    /// Wrong number of arguments
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        /// Function name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Arguments supplied
        found: usize,
    },

    /// Field lookup on a struct that does not declare it
    #[error("struct '{target}' has no field '{field}'")]
    NoSuchField {
        /// Requested field
        field: String,
        /// Struct type name
        target: String,
    },

    /// More constructor arguments than declared fields
    #[error("struct '{name}' has {expected} field(s), got {found} argument(s)")]
    TooManyFields {
        /// Struct type name
        name: String,
        /// Declared field count
        expected: usize,
        /// Arguments supplied
        found: usize,
    },

    /// The operand stack grew past its limit
    #[error("operand stack overflow (limit {limit})")]
    StackOverflow {
        /// Configured limit
        limit: usize,
    },

    /// An instruction popped an empty operand stack
    #[error("operand stack underflow")]
    StackUnderflow,

    /// Too many nested activations
    #[error("maximum call depth {limit} exceeded")]
    CallDepthExceeded {
        /// Configured limit
        limit: usize,
    },

    /// `return` executed with no call frame on the control chain
    #[error("return outside of a function")]
    ReturnOutsideFunction,

    /// A handle referred to a reclaimed heap cell
    #[error("dangling heap reference")]
    DanglingReference,

    /// An instruction's operands do not match its opcode
    #[error("malformed instruction '{opcode}' at {ip}")]
    MalformedInstruction {
        /// Address of the instruction
        ip: usize,
        /// Mnemonic of the instruction
        opcode: &'static str,
    },

    /// Writing program output failed
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::resolver::DiagnosticKind;

    #[test]
    fn test_resolution_error_lists_every_diagnostic() {
        let err = CompileError::Resolution(vec![
            Diagnostic::new(DiagnosticKind::Undeclared, "x"),
            Diagnostic::new(DiagnosticKind::DuplicateDeclaration, "y"),
        ]);
        let text = err.to_string();
        assert!(text.contains("'x'"));
        assert!(text.contains("'y'"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_runtime_error_wraps_into_error() {
        let err: Error = RuntimeError::DivisionByZero.into();
        assert!(matches!(err, Error::Runtime(RuntimeError::DivisionByZero)));
        assert_eq!(err.to_string(), "division by zero");
    }
}
