//! Abstract Syntax Tree definitions.
//!
//! The tree is produced by an external parser and handed to the compiler
//! mutably: resolution writes scope ids and identifier addresses into the
//! annotation fields (the ones marked `#[serde(skip)]`), and code
//! generation reads them back.
//!
//! The serialized form is JSON with a `kind` tag on every statement and
//! expression, which is what the command-line harness reads.

pub mod build;

use serde::{Deserialize, Serialize};

use crate::compiler::resolver::{Resolution, ScopeId};
use crate::runtime::ConstIndex;

/// A complete program (or one REPL unit).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// Top-level statements
    pub body: Vec<Stmt>,
}

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    /// The identifier name
    pub name: String,
    /// Address and scope level, filled in by resolution
    #[serde(skip)]
    pub resolution: Option<Resolution>,
}

impl Ident {
    /// Creates an unresolved identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolution: None,
        }
    }
}

/// Statement types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    /// Named function definition
    Function(FunctionDef),
    /// Struct type definition
    Struct(StructDef),
    /// Nested block with its own scope
    Block(Block),
    /// if / else
    If {
        /// Condition
        condition: Expr,
        /// Taken when the condition is truthy
        then_branch: Vec<Stmt>,
        /// Taken otherwise
        #[serde(default)]
        else_branch: Option<Vec<Stmt>>,
    },
    /// while loop
    While {
        /// Loop condition
        condition: Expr,
        /// Loop body
        body: Vec<Stmt>,
    },
    /// Variable declaration
    Let {
        /// Declared name
        name: Ident,
        /// Initializer; nil when absent
        #[serde(default)]
        init: Option<Expr>,
    },
    /// print / println
    Print {
        /// Value to print
        value: Expr,
        /// Emit a newline afterwards
        #[serde(default)]
        newline: bool,
    },
    /// Return from the innermost function
    Return {
        /// Returned value; nil when absent
        #[serde(default)]
        value: Option<Expr>,
    },
    /// Expression evaluated for its effect
    Expression {
        /// The expression
        expr: Expr,
    },
}

/// A named function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name
    pub name: Ident,
    /// Parameters
    pub params: Vec<Ident>,
    /// Body
    pub body: Vec<Stmt>,
    /// Body scope
    #[serde(skip)]
    pub scope: Option<ScopeId>,
    /// Pool entry of the function
    #[serde(skip)]
    pub function: Option<ConstIndex>,
}

/// An anonymous function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    /// Parameters
    pub params: Vec<Ident>,
    /// Body
    pub body: Vec<Stmt>,
    /// Body scope
    #[serde(skip)]
    pub scope: Option<ScopeId>,
    /// Pool entry of the function
    #[serde(skip)]
    pub function: Option<ConstIndex>,
}

/// A struct type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    /// Type name
    pub name: Ident,
    /// Field names in declaration order
    pub fields: Vec<String>,
    /// Field scope
    #[serde(skip)]
    pub scope: Option<ScopeId>,
    /// Pool entry of the prototype instance
    #[serde(skip)]
    pub prototype: Option<ConstIndex>,
}

/// A nested block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Statements
    pub body: Vec<Stmt>,
    /// Block scope
    #[serde(skip)]
    pub scope: Option<ScopeId>,
}

/// Expression types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Literal value
    Literal {
        /// Token
        value: Literal,
    },
    /// Identifier reference
    Ident(Ident),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Assignment to a variable, list element or struct field
    Assign {
        /// Identifier, index or field expression
        target: Box<Expr>,
        /// Assigned value
        value: Box<Expr>,
    },
    /// In-place increment or decrement of a variable
    Update {
        /// Direction
        op: UpdateOp,
        /// Variable
        target: Ident,
    },
    /// Anonymous function
    Lambda(Lambda),
    /// Function call
    Call {
        /// Callee
        callee: Box<Expr>,
        /// Arguments
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// List literal
    List {
        /// Elements
        #[serde(default)]
        items: Vec<Expr>,
    },
    /// List element read
    Index {
        /// The list
        target: Box<Expr>,
        /// The index
        index: Box<Expr>,
    },
    /// Struct field read
    Field {
        /// The struct instance
        target: Box<Expr>,
        /// Field name
        field: String,
    },
    /// Append to the back of a list
    Append {
        /// The list
        list: Box<Expr>,
        /// Element to add
        item: Box<Expr>,
    },
    /// Push onto the front of a list
    Push {
        /// The list
        list: Box<Expr>,
        /// Element to add
        item: Box<Expr>,
    },
    /// List length
    Size {
        /// The list
        list: Box<Expr>,
    },
    /// Struct construction
    StructInit {
        /// Struct type
        name: Ident,
        /// Field values in declaration order
        #[serde(default)]
        args: Vec<Expr>,
    },
}

/// A literal token.
///
/// Numbers keep their raw text; the generator decides between an integer
/// and a float constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    /// Numeric literal text
    Number(String),
    /// Text literal
    Text(String),
    /// true
    True,
    /// false
    False,
    /// nil
    Nil,
}

/// Binary operators. The discriminant is the instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BinaryOp {
    /// +
    Add = 1,
    /// -
    Sub = 2,
    /// *
    Mul = 3,
    /// /
    Div = 4,
    /// %
    Mod = 5,
    /// <
    Lt = 7,
    /// >
    Gt = 8,
    /// ==
    Eq = 9,
    /// !=
    Ne = 10,
    /// <=
    Le = 12,
    /// >=
    Ge = 13,
    /// and
    And = 14,
    /// or
    Or = 15,
}

impl BinaryOp {
    const ALL: [BinaryOp; 13] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Le,
        BinaryOp::Ge,
        BinaryOp::And,
        BinaryOp::Or,
    ];

    /// Instruction operand code.
    pub fn code(self) -> i64 {
        self as u8 as i64
    }

    /// Decodes an instruction operand.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Unary operators. The discriminant is the instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum UnaryOp {
    /// -x
    Neg = 11,
    /// not x
    Not = 16,
}

impl UnaryOp {
    /// Instruction operand code.
    pub fn code(self) -> i64 {
        self as u8 as i64
    }

    /// Decodes an instruction operand.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            11 => Some(UnaryOp::Neg),
            16 => Some(UnaryOp::Not),
            _ => None,
        }
    }

    /// Source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }
}

/// Increment or decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOp {
    /// ++
    Increment,
    /// --
    Decrement,
}
