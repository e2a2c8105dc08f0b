//! Shorthand constructors for building trees in code.
//!
//! ```rust,ignore
//! use glaux_core::ast::build::*;
//!
//! let tree = program(vec![
//!     function("inc", &["x"], vec![return_stmt(binary(BinaryOp::Add, var("x"), int(1)))]),
//!     println(call("inc", vec![int(41)])),
//! ]);
//! ```

pub use super::{BinaryOp, UnaryOp, UpdateOp};
use super::{Block, Expr, FunctionDef, Ident, Lambda, Literal, Program, Stmt, StructDef};

fn boxed(expr: Expr) -> Box<Expr> {
    Box::new(expr)
}

fn idents(names: &[&str]) -> Vec<Ident> {
    names.iter().map(|n| Ident::new(*n)).collect()
}

/// A program from its top-level statements.
pub fn program(body: Vec<Stmt>) -> Program {
    Program { body }
}

/// Identifier reference.
pub fn var(name: &str) -> Expr {
    Expr::Ident(Ident::new(name))
}

/// Integer literal.
pub fn int(n: i64) -> Expr {
    Expr::Literal {
        value: Literal::Number(n.to_string()),
    }
}

/// Numeric literal from raw token text.
pub fn number(text: &str) -> Expr {
    Expr::Literal {
        value: Literal::Number(text.to_owned()),
    }
}

/// Text literal.
pub fn text(s: &str) -> Expr {
    Expr::Literal {
        value: Literal::Text(s.to_owned()),
    }
}

/// true or false.
pub fn boolean(b: bool) -> Expr {
    Expr::Literal {
        value: if b { Literal::True } else { Literal::False },
    }
}

/// nil.
pub fn nil() -> Expr {
    Expr::Literal {
        value: Literal::Nil,
    }
}

/// Binary operation.
pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: boxed(left),
        right: boxed(right),
    }
}

/// Unary operation.
pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: boxed(operand),
    }
}

/// Assignment.
pub fn assign(target: Expr, value: Expr) -> Expr {
    Expr::Assign {
        target: boxed(target),
        value: boxed(value),
    }
}

/// `name++`.
pub fn increment(name: &str) -> Expr {
    Expr::Update {
        op: UpdateOp::Increment,
        target: Ident::new(name),
    }
}

/// `name--`.
pub fn decrement(name: &str) -> Expr {
    Expr::Update {
        op: UpdateOp::Decrement,
        target: Ident::new(name),
    }
}

/// Call of a named function or variable.
pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    call_expr(var(name), args)
}

/// Call of an arbitrary callee expression.
pub fn call_expr(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: boxed(callee),
        args,
    }
}

/// Anonymous function.
pub fn lambda(params: &[&str], body: Vec<Stmt>) -> Expr {
    Expr::Lambda(Lambda {
        params: idents(params),
        body,
        scope: None,
        function: None,
    })
}

/// List literal.
pub fn list(items: Vec<Expr>) -> Expr {
    Expr::List { items }
}

/// `target[index]`.
pub fn index(target: Expr, index: Expr) -> Expr {
    Expr::Index {
        target: boxed(target),
        index: boxed(index),
    }
}

/// `target.field`.
pub fn field(target: Expr, field: &str) -> Expr {
    Expr::Field {
        target: boxed(target),
        field: field.to_owned(),
    }
}

/// Append to the back of a list.
pub fn append(list: Expr, item: Expr) -> Expr {
    Expr::Append {
        list: boxed(list),
        item: boxed(item),
    }
}

/// Push onto the front of a list.
pub fn push(list: Expr, item: Expr) -> Expr {
    Expr::Push {
        list: boxed(list),
        item: boxed(item),
    }
}

/// List length.
pub fn size(list: Expr) -> Expr {
    Expr::Size { list: boxed(list) }
}

/// Struct construction.
pub fn make(name: &str, args: Vec<Expr>) -> Expr {
    Expr::StructInit {
        name: Ident::new(name),
        args,
    }
}

/// `let name = init`.
pub fn let_stmt(name: &str, init: Expr) -> Stmt {
    Stmt::Let {
        name: Ident::new(name),
        init: Some(init),
    }
}

/// `let name` with no initializer.
pub fn declare(name: &str) -> Stmt {
    Stmt::Let {
        name: Ident::new(name),
        init: None,
    }
}

/// Named function definition.
pub fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::Function(FunctionDef {
        name: Ident::new(name),
        params: idents(params),
        body,
        scope: None,
        function: None,
    })
}

/// Struct type definition.
pub fn struct_def(name: &str, fields: &[&str]) -> Stmt {
    Stmt::Struct(StructDef {
        name: Ident::new(name),
        fields: fields.iter().map(|f| (*f).to_owned()).collect(),
        scope: None,
        prototype: None,
    })
}

/// Nested block.
pub fn block(body: Vec<Stmt>) -> Stmt {
    Stmt::Block(Block { body, scope: None })
}

/// `if` without `else`.
pub fn if_stmt(condition: Expr, then_branch: Vec<Stmt>) -> Stmt {
    Stmt::If {
        condition,
        then_branch,
        else_branch: None,
    }
}

/// `if` with `else`.
pub fn if_else(condition: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Stmt {
    Stmt::If {
        condition,
        then_branch,
        else_branch: Some(else_branch),
    }
}

/// `while` loop.
pub fn while_loop(condition: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While { condition, body }
}

/// `print` without newline.
pub fn print(value: Expr) -> Stmt {
    Stmt::Print {
        value,
        newline: false,
    }
}

/// `println`.
pub fn println(value: Expr) -> Stmt {
    Stmt::Print {
        value,
        newline: true,
    }
}

/// `return value`.
pub fn return_stmt(value: Expr) -> Stmt {
    Stmt::Return { value: Some(value) }
}

/// Bare `return`.
pub fn return_nil() -> Stmt {
    Stmt::Return { value: None }
}

/// Expression statement.
pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expression { expr }
}
