//! The JSON form of the syntax tree, as produced by an external parser.

use glaux_core::ast::{Expr, Program, Stmt};
use glaux_core::{Config, Session};

fn eval_json(json: &str) -> String {
    let mut program: Program = serde_json::from_str(json).unwrap();
    let mut session = Session::with_output(Config::default(), Vec::new());
    session.eval(&mut program).unwrap();
    String::from_utf8(session.output().clone()).unwrap()
}

#[test]
fn test_closure_program_from_json() {
    let json = r#"{
      "body": [
        { "kind": "function", "name": { "name": "make" },
          "params": [ { "name": "n" } ],
          "body": [
            { "kind": "function", "name": { "name": "get" }, "params": [],
              "body": [ { "kind": "return", "value": { "kind": "ident", "name": "n" } } ] },
            { "kind": "return", "value": { "kind": "ident", "name": "get" } }
          ] },
        { "kind": "let", "name": { "name": "a" },
          "init": { "kind": "call", "callee": { "kind": "ident", "name": "make" },
                    "args": [ { "kind": "literal", "value": { "number": "1" } } ] } },
        { "kind": "let", "name": { "name": "b" },
          "init": { "kind": "call", "callee": { "kind": "ident", "name": "make" },
                    "args": [ { "kind": "literal", "value": { "number": "2" } } ] } },
        { "kind": "print", "newline": true,
          "value": { "kind": "call", "callee": { "kind": "ident", "name": "a" } } },
        { "kind": "print", "newline": true,
          "value": { "kind": "call", "callee": { "kind": "ident", "name": "b" } } }
      ]
    }"#;
    assert_eq!(eval_json(json), "1\n2\n");
}

#[test]
fn test_every_statement_kind_parses() {
    let json = r#"{
      "body": [
        { "kind": "struct", "name": { "name": "P" }, "fields": ["x"] },
        { "kind": "let", "name": { "name": "i" } },
        { "kind": "expression", "expr": { "kind": "assign",
            "target": { "kind": "ident", "name": "i" },
            "value": { "kind": "literal", "value": { "number": "0" } } } },
        { "kind": "while",
          "condition": { "kind": "binary", "op": "lt",
                         "left": { "kind": "ident", "name": "i" },
                         "right": { "kind": "literal", "value": { "number": "2" } } },
          "body": [
            { "kind": "block", "body": [
              { "kind": "print", "value": { "kind": "ident", "name": "i" } }
            ] },
            { "kind": "expression",
              "expr": { "kind": "update", "op": "increment", "target": { "name": "i" } } }
          ] },
        { "kind": "if",
          "condition": { "kind": "unary", "op": "not", "operand": { "kind": "literal", "value": "false" } },
          "then_branch": [
            { "kind": "print", "newline": true, "value": {
                "kind": "field", "field": "x",
                "target": { "kind": "struct_init", "name": { "name": "P" },
                            "args": [ { "kind": "literal", "value": { "text": "ok" } } ] } } }
          ],
          "else_branch": [] },
        { "kind": "print", "newline": true, "value": {
            "kind": "size", "list": { "kind": "list", "items": [
              { "kind": "literal", "value": "nil" },
              { "kind": "lambda", "params": [], "body": [] } ] } } }
      ]
    }"#;
    assert_eq!(eval_json(json), "01ok\n2\n");
}

#[test]
fn test_annotations_are_not_serialized() {
    let mut program = glaux_core::ast::build::program(vec![glaux_core::ast::build::let_stmt(
        "x",
        glaux_core::ast::build::int(1),
    )]);
    let mut session = Session::with_output(Config::default(), Vec::new());
    session.eval(&mut program).unwrap();

    let Stmt::Let { name, init } = &program.body[0] else {
        panic!("expected let");
    };
    assert!(name.resolution.is_some());
    assert!(matches!(init, Some(Expr::Literal { .. })));

    let json = serde_json::to_string(&program).unwrap();
    assert!(!json.contains("resolution"));
    let back: Program = serde_json::from_str(&json).unwrap();
    let Stmt::Let { name, .. } = &back.body[0] else {
        panic!("expected let");
    };
    assert!(name.resolution.is_none());
}
