//! Tests for code generation.

use super::*;
use crate::ast::build::*;
use crate::compiler::{Compiled, Compiler, compile};
use crate::config::CompilerConfig;
use crate::gc::Heap;
use crate::runtime::ConstPool;

fn compile_ok(mut tree: Program) -> Compiled {
    compile(&mut tree, &CompilerConfig::default()).expect("compilation should succeed")
}

fn compile_with(mut tree: Program, config: CompilerConfig) -> Result<Compiled, CompileError> {
    compile(&mut tree, &config)
}

fn opcodes(code: &[Instruction]) -> Vec<OpCode> {
    code.iter().map(|i| i.opcode).collect()
}

fn find(code: &[Instruction], opcode: OpCode) -> Vec<&Instruction> {
    code.iter().filter(|i| i.opcode == opcode).collect()
}

#[test]
fn test_empty_program() {
    let compiled = compile_ok(program(vec![]));
    assert_eq!(opcodes(&compiled.code), vec![OpCode::Halt]);
}

#[test]
fn test_global_let() {
    let compiled = compile_ok(program(vec![let_stmt("x", int(5))]));
    assert_eq!(
        opcodes(&compiled.code),
        vec![
            OpCode::LoadConst,
            OpCode::LoadGlobalAddr,
            OpCode::StoreGlobal,
            OpCode::Halt,
        ]
    );
    let constant = compiled.code[0].constant().unwrap();
    assert_eq!(compiled.pool.get(constant), Some(crate::runtime::Value::Integer(5)));
    assert_eq!(compiled.code[1].index(0), Some(1));
}

#[test]
fn test_declaration_without_initializer_stores_nil() {
    let compiled = compile_ok(program(vec![declare("x")]));
    assert_eq!(compiled.code[0].opcode, OpCode::LoadImmediate);
    assert!(compiled.code[0].operands[0].is_nil());
}

#[test]
fn test_function_body_is_skipped() {
    let compiled = compile_ok(program(vec![function(
        "f",
        &["a"],
        vec![return_stmt(var("a"))],
    )]));
    assert_eq!(
        opcodes(&compiled.code),
        vec![
            OpCode::Jump,
            OpCode::LoadLocal,
            OpCode::Return,
            OpCode::LoadImmediate,
            OpCode::Return,
            OpCode::MakeClosure,
            OpCode::LoadGlobalAddr,
            OpCode::StoreGlobal,
            OpCode::Halt,
        ]
    );
    assert_eq!(compiled.code[0].jump_target(), Some(5));

    let constant = compiled.code[5].constant().unwrap();
    let descriptor = compiled.pool.function(&compiled.heap, constant).unwrap();
    assert_eq!(descriptor.start, Some(1));
    assert_eq!(descriptor.arity, 1);
    assert_eq!(descriptor.frame_size(), 2);
}

#[test]
fn test_if_else_targets() {
    let compiled = compile_ok(program(vec![if_else(
        boolean(true),
        vec![println(int(1))],
        vec![println(int(2))],
    )]));
    let code = &compiled.code;
    let branch = code.iter().position(|i| i.opcode == OpCode::BranchIfFalse).unwrap();
    let jump = code.iter().position(|i| i.opcode == OpCode::Jump).unwrap();
    assert_eq!(code[branch].jump_target(), Some(jump + 1));
    assert_eq!(code[jump].jump_target(), Some(code.len() - 1));
}

#[test]
fn test_while_jumps_back_to_condition() {
    let compiled = compile_ok(program(vec![
        let_stmt("i", int(0)),
        while_loop(
            binary(BinaryOp::Lt, var("i"), int(3)),
            vec![expr_stmt(increment("i"))],
        ),
    ]));
    let code = &compiled.code;
    let jump = find(code, OpCode::Jump)[0];
    assert_eq!(jump.jump_target(), Some(3));
    assert_eq!(code[3].opcode, OpCode::LoadGlobal);
    let exit = find(code, OpCode::BranchIfFalse)[0];
    assert_eq!(exit.jump_target(), Some(code.len() - 1));
}

#[test]
fn test_jump_targets_land_on_instructions() {
    let compiled = compile_ok(program(vec![
        function(
            "f",
            &["n"],
            vec![
                if_else(
                    binary(BinaryOp::Lt, var("n"), int(2)),
                    vec![return_stmt(int(1))],
                    vec![block(vec![let_stmt("m", var("n"))])],
                ),
                while_loop(var("n"), vec![expr_stmt(decrement("n"))]),
                return_stmt(lambda(&[], vec![return_stmt(var("n"))])),
            ],
        ),
        expr_stmt(call("f", vec![int(3)])),
    ]));
    for instruction in &compiled.code {
        assert_ne!(instruction.opcode, OpCode::Nop, "unpatched reservation");
        if let Some(target) = instruction.jump_target() {
            assert!(target < compiled.code.len());
        }
    }
}

#[test]
fn test_block_frames() {
    let compiled = compile_ok(program(vec![block(vec![
        let_stmt("a", int(1)),
        let_stmt("b", int(2)),
    ])]));
    let code = &compiled.code;
    assert_eq!(code[0].opcode, OpCode::EnterBlock);
    assert_eq!(code[0].index(0), Some(3));
    assert_eq!(code[code.len() - 2].opcode, OpCode::LeaveBlock);
    assert_eq!(find(code, OpCode::StoreLocal).len(), 2);
}

#[test]
fn test_upvalue_store() {
    let compiled = compile_ok(program(vec![function(
        "f",
        &["a"],
        vec![block(vec![expr_stmt(assign(var("a"), int(2)))])],
    )]));
    let stores = find(&compiled.code, OpCode::StoreUpvalue);
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].index(0), Some(1));
}

#[test]
fn test_static_and_dynamic_calls() {
    let compiled = compile_ok(program(vec![
        function("f", &[], vec![]),
        let_stmt("g", lambda(&[], vec![])),
        expr_stmt(call("f", vec![])),
        expr_stmt(call("g", vec![])),
    ]));
    let calls = find(&compiled.code, OpCode::Call);
    assert_eq!(calls.len(), 2);
    assert!(calls[0].int(0).unwrap() >= 0);
    assert_eq!(calls[0].int(2), Some(-1));
    assert_eq!(calls[1].int(0), Some(-1));
}

#[test]
fn test_text_literals_are_interned() {
    let compiled = compile_ok(program(vec![println(text("hi")), println(text("hi"))]));
    let loads = find(&compiled.code, OpCode::LoadConst);
    assert_eq!(loads[0].constant(), loads[1].constant());
}

#[test]
fn test_field_names_go_through_the_pool() {
    let compiled = compile_ok(program(vec![
        struct_def("P", &["x"]),
        println(field(make("P", vec![int(1)]), "x")),
    ]));
    let load = find(&compiled.code, OpCode::LoadField)[0];
    assert_eq!(compiled.pool.text(&compiled.heap, load.constant().unwrap()), Some("x"));
    assert_eq!(find(&compiled.code, OpCode::DefineStruct).len(), 1);
    assert_eq!(find(&compiled.code, OpCode::MakeStruct)[0].index(0), Some(1));
}

#[test]
fn test_invalid_numeric_literal() {
    let err = compile_with(program(vec![println(number("1.2.3"))]), CompilerConfig::default())
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidLiteral(text) if text == "1.2.3"));
}

#[test]
fn test_too_many_locals() {
    let config = CompilerConfig {
        max_frame_slots: 2,
        ..CompilerConfig::default()
    };
    let err = compile_with(program(vec![function("f", &["a", "b"], vec![])]), config)
        .unwrap_err();
    assert!(matches!(err, CompileError::TooManyLocals { count: 3, max: 2, .. }));
}

#[test]
fn test_code_buffer_exhausted() {
    let config = CompilerConfig {
        code_capacity: 4,
        ..CompilerConfig::default()
    };
    let err = compile_with(program(vec![println(int(1)), println(int(2))]), config)
        .unwrap_err();
    assert!(matches!(err, CompileError::CodeBufferExhausted { capacity: 4 }));
}

#[test]
fn test_incremental_units_overwrite_halt() {
    let mut compiler = Compiler::new(CompilerConfig::default());
    let mut pool = ConstPool::new();
    let mut heap = Heap::new();

    let first = compiler
        .compile_unit(&mut program(vec![let_stmt("x", int(1))]), &mut pool, &mut heap)
        .unwrap();
    assert_eq!(first, 0);
    let second = compiler
        .compile_unit(&mut program(vec![println(var("x"))]), &mut pool, &mut heap)
        .unwrap();
    assert_eq!(second, 3);
    assert_eq!(find(compiler.instructions(), OpCode::Halt).len(), 1);
}

#[test]
fn test_failed_unit_is_rolled_back() {
    let mut compiler = Compiler::new(CompilerConfig::default());
    let mut pool = ConstPool::new();
    let mut heap = Heap::new();

    compiler
        .compile_unit(&mut program(vec![let_stmt("x", int(1))]), &mut pool, &mut heap)
        .unwrap();
    let before = compiler.instructions().to_vec();

    let err = compiler
        .compile_unit(
            &mut program(vec![let_stmt("y", int(2)), println(var("missing"))]),
            &mut pool,
            &mut heap,
        )
        .unwrap_err();
    assert!(matches!(err, CompileError::Resolution(_)));
    assert_eq!(compiler.instructions(), before.as_slice());
    assert!(compiler.scopes().global().lookup_local("y").is_none());
    assert_eq!(compiler.global_slots(), 2);
}
