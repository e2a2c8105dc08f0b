//! The bytecode interpreter.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

use tracing::{trace, warn};

use super::operators;
use super::trace::{render_frames, render_stack};
use crate::ast::{BinaryOp, UnaryOp};
use crate::compiler::{Compiled, Instruction, OpCode, ScopeId};
use crate::config::VmConfig;
use crate::error::RuntimeError;
use crate::gc::{
    Closure, Collector, Frame, FrameKind, FrameRef, GcStats, Heap, HeapObject, ObjRef, Roots,
};
use crate::runtime::{ConstIndex, ConstPool, FunctionDescriptor, Value};

type Result<T> = std::result::Result<T, RuntimeError>;

/// What the dispatch loop does after an instruction.
enum Flow {
    Continue,
    Halt,
}

fn malformed(ip: usize, opcode: OpCode) -> RuntimeError {
    RuntimeError::MalformedInstruction {
        ip,
        opcode: opcode.mnemonic(),
    }
}

fn operand(ip: usize, instruction: &Instruction, n: usize) -> Result<usize> {
    instruction
        .index(n)
        .ok_or_else(|| malformed(ip, instruction.opcode))
}

/// The virtual machine that executes bytecode.
///
/// Owns the instruction array, the constant pool, the heap and the operand
/// stack. Program output goes to `W`.
pub struct Vm<W: Write = io::Stdout> {
    config: VmConfig,
    /// Loaded instructions
    code: Vec<Instruction>,
    /// Pool indices the loaded code refers to, sorted
    code_refs: Vec<ConstIndex>,
    pool: ConstPool,
    heap: Heap,
    collector: Collector,
    /// The operand stack
    stack: Vec<Value>,
    global: FrameRef,
    current: FrameRef,
    /// Instruction pointer
    ip: usize,
    out: W,
}

impl Vm<io::Stdout> {
    /// Creates a VM writing to standard output.
    pub fn new(config: VmConfig) -> Self {
        Self::with_output(config, io::stdout())
    }
}

impl<W: Write> Vm<W> {
    /// Creates a VM with an empty pool and heap.
    pub fn with_output(config: VmConfig, out: W) -> Self {
        Self::from_parts(config, ConstPool::new(), Heap::new(), out)
    }

    /// Creates a VM around an existing pool and heap.
    pub fn from_parts(config: VmConfig, pool: ConstPool, mut heap: Heap, out: W) -> Self {
        let global = heap.alloc_frame(Frame::global(1));
        Self {
            collector: Collector::new(&config),
            config,
            code: Vec::new(),
            code_refs: Vec::new(),
            pool,
            heap,
            stack: Vec::with_capacity(64),
            global,
            current: global,
            ip: 0,
            out,
        }
    }

    /// Creates a VM ready to run a one-shot compilation.
    pub fn from_compiled(compiled: Compiled, config: VmConfig, out: W) -> Self {
        let slots = compiled.global_slots();
        let mut vm = Self::from_parts(config, compiled.pool, compiled.heap, out);
        vm.load(&compiled.code, slots, 0);
        vm
    }

    /// Replaces the loaded code and positions the instruction pointer at
    /// `entry`. The global frame grows to `global_slots` if needed; its
    /// existing values are kept.
    pub fn load(&mut self, code: &[Instruction], global_slots: usize, entry: usize) {
        self.code.clear();
        self.code.extend_from_slice(code);

        self.code_refs = code.iter().filter_map(Instruction::constant).collect();
        self.code_refs.sort_unstable();
        self.code_refs.dedup();

        if let Some(frame) = self.heap.frame_mut(self.global) {
            if frame.slots.len() < global_slots {
                frame.slots.resize(global_slots, Value::Nil);
            }
        }
        self.ip = entry;
    }

    /// Runs until `halt`.
    ///
    /// On error the operand stack is cleared and execution state returns
    /// to the global frame, so the VM can load and run further code.
    pub fn run(&mut self) -> Result<()> {
        let result = self.execute();
        if let Err(err) = &result {
            warn!(target: "glaux::vm", ip = self.ip, %err, "execution aborted");
            let _ = self.out.flush();
            self.stack.clear();
            self.current = self.global;
            self.ip = self.code.len().saturating_sub(1);
        }
        result
    }

    /// Runs a full collection now.
    pub fn collect(&mut self) -> GcStats {
        let frames = [self.current, self.global];
        self.collector.collect(
            &mut self.heap,
            &mut self.pool,
            Roots {
                stack: &self.stack,
                frames: &frames,
                code_refs: &self.code_refs,
            },
        )
    }

    /// The heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The constant pool.
    pub fn pool(&self) -> &ConstPool {
        &self.pool
    }

    /// The collector.
    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    /// The operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// The loaded instructions.
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Value of global slot `addr`.
    pub fn global(&self, addr: usize) -> Option<Value> {
        self.heap.frame(self.global)?.slots.get(addr).copied()
    }

    /// The output sink.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Consumes the VM, returning the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut ConstPool, &mut Heap) {
        (&mut self.pool, &mut self.heap)
    }

    fn execute(&mut self) -> Result<()> {
        loop {
            let ip = self.ip;
            let instruction = *self.code.get(ip).ok_or(RuntimeError::MalformedInstruction {
                ip,
                opcode: "<end of code>",
            })?;
            self.ip += 1;

            if self.config.verbosity > 0 {
                self.trace_step(ip, &instruction);
            }

            if let Flow::Halt = self.step(ip, &instruction)? {
                return Ok(());
            }
        }
    }

    fn trace_step(&self, ip: usize, instruction: &Instruction) {
        trace!(target: "glaux::vm", "{ip:04}  {instruction}");
        if self.config.verbosity >= 2 {
            trace!(target: "glaux::vm", "      stack  {}", render_stack(&self.stack, &self.heap));
        }
        if self.config.verbosity >= 3 {
            trace!(target: "glaux::vm", "      frames {}", render_frames(&self.heap, self.current));
        }
    }

    fn step(&mut self, ip: usize, instruction: &Instruction) -> Result<Flow> {
        let opcode = instruction.opcode;
        match opcode {
            OpCode::LoadConst | OpCode::DefineStruct => {
                let index = operand(ip, instruction, 0)?;
                let value = self.pool.get(index).ok_or_else(|| malformed(ip, opcode))?;
                self.push(value)?;
            }
            OpCode::LoadImmediate => self.push(instruction.operands[0])?,

            OpCode::LoadGlobal => {
                let value = self.load_slot(self.global, operand(ip, instruction, 0)?, ip, opcode)?;
                self.push(value)?;
            }
            OpCode::LoadLocal => {
                let value = self.load_slot(self.current, operand(ip, instruction, 0)?, ip, opcode)?;
                self.push(value)?;
            }
            OpCode::LoadUpvalue => {
                let frame = self.hop(self.current, operand(ip, instruction, 1)?)?;
                let value = self.load_slot(frame, operand(ip, instruction, 0)?, ip, opcode)?;
                self.push(value)?;
            }
            OpCode::LoadGlobalAddr | OpCode::LoadLocalAddr => {
                let addr = operand(ip, instruction, 0)?;
                self.push(Value::Integer(addr as i64))?;
            }

            OpCode::StoreGlobal => self.store(self.global, ip, opcode)?,
            OpCode::StoreLocal => self.store(self.current, ip, opcode)?,
            OpCode::StoreUpvalue => {
                let frame = self.hop(self.current, operand(ip, instruction, 0)?)?;
                self.store(frame, ip, opcode)?;
            }

            OpCode::Call => self.call(ip, instruction)?,
            OpCode::Return => self.return_from_call()?,
            OpCode::EnterBlock => {
                let slots = operand(ip, instruction, 0)?;
                let scope = ScopeId::from_index(operand(ip, instruction, 1)?);
                self.push_frame(FrameKind::Block, scope, vec![Value::Nil; slots], self.current)?;
            }
            OpCode::LeaveBlock => {
                self.current = self
                    .frame(self.current)?
                    .control
                    .ok_or(RuntimeError::DanglingReference)?;
                self.maybe_collect();
            }

            OpCode::Jump => self.ip = self.jump_target(ip, instruction)?,
            OpCode::BranchIfFalse => {
                let target = self.jump_target(ip, instruction)?;
                if !self.pop()?.is_truthy() {
                    self.ip = target;
                }
            }

            OpCode::BinaryOp => {
                let op = instruction
                    .int(0)
                    .and_then(BinaryOp::from_code)
                    .ok_or_else(|| malformed(ip, opcode))?;
                let rhs = self.pop()?;
                let lhs = self.top()?;
                let result = operators::binary(op, lhs, rhs, &mut self.heap)?;
                *self.top_mut()? = result;
            }
            OpCode::UnaryOp => {
                let op = instruction
                    .int(0)
                    .and_then(UnaryOp::from_code)
                    .ok_or_else(|| malformed(ip, opcode))?;
                let result = operators::unary(op, self.top()?, &self.heap)?;
                *self.top_mut()? = result;
            }
            OpCode::Increment | OpCode::Decrement => {
                let delta = if opcode == OpCode::Increment { 1 } else { -1 };
                let result = operators::step(self.top()?, delta, &self.heap)?;
                *self.top_mut()? = result;
            }
            OpCode::Dup => {
                let value = self.top()?;
                self.push(value)?;
            }

            OpCode::MakeClosure => self.make_closure(ip, instruction)?,
            OpCode::MakeStruct => self.make_struct(operand(ip, instruction, 0)?)?,
            OpCode::MakeList => {
                let list = self.heap.alloc(HeapObject::List(VecDeque::new()));
                self.push(Value::Object(list))?;
            }

            OpCode::LoadIndex => {
                let index = self.pop()?;
                let list = self.pop()?;
                let items = self.list(list, "[]")?;
                let slot = list_slot(index, items.len(), &self.heap)?;
                let value = items[slot];
                self.push(value)?;
            }
            OpCode::StoreIndex => {
                let index = self.pop()?;
                let list = self.pop()?;
                let value = self.pop()?;
                let len = self.list(list, "[]=")?.len();
                let slot = list_slot(index, len, &self.heap)?;
                self.list_mut(list, "[]=")?[slot] = value;
            }
            OpCode::LoadField => {
                let field = self.field_name(ip, instruction)?;
                let target = self.pop()?;
                let value = self.load_field(target, &field)?;
                self.push(value)?;
            }
            OpCode::StoreField => {
                let field = self.field_name(ip, instruction)?;
                let target = self.pop()?;
                let value = self.pop()?;
                self.store_field(target, &field, value)?;
            }
            OpCode::ListAppend => {
                let item = self.pop()?;
                let list = self.top()?;
                self.list_mut(list, "append")?.push_back(item);
            }
            OpCode::ListPush => {
                let item = self.pop()?;
                let list = self.top()?;
                self.list_mut(list, "push")?.push_front(item);
            }
            OpCode::ListLength => {
                let list = self.pop()?;
                let len = self.list(list, "size")?.len();
                self.push(Value::Integer(len as i64))?;
            }

            OpCode::Print => {
                let value = self.pop()?;
                write!(self.out, "{}", value.display(&self.heap))?;
            }
            OpCode::PrintNewline => writeln!(self.out)?,
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Nop => {}
            OpCode::Halt => {
                self.out.flush()?;
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }

    // Operand stack

    fn push(&mut self, value: Value) -> Result<()> {
        if self.stack.len() >= self.config.max_operand_stack {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_operand_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn top(&self) -> Result<Value> {
        self.stack.last().copied().ok_or(RuntimeError::StackUnderflow)
    }

    fn top_mut(&mut self) -> Result<&mut Value> {
        self.stack.last_mut().ok_or(RuntimeError::StackUnderflow)
    }

    // Frames

    fn frame(&self, r: FrameRef) -> Result<&Frame> {
        self.heap.frame(r).ok_or(RuntimeError::DanglingReference)
    }

    /// Follows `hops` access links outward from `from`.
    fn hop(&self, from: FrameRef, hops: usize) -> Result<FrameRef> {
        let mut frame = from;
        for _ in 0..hops {
            frame = self
                .frame(frame)?
                .access
                .ok_or(RuntimeError::DanglingReference)?;
        }
        Ok(frame)
    }

    fn load_slot(&self, frame: FrameRef, addr: usize, ip: usize, opcode: OpCode) -> Result<Value> {
        self.frame(frame)?
            .slots
            .get(addr)
            .copied()
            .ok_or_else(|| malformed(ip, opcode))
    }

    /// Pops an address, then a value, and stores the value into `frame`.
    fn store(&mut self, frame: FrameRef, ip: usize, opcode: OpCode) -> Result<()> {
        let addr = match self.pop()? {
            Value::Integer(addr) => usize::try_from(addr).map_err(|_| malformed(ip, opcode))?,
            _ => return Err(malformed(ip, opcode)),
        };
        let value = self.pop()?;
        let slot = self
            .heap
            .frame_mut(frame)
            .ok_or(RuntimeError::DanglingReference)?
            .slots
            .get_mut(addr)
            .ok_or_else(|| malformed(ip, opcode))?;
        *slot = value;
        Ok(())
    }

    fn push_frame(
        &mut self,
        kind: FrameKind,
        scope: ScopeId,
        slots: Vec<Value>,
        access: FrameRef,
    ) -> Result<()> {
        let depth = self.frame(self.current)?.depth + 1;
        if depth > self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        let frame = Frame {
            kind,
            scope,
            slots,
            return_address: self.ip,
            control: Some(self.current),
            access: Some(access),
            depth,
        };
        self.current = self.heap.alloc_frame(frame);
        Ok(())
    }

    fn maybe_collect(&mut self) {
        if self.collector.should_collect(&self.heap) {
            self.collect();
        }
    }

    fn jump_target(&self, ip: usize, instruction: &Instruction) -> Result<usize> {
        match instruction.jump_target() {
            Some(target) if target < self.code.len() => Ok(target),
            _ => Err(malformed(ip, instruction.opcode)),
        }
    }

    // Calls

    fn call(&mut self, ip: usize, instruction: &Instruction) -> Result<()> {
        let argc = operand(ip, instruction, 1)?;
        let (function, access) = match instruction.int(0) {
            Some(constant) if constant >= 0 => {
                let function = self
                    .pool
                    .function(&self.heap, constant as usize)
                    .ok_or_else(|| malformed(ip, instruction.opcode))?;
                let access = match instruction.int(2) {
                    Some(depth) if depth >= 0 => self.hop(self.current, depth as usize)?,
                    _ => self.global,
                };
                (function, access)
            }
            _ => {
                let callee = self.pop()?;
                self.closure_target(callee)?
            }
        };

        if argc != function.arity {
            return Err(RuntimeError::ArityMismatch {
                name: function.name.clone(),
                expected: function.arity,
                found: argc,
            });
        }
        let start = function
            .start
            .ok_or_else(|| malformed(ip, instruction.opcode))?;

        let mut slots = vec![Value::Nil; function.frame_size()];
        for slot in (1..=argc).rev() {
            slots[slot] = self.pop()?;
        }
        self.push_frame(FrameKind::Call, function.scope, slots, access)?;
        self.ip = start;
        Ok(())
    }

    fn closure_target(&self, callee: Value) -> Result<(Rc<FunctionDescriptor>, FrameRef)> {
        match callee.as_object().and_then(|r| self.heap.get(r)) {
            Some(HeapObject::Closure(closure)) => Ok((
                Rc::clone(&closure.function),
                closure.env().unwrap_or(self.global),
            )),
            _ => Err(RuntimeError::NotCallable(
                callee.type_name(&self.heap).into(),
            )),
        }
    }

    /// Unwinds block frames up to and including the innermost call frame.
    fn return_from_call(&mut self) -> Result<()> {
        let value = self.pop()?;
        loop {
            let frame = self.frame(self.current)?;
            let (kind, control, return_address) = (frame.kind, frame.control, frame.return_address);
            match kind {
                FrameKind::Global => return Err(RuntimeError::ReturnOutsideFunction),
                FrameKind::Block => {
                    self.current = control.ok_or(RuntimeError::DanglingReference)?;
                }
                FrameKind::Call => {
                    self.current = control.ok_or(RuntimeError::DanglingReference)?;
                    self.ip = return_address;
                    break;
                }
            }
        }
        self.push(value)?;
        self.maybe_collect();
        Ok(())
    }

    /// The closure's environment is the most recent frame on the control
    /// chain that belongs to the function's enclosing scope.
    fn make_closure(&mut self, ip: usize, instruction: &Instruction) -> Result<()> {
        let constant = operand(ip, instruction, 0)?;
        let function = self
            .pool
            .function(&self.heap, constant)
            .ok_or_else(|| malformed(ip, instruction.opcode))?;

        let env = self.defining_frame(function.enclosing)?;
        let mut closure = Closure::new(function);
        closure.bind(env);
        let r = self.heap.alloc(HeapObject::Closure(closure));
        self.push(Value::Object(r))
    }

    fn defining_frame(&self, scope: ScopeId) -> Result<FrameRef> {
        let mut cursor = Some(self.current);
        while let Some(r) = cursor {
            let frame = self.frame(r)?;
            if frame.scope == scope {
                return Ok(r);
            }
            cursor = frame.control;
        }
        Ok(self.current)
    }

    // Structs and lists

    fn make_struct(&mut self, argc: usize) -> Result<()> {
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(self.pop()?);
        }
        args.reverse();
        let prototype = self.pop()?;

        let mut instance = match prototype.as_object().and_then(|r| self.heap.get(r)) {
            Some(HeapObject::Struct(prototype)) => prototype.clone(),
            _ => {
                return Err(RuntimeError::Type {
                    op: "make",
                    operands: prototype.type_name(&self.heap).into(),
                });
            }
        };
        if argc > instance.values.len() {
            return Err(RuntimeError::TooManyFields {
                name: instance.layout.name.clone(),
                expected: instance.values.len(),
                found: argc,
            });
        }
        for (slot, value) in instance.values.iter_mut().zip(args) {
            *slot = value;
        }

        let r = self.heap.alloc(HeapObject::Struct(instance));
        self.push(Value::Object(r))
    }

    fn field_name(&self, ip: usize, instruction: &Instruction) -> Result<String> {
        let index = operand(ip, instruction, 0)?;
        self.pool
            .text(&self.heap, index)
            .map(str::to_owned)
            .ok_or_else(|| malformed(ip, instruction.opcode))
    }

    fn load_field(&self, target: Value, field: &str) -> Result<Value> {
        match target.as_object().and_then(|r| self.heap.get(r)) {
            Some(HeapObject::Struct(instance)) => {
                instance
                    .get(field)
                    .ok_or_else(|| RuntimeError::NoSuchField {
                        field: field.into(),
                        target: instance.layout.name.clone(),
                    })
            }
            _ => Err(RuntimeError::Type {
                op: ".",
                operands: target.type_name(&self.heap).into(),
            }),
        }
    }

    fn store_field(&mut self, target: Value, field: &str, value: Value) -> Result<()> {
        let operands = target.type_name(&self.heap);
        match target.as_object().and_then(|r| self.heap.get_mut(r)) {
            Some(HeapObject::Struct(instance)) => {
                if instance.set(field, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::NoSuchField {
                        field: field.into(),
                        target: instance.layout.name.clone(),
                    })
                }
            }
            _ => Err(RuntimeError::Type {
                op: ".=",
                operands: operands.into(),
            }),
        }
    }

    fn list(&self, value: Value, op: &'static str) -> Result<&VecDeque<Value>> {
        match value.as_object().map(|r| (r, self.heap.get(r))) {
            Some((_, Some(HeapObject::List(items)))) => Ok(items),
            Some((_, None)) => Err(RuntimeError::DanglingReference),
            _ => Err(RuntimeError::Type {
                op,
                operands: value.type_name(&self.heap).into(),
            }),
        }
    }

    fn list_mut(&mut self, value: Value, op: &'static str) -> Result<&mut VecDeque<Value>> {
        let operands = value.type_name(&self.heap);
        let r: Option<ObjRef> = value.as_object();
        match r.map(|r| self.heap.get_mut(r)) {
            Some(Some(HeapObject::List(items))) => Ok(items),
            Some(None) => Err(RuntimeError::DanglingReference),
            _ => Err(RuntimeError::Type {
                op,
                operands: operands.into(),
            }),
        }
    }
}

/// Checks a list index against `len`.
fn list_slot(index: Value, len: usize, heap: &Heap) -> Result<usize> {
    match (index.as_index(), index) {
        (Some(slot), _) if slot < len => Ok(slot),
        (Some(slot), _) => Err(RuntimeError::IndexOutOfBounds {
            index: slot as i64,
            len,
        }),
        (None, Value::Integer(n)) => Err(RuntimeError::IndexOutOfBounds { index: n, len }),
        (None, other) => Err(RuntimeError::Type {
            op: "[]",
            operands: other.type_name(heap).into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::compiler::compile;
    use crate::config::CompilerConfig;

    fn vm_for(mut program: crate::ast::Program, config: VmConfig) -> Vm<Vec<u8>> {
        let compiled = compile(&mut program, &CompilerConfig::default()).unwrap();
        Vm::from_compiled(compiled, config, Vec::new())
    }

    fn run_output(program: crate::ast::Program) -> String {
        let mut vm = vm_for(program, VmConfig::default());
        vm.run().unwrap();
        String::from_utf8(vm.into_output()).unwrap()
    }

    #[test]
    fn test_empty_program_halts() {
        let mut vm = vm_for(program(vec![]), VmConfig::default());
        vm.run().unwrap();
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_print_and_println() {
        let out = run_output(program(vec![
            print(text("a")),
            println(int(1)),
            println(number("2.5")),
        ]));
        assert_eq!(out, "a1\n2.5\n");
    }

    #[test]
    fn test_globals_and_arithmetic() {
        let out = run_output(program(vec![
            let_stmt("x", int(6)),
            let_stmt("y", binary(BinaryOp::Mul, var("x"), int(7))),
            println(var("y")),
        ]));
        assert_eq!(out, "42\n");
    }

    #[test]
    fn test_while_loop_with_increment() {
        let out = run_output(program(vec![
            let_stmt("i", int(0)),
            while_loop(
                binary(BinaryOp::Lt, var("i"), int(3)),
                vec![print(var("i")), expr_stmt(increment("i"))],
            ),
        ]));
        assert_eq!(out, "012");
    }

    #[test]
    fn test_if_else_branches() {
        let out = run_output(program(vec![
            if_else(boolean(false), vec![print(int(1))], vec![print(int(2))]),
            if_stmt(nil(), vec![print(int(3))]),
            if_stmt(int(5), vec![print(int(4))]),
        ]));
        assert_eq!(out, "24");
    }

    #[test]
    fn test_blocks_and_upvalues() {
        let out = run_output(program(vec![
            function(
                "f",
                &["a"],
                vec![
                    let_stmt("b", int(10)),
                    block(vec![
                        let_stmt("c", binary(BinaryOp::Add, var("a"), var("b"))),
                        expr_stmt(assign(var("b"), var("c"))),
                    ]),
                    return_stmt(var("b")),
                ],
            ),
            println(call("f", vec![int(5)])),
        ]));
        assert_eq!(out, "15\n");
    }

    #[test]
    fn test_return_unwinds_blocks() {
        let out = run_output(program(vec![
            function(
                "f",
                &[],
                vec![block(vec![block(vec![return_stmt(int(7))])]), return_stmt(int(0))],
            ),
            println(call("f", vec![])),
            println(int(1)),
        ]));
        assert_eq!(out, "7\n1\n");
    }

    #[test]
    fn test_dynamic_call_through_lambda() {
        let out = run_output(program(vec![
            let_stmt("sq", lambda(&["n"], vec![return_stmt(binary(BinaryOp::Mul, var("n"), var("n")))])),
            println(call("sq", vec![int(9)])),
        ]));
        assert_eq!(out, "81\n");
    }

    #[test]
    fn test_structs_and_fields() {
        let out = run_output(program(vec![
            struct_def("Point", &["x", "y"]),
            let_stmt("p", make("Point", vec![int(1)])),
            expr_stmt(assign(field(var("p"), "y"), int(2))),
            println(var("p")),
            println(field(var("p"), "x")),
        ]));
        assert_eq!(out, "Point { x: 1, y: 2 }\n1\n");
    }

    #[test]
    fn test_list_operations() {
        let out = run_output(program(vec![
            let_stmt("l", list(vec![int(2)])),
            expr_stmt(push(var("l"), int(1))),
            expr_stmt(append(var("l"), int(3))),
            expr_stmt(assign(index(var("l"), int(2)), int(4))),
            println(var("l")),
            println(size(var("l"))),
        ]));
        assert_eq!(out, "[1, 2, 4]\n3\n");
    }

    #[test]
    fn test_runtime_errors() {
        let cases = vec![
            (
                program(vec![println(binary(BinaryOp::Div, int(1), int(0)))]),
                "division by zero",
            ),
            (
                program(vec![let_stmt("x", int(1)), expr_stmt(call_expr(var("x"), vec![]))]),
                "not callable",
            ),
            (
                program(vec![let_stmt("l", list(vec![])), println(index(var("l"), int(0)))]),
                "out of bounds",
            ),
            (
                program(vec![
                    function("f", &["a"], vec![]),
                    expr_stmt(call("f", vec![])),
                ]),
                "expects 1",
            ),
            (
                program(vec![struct_def("S", &["a"]), println(field(make("S", vec![]), "b"))]),
                "no field 'b'",
            ),
            (
                program(vec![struct_def("S", &[]), expr_stmt(make("S", vec![int(1)]))]),
                "has 0 field",
            ),
            (program(vec![println(size(int(3)))]), "TypeError"),
        ];
        for (program, expected) in cases {
            let mut vm = vm_for(program, VmConfig::default());
            let err = vm.run().unwrap_err();
            assert!(err.to_string().contains(expected), "{err} !~ {expected}");
            assert!(vm.stack().is_empty());
        }
    }

    #[test]
    fn test_call_depth_limit() {
        let config = VmConfig {
            max_call_depth: 16,
            ..VmConfig::default()
        };
        let mut vm = vm_for(
            program(vec![
                function("f", &[], vec![return_stmt(call("f", vec![]))]),
                expr_stmt(call("f", vec![])),
            ]),
            config,
        );
        assert!(matches!(
            vm.run(),
            Err(RuntimeError::CallDepthExceeded { limit: 16 })
        ));
    }

    #[test]
    fn test_tracing_does_not_change_output() {
        let source = || {
            program(vec![
                function("f", &["n"], vec![return_stmt(binary(BinaryOp::Add, var("n"), int(1)))]),
                println(call("f", vec![int(1)])),
            ])
        };
        let mut quiet = vm_for(source(), VmConfig::default());
        quiet.run().unwrap();
        let mut loud = vm_for(source(), VmConfig::default().with_verbosity(3));
        loud.run().unwrap();
        assert_eq!(quiet.output(), loud.output());
    }
}
