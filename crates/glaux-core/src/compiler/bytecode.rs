//! Bytecode definitions.
//!
//! Every instruction is an opcode plus up to three operand values. Operands
//! are plain [`Value`]s; addresses, counts, pool indices and jump targets
//! are stored as integers, with `-1` meaning "not applicable" where an
//! instruction has optional operands.

use std::fmt::{self, Write};

use crate::ast::{BinaryOp, UnaryOp};
use crate::gc::Heap;
use crate::runtime::{ConstPool, Value};

/// A single bytecode instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Operands, unused ones nil
    pub operands: [Value; 3],
}

impl Instruction {
    /// Creates an instruction with no operands.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operands: [Value::Nil; 3],
        }
    }

    /// Creates an instruction with one integer operand.
    pub fn with_operand(opcode: OpCode, operand: i64) -> Self {
        Self::with_operands(opcode, &[operand])
    }

    /// Creates an instruction with up to three integer operands.
    pub fn with_operands(opcode: OpCode, operands: &[i64]) -> Self {
        let mut instruction = Self::simple(opcode);
        for (slot, operand) in instruction.operands.iter_mut().zip(operands) {
            *slot = Value::Integer(*operand);
        }
        instruction
    }

    /// Pushes a scalar stored in the instruction itself.
    pub fn load_immediate(value: Value) -> Self {
        let mut instruction = Self::simple(OpCode::LoadImmediate);
        instruction.operands[0] = value;
        instruction
    }

    /// Unconditional jump.
    pub fn jump(target: usize) -> Self {
        Self::with_operand(OpCode::Jump, target as i64)
    }

    /// Jump taken when the popped value is falsy.
    pub fn branch_if_false(target: usize) -> Self {
        Self::with_operand(OpCode::BranchIfFalse, target as i64)
    }

    /// Integer operand `n`.
    pub fn int(&self, n: usize) -> Option<i64> {
        match self.operands.get(n)? {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Non-negative integer operand `n`.
    pub fn index(&self, n: usize) -> Option<usize> {
        self.int(n).and_then(|v| usize::try_from(v).ok())
    }

    /// Target of a jump or branch.
    pub fn jump_target(&self) -> Option<usize> {
        match self.opcode {
            OpCode::Jump | OpCode::BranchIfFalse => self.index(0),
            _ => None,
        }
    }

    /// Pool index this instruction reads, if any.
    pub fn constant(&self) -> Option<usize> {
        match self.opcode {
            OpCode::LoadConst
            | OpCode::MakeClosure
            | OpCode::DefineStruct
            | OpCode::LoadField
            | OpCode::StoreField
            | OpCode::Call => self.index(0),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        if self.opcode == OpCode::LoadImmediate {
            return match self.operands[0] {
                Value::Nil => f.write_str(" nil"),
                Value::Boolean(b) => write!(f, " {b}"),
                Value::Integer(n) => write!(f, " {n}"),
                Value::Number(n) => write!(f, " {n}"),
                Value::Object(r) => write!(f, " {r:?}"),
            };
        }
        for operand in &self.operands {
            match operand {
                Value::Nil => break,
                Value::Integer(n) => write!(f, " {n}")?,
                other => write!(f, " {other:?}")?,
            }
        }
        Ok(())
    }
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // Loads
    /// Push pool entry `[0]`
    LoadConst,
    /// Push operand `[0]` itself
    LoadImmediate,
    /// Push global slot `[0]`
    LoadGlobal,
    /// Push slot `[0]` of the current frame
    LoadLocal,
    /// Push slot `[0]` of the frame `[1]` access hops away
    LoadUpvalue,
    /// Push global address `[0]` for a following store
    LoadGlobalAddr,
    /// Push frame address `[0]` for a following store
    LoadLocalAddr,

    // Stores: pop address, then value
    /// Store into the global frame
    StoreGlobal,
    /// Store into the current frame
    StoreLocal,
    /// Store into the frame `[0]` access hops away
    StoreUpvalue,

    // Frames
    /// Call: `[0]` pool index or -1 for a closure on the stack,
    /// `[1]` argument count, `[2]` access depth or -1 for a global function
    Call,
    /// Return top of stack from the innermost call frame
    Return,
    /// Push a block frame of `[0]` slots for scope `[1]`
    EnterBlock,
    /// Pop the current block frame
    LeaveBlock,

    // Control flow
    /// Jump to `[0]`
    Jump,
    /// Pop; jump to `[0]` if falsy
    BranchIfFalse,

    // Operators
    /// Binary operator `[0]`, see [`BinaryOp`]
    BinaryOp,
    /// Unary operator `[0]`, see [`UnaryOp`]
    UnaryOp,
    /// Add one to top of stack
    Increment,
    /// Subtract one from top of stack
    Decrement,
    /// Duplicate top of stack
    Dup,

    // Objects
    /// Push a closure for function `[0]` bound to the defining frame
    MakeClosure,
    /// Push the prototype of struct `[0]`
    DefineStruct,
    /// Pop `[0]` arguments and a prototype; push a new instance
    MakeStruct,
    /// Push an empty list
    MakeList,
    /// Pop index and list; push element
    LoadIndex,
    /// Pop index, list and value; store element
    StoreIndex,
    /// Pop struct; push field named by pool text `[0]`
    LoadField,
    /// Pop struct and value; store field named by pool text `[0]`
    StoreField,
    /// Pop item; append to the list on top of stack
    ListAppend,
    /// Pop item; push onto the front of the list on top of stack
    ListPush,
    /// Pop list; push its length
    ListLength,

    // Misc
    /// Pop and print
    Print,
    /// Print a newline
    PrintNewline,
    /// Pop and discard
    Pop,
    /// Reserved slot awaiting a back-patch
    Nop,
    /// Stop execution
    Halt,
}

impl OpCode {
    /// Number of opcodes.
    pub const COUNT: usize = 37;

    /// Every opcode in discriminant order.
    pub const ALL: [OpCode; Self::COUNT] = [
        OpCode::LoadConst,
        OpCode::LoadImmediate,
        OpCode::LoadGlobal,
        OpCode::LoadLocal,
        OpCode::LoadUpvalue,
        OpCode::LoadGlobalAddr,
        OpCode::LoadLocalAddr,
        OpCode::StoreGlobal,
        OpCode::StoreLocal,
        OpCode::StoreUpvalue,
        OpCode::Call,
        OpCode::Return,
        OpCode::EnterBlock,
        OpCode::LeaveBlock,
        OpCode::Jump,
        OpCode::BranchIfFalse,
        OpCode::BinaryOp,
        OpCode::UnaryOp,
        OpCode::Increment,
        OpCode::Decrement,
        OpCode::Dup,
        OpCode::MakeClosure,
        OpCode::DefineStruct,
        OpCode::MakeStruct,
        OpCode::MakeList,
        OpCode::LoadIndex,
        OpCode::StoreIndex,
        OpCode::LoadField,
        OpCode::StoreField,
        OpCode::ListAppend,
        OpCode::ListPush,
        OpCode::ListLength,
        OpCode::Print,
        OpCode::PrintNewline,
        OpCode::Pop,
        OpCode::Nop,
        OpCode::Halt,
    ];

    /// Disassembly name.
    pub fn mnemonic(self) -> &'static str {
        MNEMONICS[self as usize]
    }
}

/// Mnemonics indexed by opcode discriminant.
pub static MNEMONICS: [&str; OpCode::COUNT] = [
    "ldconst",
    "ldimm",
    "ldglobal",
    "ldlocal",
    "ldupval",
    "ldglobaladdr",
    "ldlocaladdr",
    "stglobal",
    "stlocal",
    "stupval",
    "call",
    "retfun",
    "entblk",
    "retblk",
    "jump",
    "brf",
    "binop",
    "unop",
    "incr",
    "decr",
    "dup",
    "mkclosure",
    "defstruct",
    "mkstruct",
    "mklist",
    "ldindex",
    "stindex",
    "ldfield",
    "stfield",
    "append",
    "push",
    "list_len",
    "print",
    "newline",
    "popstack",
    "nop",
    "halt",
];

/// Renders code as an address-prefixed listing with pool annotations.
pub fn disassemble(code: &[Instruction], pool: &ConstPool, heap: &Heap) -> String {
    let mut out = String::new();
    for (addr, instruction) in code.iter().enumerate() {
        let _ = write!(out, "{addr:04}  {instruction}");
        match instruction.opcode {
            OpCode::MakeClosure | OpCode::Call => {
                if let Some(function) = instruction
                    .constant()
                    .and_then(|i| pool.function(heap, i))
                {
                    let _ = write!(out, "\t; <fn {}>", function.name);
                }
            }
            OpCode::BinaryOp => {
                if let Some(op) = instruction.int(0).and_then(BinaryOp::from_code) {
                    let _ = write!(out, "\t; {}", op.symbol());
                }
            }
            OpCode::UnaryOp => {
                if let Some(op) = instruction.int(0).and_then(UnaryOp::from_code) {
                    let _ = write!(out, "\t; {}", op.symbol());
                }
            }
            _ => {
                if let Some(value) = instruction.constant().and_then(|i| pool.get(i)) {
                    let _ = write!(out, "\t; {}", value.display(heap));
                }
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonic_table_matches_opcodes() {
        for (i, opcode) in OpCode::ALL.iter().enumerate() {
            assert_eq!(*opcode as usize, i);
        }
        assert_eq!(OpCode::Halt.mnemonic(), "halt");
        assert_eq!(OpCode::LoadUpvalue.mnemonic(), "ldupval");
        assert_eq!(OpCode::Return.mnemonic(), "retfun");
    }

    #[test]
    fn test_instruction_display() {
        assert_eq!(Instruction::simple(OpCode::Pop).to_string(), "popstack");
        assert_eq!(
            Instruction::with_operands(OpCode::Call, &[2, 1, -1]).to_string(),
            "call 2 1 -1"
        );
        assert_eq!(
            Instruction::load_immediate(Value::Boolean(true)).to_string(),
            "ldimm true"
        );
        assert_eq!(Instruction::load_immediate(Value::Nil).to_string(), "ldimm nil");
    }

    #[test]
    fn test_operand_accessors() {
        let call = Instruction::with_operands(OpCode::Call, &[-1, 3, 0]);
        assert_eq!(call.int(0), Some(-1));
        assert_eq!(call.index(0), None);
        assert_eq!(call.index(1), Some(3));
        assert_eq!(call.constant(), None);
        assert_eq!(Instruction::jump(12).jump_target(), Some(12));
        assert_eq!(Instruction::simple(OpCode::Pop).jump_target(), None);
    }

    #[test]
    fn test_disassemble_annotates_constants() {
        let mut heap = Heap::new();
        let mut pool = ConstPool::new();
        let greeting = pool.intern_text(&mut heap, "hello");
        let code = vec![
            Instruction::with_operand(OpCode::LoadConst, greeting as i64),
            Instruction::simple(OpCode::Print),
            Instruction::with_operand(OpCode::BinaryOp, BinaryOp::Add.code()),
            Instruction::simple(OpCode::Halt),
        ];
        let listing = disassemble(&code, &pool, &heap);
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "0000  ldconst 0\t; hello");
        assert_eq!(lines[2], "0002  binop 1\t; +");
        assert_eq!(lines[3], "0003  halt");
    }
}
