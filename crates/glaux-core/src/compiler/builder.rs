//! Instruction buffer with reserve-and-patch support.
//!
//! Forward jumps are emitted before their target is known: the generator
//! reserves a slot, emits the code the jump skips over, then patches the
//! slot. Patching moves the write cursor back to the reservation, writes,
//! and restores the cursor to the high-water mark so later emission
//! continues after everything already written.

use super::bytecode::{Instruction, OpCode};
use crate::error::CompileError;

/// A reserved instruction slot. Must be handed back to
/// [`CodeBuilder::patch`] exactly once.
#[must_use = "a reservation must be patched"]
#[derive(Debug)]
pub struct Reservation {
    at: usize,
}

impl Reservation {
    /// Address of the reserved slot.
    pub fn address(&self) -> usize {
        self.at
    }
}

/// Fixed-capacity instruction buffer.
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    code: Vec<Instruction>,
    cursor: usize,
    high_water: usize,
    capacity: usize,
}

impl CodeBuilder {
    /// Creates an empty buffer that holds at most `capacity` instructions.
    pub fn new(capacity: usize) -> Self {
        Self {
            code: Vec::new(),
            cursor: 0,
            high_water: 0,
            capacity,
        }
    }

    /// Address the next instruction will be written to.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Number of instructions written.
    pub fn len(&self) -> usize {
        self.high_water
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.high_water == 0
    }

    /// Writes an instruction at the cursor and returns its address.
    pub fn emit(&mut self, instruction: Instruction) -> Result<usize, CompileError> {
        let at = self.cursor;
        if at >= self.capacity {
            return Err(CompileError::CodeBufferExhausted {
                capacity: self.capacity,
            });
        }
        if at == self.code.len() {
            self.code.push(instruction);
        } else {
            self.code[at] = instruction;
        }
        self.cursor += 1;
        self.high_water = self.high_water.max(self.cursor);
        Ok(at)
    }

    /// Reserves one slot for a later [`patch`](Self::patch).
    pub fn reserve(&mut self) -> Result<Reservation, CompileError> {
        let at = self.emit(Instruction::simple(OpCode::Nop))?;
        Ok(Reservation { at })
    }

    /// Fills a reserved slot.
    pub fn patch(
        &mut self,
        reservation: Reservation,
        instruction: Instruction,
    ) -> Result<(), CompileError> {
        let at = reservation.at;
        match self.code.get(at) {
            Some(slot) if at < self.high_water && slot.opcode == OpCode::Nop => {}
            _ => {
                return Err(CompileError::Internal(format!(
                    "back-patch of address {at} that holds no reservation"
                )));
            }
        }
        self.cursor = at;
        self.emit(instruction)?;
        self.cursor = self.high_water;
        Ok(())
    }

    /// Drops everything from `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.code.truncate(len);
        self.high_water = self.code.len();
        self.cursor = self.high_water;
    }

    /// The instructions written so far.
    pub fn instructions(&self) -> &[Instruction] {
        &self.code[..self.high_water]
    }

    /// Consumes the builder.
    pub fn into_instructions(mut self) -> Vec<Instruction> {
        self.code.truncate(self.high_water);
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_returns_addresses() {
        let mut code = CodeBuilder::new(16);
        assert_eq!(code.emit(Instruction::simple(OpCode::Pop)).unwrap(), 0);
        assert_eq!(code.emit(Instruction::simple(OpCode::Halt)).unwrap(), 1);
        assert_eq!(code.len(), 2);
    }

    #[test]
    fn test_patch_restores_cursor() {
        let mut code = CodeBuilder::new(16);
        let skip = code.reserve().unwrap();
        code.emit(Instruction::simple(OpCode::Dup)).unwrap();
        code.emit(Instruction::simple(OpCode::Pop)).unwrap();
        let after = code.position();
        code.patch(skip, Instruction::jump(after)).unwrap();

        assert_eq!(code.position(), 3);
        assert_eq!(code.instructions()[0], Instruction::jump(3));
        code.emit(Instruction::simple(OpCode::Halt)).unwrap();
        assert_eq!(code.len(), 4);
    }

    #[test]
    fn test_patch_rejects_written_slot() {
        let mut code = CodeBuilder::new(16);
        let reservation = code.reserve().unwrap();
        let at = reservation.address();
        code.patch(reservation, Instruction::jump(1)).unwrap();
        let err = code.patch(Reservation { at }, Instruction::jump(2)).unwrap_err();
        assert!(matches!(err, CompileError::Internal(_)));
    }

    #[test]
    fn test_capacity_exhausted() {
        let mut code = CodeBuilder::new(1);
        code.emit(Instruction::simple(OpCode::Halt)).unwrap();
        let err = code.emit(Instruction::simple(OpCode::Halt)).unwrap_err();
        assert!(matches!(
            err,
            CompileError::CodeBufferExhausted { capacity: 1 }
        ));
    }

    #[test]
    fn test_truncate() {
        let mut code = CodeBuilder::new(16);
        for _ in 0..4 {
            code.emit(Instruction::simple(OpCode::Pop)).unwrap();
        }
        code.truncate(1);
        assert_eq!(code.len(), 1);
        assert_eq!(code.position(), 1);
    }
}
