//! Read-only code objects and the fixed machine literal table.
//!
//! A `Code` is what the host loads: a decoded opcode sequence plus a
//! literal pool its operands index. Structural problems (out-of-range
//! literal operands, wild jump targets) are rejected at construction
//! so the dispatch loop never has to re-validate them.

use serde::{Deserialize, Serialize};

use rosette_types::{Ob, Tuple, NIV, RBLFALSE, RBLTRUE};

use crate::instr::{Op, Pc};

/// Number of entries in the fixed machine literal table.
pub const NUM_VM_LITERALS: u16 = 12;

/// The fixed machine literal table: `Fixnum(0..=7)`, the true and
/// false objects, the empty tuple, and the no-value object.
#[must_use]
pub fn vm_literal(index: u16) -> Option<Ob> {
    match index {
        0..=7 => Some(Ob::Fixnum(i64::from(index))),
        8 => Some(RBLTRUE),
        9 => Some(RBLFALSE),
        10 => Some(Ob::Tuple(Tuple::NIL)),
        11 => Some(NIV),
        _ => None,
    }
}

/// Errors surfaced while building a code object.
#[derive(Debug, thiserror::Error)]
pub enum VMError {
    /// The opcode sequence is empty.
    #[error("code object has no opcodes")]
    EmptyCode,
    /// A literal-pool operand is out of range.
    #[error("opcode {at} references literal {index}, pool holds {len}")]
    LitOutOfRange {
        /// Opcode index of the offending operand.
        at: usize,
        /// The referenced literal index.
        index: u16,
        /// Literal pool length.
        len: usize,
    },
    /// A jump/fork/resume target lies beyond the opcode sequence.
    #[error("opcode {at} targets pc {target}, sequence holds {len}")]
    TargetOutOfRange {
        /// Opcode index of the offending operand.
        at: usize,
        /// The referenced program counter.
        target: u16,
        /// Opcode sequence length.
        len: usize,
    },
    /// A machine literal operand is out of the fixed table.
    #[error("opcode {at} references machine literal {index}, table holds {NUM_VM_LITERALS}")]
    ImmediateOutOfRange {
        /// Opcode index of the offending operand.
        at: usize,
        /// The referenced machine literal index.
        index: u16,
    },
}

/// A validated, read-only code object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    ops: Vec<Op>,
    lits: Vec<Ob>,
}

impl Code {
    /// Build a code object, validating operand ranges.
    ///
    /// # Errors
    ///
    /// Returns a [`VMError`] when the sequence is empty or an operand
    /// indexes outside the literal pool, the opcode sequence, or the
    /// machine literal table.
    pub fn new(ops: Vec<Op>, lits: Vec<Ob>) -> Result<Self, VMError> {
        if ops.is_empty() {
            return Err(VMError::EmptyCode);
        }
        let code = Self { ops, lits };
        code.validate()?;
        Ok(code)
    }

    fn validate(&self) -> Result<(), VMError> {
        let len = self.ops.len();
        for (at, op) in self.ops.iter().enumerate() {
            for lit in lit_operands(op) {
                if usize::from(lit) >= self.lits.len() {
                    return Err(VMError::LitOutOfRange {
                        at,
                        index: lit,
                        len: self.lits.len(),
                    });
                }
            }
            if let Some(target) = target_operand(op) {
                // A target equal to the length is a fall-off-the-end
                // resume point, which the dispatch loop treats as done.
                if usize::from(target) > len {
                    return Err(VMError::TargetOutOfRange { at, target, len });
                }
            }
            if let Some(index) = immediate_operand(op) {
                if index >= NUM_VM_LITERALS {
                    return Err(VMError::ImmediateOutOfRange { at, index });
                }
            }
        }
        Ok(())
    }

    /// The opcode at `pc`, when in range.
    #[must_use]
    pub fn op(&self, pc: Pc) -> Option<&Op> {
        self.ops.get(pc.index())
    }

    /// Literal-pool access.
    #[must_use]
    pub fn lit(&self, index: u16) -> Option<&Ob> {
        self.lits.get(usize::from(index))
    }

    /// Number of opcodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the sequence is empty. Always false for a validated code
    /// object; present for completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The opcode sequence.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// The literal pool.
    #[must_use]
    pub fn lits(&self) -> &[Ob] {
        &self.lits
    }
}

fn lit_operands(op: &Op) -> Vec<u16> {
    match op {
        Op::Extend { lit }
        | Op::XmitTag { lit, .. }
        | Op::RtnTag { lit, .. }
        | Op::UpcallRtn { lit, .. }
        | Op::LookupToArg { lit, .. }
        | Op::LookupToReg { lit, .. }
        | Op::XferRsltToDest { lit }
        | Op::XferSrcToRslt { lit }
        | Op::IndLitToArg { lit, .. }
        | Op::IndLitToReg { lit, .. }
        | Op::IndLitToRslt { lit }
        | Op::ApplyPrimTag { lit, .. } => vec![*lit],
        _ => Vec::new(),
    }
}

fn target_operand(op: &Op) -> Option<u16> {
    match op {
        Op::Outstanding { target, .. }
        | Op::Fork { target }
        | Op::Jmp { target }
        | Op::JmpFalse { target }
        | Op::JmpCut { target, .. } => Some(*target),
        _ => None,
    }
}

fn immediate_operand(op: &Op) -> Option<u16> {
    match op {
        Op::ImmediateLitToArg { value, .. }
        | Op::ImmediateLitToReg { value, .. }
        | Op::ImmediateLitToRslt { value } => Some(*value),
        _ => None,
    }
}
