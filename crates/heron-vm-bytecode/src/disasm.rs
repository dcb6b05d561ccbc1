//! Human and machine readable instruction listings

use serde::Serialize;

use crate::code::CompiledCode;
use crate::decode::Instruction;
use crate::error::Result;
use crate::opcode::Opcode;
use crate::operand::RawOperand;

/// One line of a disassembly listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisassembledInstruction {
    /// Offset of the opcode byte
    pub pos: usize,
    /// Opcode
    pub opcode: Opcode,
    /// Left operand
    pub left: RawOperand,
    /// Right operand
    pub right: RawOperand,
    /// Rendered literals referenced by the operands
    pub comment: Option<String>,
}

impl DisassembledInstruction {
    pub(crate) fn new(code: &CompiledCode, insn: &Instruction) -> Result<Self> {
        let mut rendered = Vec::new();
        for operand in [insn.left, insn.right] {
            if let RawOperand::Literal(idx) = operand {
                rendered.push(code.literal(idx)?.to_string());
            }
        }
        Ok(Self {
            pos: insn.pos,
            opcode: insn.opcode,
            left: insn.left,
            right: insn.right,
            comment: (!rendered.is_empty()).then(|| rendered.join(", ")),
        })
    }
}

impl std::fmt::Display for DisassembledInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}: {}", self.pos, self.opcode)?;
        for operand in [self.left, self.right] {
            if operand != RawOperand::None {
                write!(f, " {operand}")?;
            }
        }
        if let Some(comment) = &self.comment {
            write!(f, " ; {comment}")?;
        }
        Ok(())
    }
}
