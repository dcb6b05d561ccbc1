//! Instruction decoding

use crate::descriptor::{DescriptorFields, OperandKind};
use crate::error::{BytecodeError, Result};
use crate::opcode::Opcode;
use crate::operand::{LiteralIndex, RawOperand};

/// One decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode byte
    pub pos: usize,
    /// Opcode
    pub opcode: Opcode,
    /// Descriptor fields of the opcode
    pub fields: DescriptorFields,
    /// Left operand
    pub left: RawOperand,
    /// Right operand
    pub right: RawOperand,
    /// Offset of the following instruction
    pub next: usize,
}

/// Decode the instruction at `pos`
pub fn decode_at(code: &[u8], pos: usize) -> Result<Instruction> {
    let byte = *code.get(pos).ok_or(BytecodeError::UnexpectedEnd(pos))?;
    let opcode = Opcode::from_byte(byte).ok_or(BytecodeError::InvalidOpcode(byte))?;
    let fields = opcode.descriptor().decode()?;

    let (left, cursor) = read_operand(code, pos, pos + 1, fields.left)?;
    let (right, next) = read_operand(code, pos, cursor, fields.right)?;

    Ok(Instruction {
        pos,
        opcode,
        fields,
        left,
        right,
        next,
    })
}

fn read_operand(
    code: &[u8],
    insn_pos: usize,
    at: usize,
    kind: OperandKind,
) -> Result<(RawOperand, usize)> {
    let len = kind.encoded_len();
    let bytes = code
        .get(at..at + len)
        .ok_or(BytecodeError::UnexpectedEnd(code.len()))?;
    let unsigned = bytes
        .iter()
        .rev()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);

    let operand = match kind {
        OperandKind::None => RawOperand::None,
        OperandKind::Stack => RawOperand::Stack,
        OperandKind::Byte => RawOperand::Byte(unsigned as u8),
        OperandKind::Literal => RawOperand::Literal(LiteralIndex(unsigned as u16)),
        _ => {
            let backward = kind.branch_direction().unwrap_or(false);
            let target = if backward {
                insn_pos as i64 - unsigned as i64
            } else {
                insn_pos as i64 + unsigned as i64
            };
            if target < 0 || target as usize > code.len() {
                return Err(BytecodeError::BranchOutOfRange {
                    at: insn_pos,
                    target,
                });
            }
            RawOperand::Branch(target as usize)
        }
    };
    Ok((operand, at + len))
}

/// Iterator over the instructions of a code buffer
///
/// Stops after the first decoding error.
pub struct Instructions<'a> {
    code: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    /// Iterate from the start of `code`
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            pos: 0,
            failed: false,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.code.len() {
            return None;
        }
        match decode_at(self.code, self.pos) {
            Ok(insn) => {
                self.pos = insn.next;
                Some(Ok(insn))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::OperationGroup;

    #[test]
    fn test_decode_literal_operands() {
        let code = [Opcode::FuncDecl.to_byte(), 0x02, 0x00, 0x34, 0x12];
        let insn = decode_at(&code, 0).unwrap();
        assert_eq!(insn.opcode, Opcode::FuncDecl);
        assert_eq!(insn.left, RawOperand::Literal(LiteralIndex(2)));
        assert_eq!(insn.right, RawOperand::Literal(LiteralIndex(0x1234)));
        assert_eq!(insn.next, 5);
        assert_eq!(insn.fields.group, OperationGroup::FuncDecl);
    }

    #[test]
    fn test_decode_backward_branch() {
        let mut code = vec![Opcode::Nop.to_byte(); 300];
        code.extend([Opcode::JumpBackward2.to_byte(), 0x2c, 0x01]);
        let insn = decode_at(&code, 300).unwrap();
        assert_eq!(insn.left, RawOperand::Branch(0));
    }

    #[test]
    fn test_decode_branch_out_of_range() {
        let code = [Opcode::JumpForward1.to_byte(), 0x10];
        assert_eq!(
            decode_at(&code, 0),
            Err(BytecodeError::BranchOutOfRange { at: 0, target: 16 })
        );
    }

    #[test]
    fn test_decode_truncated() {
        let code = [Opcode::PushLiteral.to_byte(), 0x01];
        assert!(matches!(
            decode_at(&code, 0),
            Err(BytecodeError::UnexpectedEnd(_))
        ));
    }

    #[test]
    fn test_iterator_stops_on_error() {
        let code = [Opcode::Nop.to_byte(), 0xff, Opcode::Nop.to_byte()];
        let decoded: Vec<_> = Instructions::new(&code).collect();
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].is_ok());
        assert_eq!(decoded[1], Err(BytecodeError::InvalidOpcode(0xff)));
    }
}
