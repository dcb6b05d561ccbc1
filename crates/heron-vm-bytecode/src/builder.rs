//! Programmatic construction of compiled code
//!
//! Stands in for a source compiler: tests and embedders assemble code units
//! opcode by opcode. Emission errors are latched and reported by `build`.

use std::sync::Arc;

use crate::code::{CompiledCode, ScopeFlags};
use crate::descriptor::{OperandKind, OperationGroup};
use crate::error::{BytecodeError, Result};
use crate::literal::{Literal, LiteralTable};
use crate::opcode::Opcode;
use crate::operand::LiteralIndex;

/// Jump target handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(u32);

/// Immediate operand passed to [`CodeBuilder::emit`]
#[derive(Debug, Clone)]
pub enum Imm {
    /// Byte immediate
    Byte(u8),
    /// Literal, added to the literal table
    Literal(Literal),
}

impl From<u8> for Imm {
    fn from(b: u8) -> Self {
        Self::Byte(b)
    }
}

impl From<Literal> for Imm {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<&str> for Imm {
    fn from(s: &str) -> Self {
        Self::Literal(Literal::string(s))
    }
}

impl From<f64> for Imm {
    fn from(n: f64) -> Self {
        Self::Literal(Literal::Number(n))
    }
}

impl From<CompiledCode> for Imm {
    fn from(code: CompiledCode) -> Self {
        Self::Literal(Literal::Function(Arc::new(code)))
    }
}

#[derive(Debug)]
struct Fixup {
    insn_pos: usize,
    operand_at: usize,
    label: Label,
}

/// Builder for [`CompiledCode`]
#[derive(Debug, Default)]
pub struct CodeBuilder {
    name: Option<String>,
    bytecode: Vec<u8>,
    literals: LiteralTable,
    param_names: Vec<Arc<str>>,
    flags: ScopeFlags,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    error: Option<BytecodeError>,
}

impl CodeBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the function name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a formal parameter
    pub fn param(mut self, name: &str) -> Self {
        self.param_names.push(Arc::from(name));
        self
    }

    /// Mark as strict mode code
    pub fn strict(mut self, value: bool) -> Self {
        self.flags.strict = value;
        self
    }

    /// Replace all scope flags
    pub fn flags(mut self, flags: ScopeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Current emission offset
    #[inline]
    pub fn position(&self) -> usize {
        self.bytecode.len()
    }

    /// Add a literal without emitting anything
    pub fn literal(&mut self, literal: Literal) -> Option<LiteralIndex> {
        match self.literals.add(literal) {
            Ok(idx) => Some(idx),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Emit an opcode with its immediates, in left-then-right order
    pub fn emit(&mut self, op: Opcode, imms: impl IntoIterator<Item = Imm>) -> &mut Self {
        let Ok(fields) = op.descriptor().decode() else {
            self.fail(BytecodeError::InvalidOpcode(op.to_byte()));
            return self;
        };
        let mut imms = imms.into_iter();
        let mut encoded = vec![op.to_byte()];

        for kind in [fields.left, fields.right] {
            match (kind, kind.encoded_len()) {
                (_, 0) => {}
                (OperandKind::Byte, _) => match imms.next() {
                    Some(Imm::Byte(b)) => encoded.push(b),
                    _ => return self.fail(BytecodeError::OperandMismatch(op.name())),
                },
                (OperandKind::Literal, _) => match imms.next() {
                    Some(Imm::Literal(literal)) => match self.literal(literal) {
                        Some(idx) => encoded.extend(idx.0.to_le_bytes()),
                        None => return self,
                    },
                    _ => return self.fail(BytecodeError::OperandMismatch(op.name())),
                },
                _ => return self.fail(BytecodeError::OperandMismatch(op.name())),
            }
        }
        if imms.next().is_some() {
            return self.fail(BytecodeError::OperandMismatch(op.name()));
        }

        self.bytecode.extend(encoded);
        self
    }

    /// Emit an opcode without immediates
    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.emit(op, [])
    }

    /// Emit an opcode with one immediate
    pub fn op_with(&mut self, op: Opcode, imm: impl Into<Imm>) -> &mut Self {
        self.emit(op, [imm.into()])
    }

    /// Push a number
    pub fn push_number(&mut self, n: f64) -> &mut Self {
        self.op_with(Opcode::PushLiteral, n)
    }

    /// Push a string
    pub fn push_string(&mut self, s: &str) -> &mut Self {
        self.op_with(Opcode::PushLiteral, s)
    }

    /// Declare a function under `name`
    pub fn func_decl(&mut self, name: &str, code: CompiledCode) -> &mut Self {
        self.emit(Opcode::FuncDecl, [Imm::from(name), Imm::from(code)])
    }

    /// Allocate an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() as u32 - 1)
    }

    /// Bind `label` to the current position
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let pos = self.bytecode.len();
        match self.labels.get_mut(label.0 as usize) {
            Some(slot) => *slot = Some(pos),
            None => {
                self.fail(BytecodeError::UnboundLabel(label.0));
            }
        }
        self
    }

    /// Emit a branch of `group` (`Jump`, `BranchIfTrue`, `BranchIfFalse`) to `label`
    ///
    /// Bound labels produce a backward branch of minimal width; unbound ones
    /// reserve a 3-byte forward offset patched by `build`.
    pub fn jump(&mut self, group: OperationGroup, label: Label) -> &mut Self {
        let pos = self.bytecode.len();
        let Some(slot) = self.labels.get(label.0 as usize).copied() else {
            return self.fail(BytecodeError::UnboundLabel(label.0));
        };

        let (kind, offset) = match slot {
            Some(target) => match OperandKind::branch_for(pos - target, true) {
                Ok(kind) => (kind, pos - target),
                Err(err) => return self.fail(err),
            },
            None => (OperandKind::Branch3, 0),
        };
        let Some(op) = Opcode::for_branch(group, kind) else {
            return self.fail(BytecodeError::OperandMismatch(group_name(group)));
        };

        self.bytecode.push(op.to_byte());
        if slot.is_none() {
            self.fixups.push(Fixup {
                insn_pos: pos,
                operand_at: pos + 1,
                label,
            });
        }
        let bytes = offset.to_le_bytes();
        self.bytecode.extend(&bytes[..kind.encoded_len()]);
        self
    }

    /// Finish the code unit
    pub fn build(mut self) -> Result<CompiledCode> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        for fixup in &self.fixups {
            let target = self
                .labels
                .get(fixup.label.0 as usize)
                .copied()
                .flatten()
                .ok_or(BytecodeError::UnboundLabel(fixup.label.0))?;
            let offset = target - fixup.insn_pos;
            if offset > 0xff_ffff {
                return Err(BytecodeError::BranchTooFar(offset));
            }
            let bytes = offset.to_le_bytes();
            self.bytecode[fixup.operand_at..fixup.operand_at + 3].copy_from_slice(&bytes[..3]);
        }

        Ok(CompiledCode {
            name: self.name,
            bytecode: self.bytecode,
            literals: self.literals,
            param_names: self.param_names,
            flags: self.flags,
        })
    }

    fn fail(&mut self, err: BytecodeError) -> &mut Self {
        if self.error.is_none() {
            self.error = Some(err);
        }
        self
    }
}

fn group_name(group: OperationGroup) -> &'static str {
    match group {
        OperationGroup::Jump => "Jump",
        OperationGroup::BranchIfTrue => "BranchIfTrue",
        OperationGroup::BranchIfFalse => "BranchIfFalse",
        _ => "branch",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::RawOperand;

    #[test]
    fn test_forward_jump_patched() {
        let mut b = CompiledCode::builder();
        let end = b.new_label();
        b.op(Opcode::PushTrue)
            .jump(OperationGroup::BranchIfFalse, end)
            .push_number(1.0)
            .op(Opcode::Pop);
        b.bind(end).op(Opcode::ReturnUndefined);
        let code = b.build().unwrap();

        let insns: Vec<_> = code.instructions().map(|i| i.unwrap()).collect();
        assert_eq!(insns[1].opcode, Opcode::BranchIfFalseForward3);
        assert_eq!(insns[1].left, RawOperand::Branch(insns[4].pos));
    }

    #[test]
    fn test_backward_jump_minimal_width() {
        let mut b = CompiledCode::builder();
        let top = b.new_label();
        b.bind(top).op(Opcode::Nop).jump(OperationGroup::Jump, top);
        let code = b.build().unwrap();

        let insn = code.decode_at(1).unwrap();
        assert_eq!(insn.opcode, Opcode::JumpBackward1);
        assert_eq!(insn.left, RawOperand::Branch(0));
    }

    #[test]
    fn test_unbound_label() {
        let mut b = CompiledCode::builder();
        let never = b.new_label();
        b.jump(OperationGroup::Jump, never);
        assert_eq!(b.build().unwrap_err(), BytecodeError::UnboundLabel(0));
    }

    #[test]
    fn test_operand_mismatch_latched() {
        let mut b = CompiledCode::builder();
        b.op(Opcode::PushLiteral).op(Opcode::Nop);
        assert_eq!(
            b.build().unwrap_err(),
            BytecodeError::OperandMismatch("PushLiteral")
        );
    }

    #[test]
    fn test_builder_metadata() {
        let code = CompiledCode::builder()
            .name("f")
            .param("a")
            .param("b")
            .strict(true)
            .build()
            .unwrap();
        assert_eq!(code.display_name(), "f");
        assert_eq!(code.param_count(), 2);
        assert!(code.is_strict());
    }
}
