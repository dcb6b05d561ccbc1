//! Bytecode operands

use serde::{Deserialize, Serialize};

/// Index into the literal table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LiteralIndex(pub u16);

impl LiteralIndex {
    /// Create a new literal index
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Get index value
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl From<u16> for LiteralIndex {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

/// Operand as it appears in the instruction stream, before the VM resolves
/// stack and literal references to values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawOperand {
    /// Absent
    None,
    /// Absolute branch target (byte offset into the code)
    Branch(usize),
    /// Byte immediate
    Byte(u8),
    /// Literal table reference
    Literal(LiteralIndex),
    /// Popped from the evaluation stack at dispatch time
    Stack,
}

impl RawOperand {
    /// Branch target, if this is a branch operand
    #[inline]
    pub fn branch_target(self) -> Option<usize> {
        match self {
            Self::Branch(target) => Some(target),
            _ => None,
        }
    }
}

impl std::fmt::Display for RawOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Branch(target) => write!(f, "@{target}"),
            Self::Byte(b) => write!(f, "#{b}"),
            Self::Literal(idx) => write!(f, "lit[{}]", idx.0),
            Self::Stack => f.write_str("pop"),
        }
    }
}
