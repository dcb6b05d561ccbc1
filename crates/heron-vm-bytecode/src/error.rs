//! Bytecode errors

use thiserror::Error;

/// Errors that can occur while encoding or decoding bytecode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    /// Opcode byte with no entry in the opcode table
    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    /// Operand kind nibble outside the known kinds
    #[error("Invalid operand kind: {0}")]
    InvalidOperandKind(u8),

    /// Operation group byte outside the known groups
    #[error("Invalid operation group: {0}")]
    InvalidGroup(u8),

    /// Post-process nibble outside the known actions
    #[error("Invalid post-process action: {0}")]
    InvalidPostProcess(u8),

    /// Reserved descriptor bits were set
    #[error("Reserved descriptor bits set: {0:#010x}")]
    ReservedBits(u32),

    /// Unexpected end of bytecode
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Branch target lies outside the code
    #[error("Branch at offset {at} targets {target}, outside of code")]
    BranchOutOfRange {
        /// Offset of the branching instruction
        at: usize,
        /// Computed target
        target: i64,
    },

    /// Literal index has no entry in the literal table
    #[error("Literal index {0} out of range")]
    LiteralOutOfRange(u16),

    /// Too many literals for a 16-bit index
    #[error("Literal table overflow")]
    TooManyLiterals,

    /// Branch offset does not fit the widest encoding
    #[error("Branch offset {0} too large")]
    BranchTooFar(usize),

    /// Label used in a jump but never bound
    #[error("Unbound label {0}")]
    UnboundLabel(u32),

    /// Opcode emitted with operands that do not match its descriptor
    #[error("Operand mismatch for {0}")]
    OperandMismatch(&'static str),
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
