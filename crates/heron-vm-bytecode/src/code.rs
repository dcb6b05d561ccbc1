//! Compiled code units

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::builder::CodeBuilder;
use crate::decode::{Instruction, Instructions, decode_at};
use crate::disasm::DisassembledInstruction;
use crate::error::{BytecodeError, Result};
use crate::literal::{Literal, LiteralTable};
use crate::operand::LiteralIndex;

/// Properties of a scope's code, fixed at compile time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeFlags {
    /// Code is strict mode code
    pub strict: bool,
    /// Code never references the `arguments` identifier
    pub not_ref_arguments: bool,
    /// Code never references the `eval` identifier
    pub not_ref_eval: bool,
}

/// A compiled unit: global code, eval code or a function body
#[derive(Debug, Clone)]
pub struct CompiledCode {
    /// Function name, if any
    pub name: Option<String>,
    /// Encoded instructions
    pub bytecode: Vec<u8>,
    /// Literals referenced by `Literal` operands
    pub literals: LiteralTable,
    /// Formal parameter names, in declaration order
    pub param_names: Vec<Arc<str>>,
    /// Scope flags
    pub flags: ScopeFlags,
}

impl CompiledCode {
    /// Start building a code unit
    pub fn builder() -> CodeBuilder {
        CodeBuilder::new()
    }

    /// Name for diagnostics
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Is this strict mode code
    #[inline]
    pub fn is_strict(&self) -> bool {
        self.flags.strict
    }

    /// Number of formal parameters
    #[inline]
    pub fn param_count(&self) -> usize {
        self.param_names.len()
    }

    /// Look up a literal
    pub fn literal(&self, index: LiteralIndex) -> Result<&Literal> {
        self.literals
            .get(index)
            .ok_or(BytecodeError::LiteralOutOfRange(index.0))
    }

    /// Decode the instruction starting at `pos`
    #[inline]
    pub fn decode_at(&self, pos: usize) -> Result<Instruction> {
        decode_at(&self.bytecode, pos)
    }

    /// Iterate over every instruction from the start of the code
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.bytecode)
    }

    /// Decode the whole unit into a listing
    pub fn disassemble(&self) -> Result<Vec<DisassembledInstruction>> {
        self.instructions()
            .map(|insn| DisassembledInstruction::new(self, &insn?))
            .collect()
    }
}
