//! # Heron VM Bytecode
//!
//! Instruction encoding for the Heron ECMAScript virtual machine.
//!
//! ## Design Principles
//!
//! - **Stack-based**: operands are popped from and results pushed onto an
//!   evaluation stack
//! - **Descriptor-driven**: every opcode byte indexes a packed 32-bit
//!   descriptor (operand kinds, operation group, post-process action, call
//!   flags) so the dispatch loop decodes all opcodes uniformly
//! - **Compact**: literal indices take two bytes, branch offsets one to three

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod builder;
pub mod code;
pub mod decode;
pub mod descriptor;
pub mod disasm;
pub mod error;
pub mod literal;
pub mod opcode;
pub mod operand;

pub use builder::{CodeBuilder, Imm, Label};
pub use code::{CompiledCode, ScopeFlags};
pub use decode::{Instruction, Instructions, decode_at};
pub use descriptor::{
    CallFlags, Descriptor, DescriptorFields, OperandKind, OperationGroup, PostProcess,
};
pub use disasm::DisassembledInstruction;
pub use error::BytecodeError;
pub use literal::{Literal, LiteralTable};
pub use opcode::Opcode;
pub use operand::{LiteralIndex, RawOperand};
