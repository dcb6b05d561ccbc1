//! Opcode table
//!
//! An opcode byte is an index into this table. Each entry carries the
//! descriptor the dispatch loop decodes; several opcodes may share a group
//! and differ only in operand kinds or flags.

use serde::{Deserialize, Serialize};

use crate::descriptor::{CallFlags, Descriptor, OperandKind, OperationGroup, PostProcess};

macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = ($left:ident, $right:ident, $group:ident, $post:ident $(, $flag:ident)*)
        ),* $(,)?
    ) => {
        /// Bytecode opcodes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$doc])* $name, )*
        }

        impl Opcode {
            /// Every opcode, indexed by its byte value
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name ),* ];

            /// Descriptor for this opcode
            pub const fn descriptor(self) -> Descriptor {
                match self {
                    $(
                        Opcode::$name => Descriptor::new(
                            OperandKind::$left,
                            OperandKind::$right,
                            OperationGroup::$group,
                            PostProcess::$post,
                            CallFlags::NONE $( .union(CallFlags::$flag) )*,
                        ),
                    )*
                }
            }

            /// Mnemonic
            pub const fn name(self) -> &'static str {
                match self {
                    $( Opcode::$name => stringify!($name), )*
                }
            }
        }
    };
}

define_opcodes! {
    /// Do nothing
    Nop = (None, None, None, None),
    /// Discard the top of the stack
    Pop = (Stack, None, Pop, None),
    /// Push a literal
    PushLiteral = (Literal, None, Push, PushResult),
    /// Push a small non-negative integer
    PushByte = (Byte, None, Push, PushResult),
    /// Duplicate the top of the stack
    Dup = (None, None, PushTwo, PushResult),
    /// Push `undefined`
    PushUndefined = (None, None, PushUndefined, PushResult),
    /// Push `null`
    PushNull = (None, None, PushNull, PushResult),
    /// Push `true`
    PushTrue = (None, None, PushTrue, PushResult),
    /// Push `false`
    PushFalse = (None, None, PushFalse, PushResult),
    /// Push the this-binding
    PushThis = (None, None, PushThis, PushResult),
    /// Push the value of the named identifier
    PushIdent = (Literal, None, PushIdent, PushResult),
    /// Push the value of the named identifier and remember its base for the call
    PushCallee = (Literal, None, PushCallee, PushResult),
    /// Push a new empty object
    PushObject = (None, None, PushObject, PushResult),
    /// `base[key]` with both operands on the stack
    GetProp = (Stack, Stack, GetProp, PushResult),
    /// `base.name` with a literal name
    GetPropLiteral = (Stack, Literal, GetProp, PushResult),
    /// Define a data property on the object under the value
    InitProp = (Literal, Stack, InitProp, None),
    /// Define a getter on the object under the function
    SetGetter = (Literal, Stack, SetGetter, None),
    /// Define a setter on the object under the function
    SetSetter = (Literal, Stack, SetSetter, None),
    /// Return the top of the stack
    Return = (Stack, None, Ret, None),
    /// Return `undefined`
    ReturnUndefined = (None, None, Ret, None),
    /// `callee(args...)`, this is undefined
    Call = (Byte, None, Call, PushResult),
    /// `receiver.callee(args...)`
    CallProp = (Byte, None, Call, PushResult, EXPLICIT_THIS),
    /// `ident(args...)` with the callee pushed by `PushCallee`
    CallIdent = (Byte, None, Call, PushResult, CALLEE_REFERENCE),
    /// `eval(args...)` in direct form
    CallEval = (Byte, None, Call, PushResult, CALLEE_REFERENCE, DIRECT_EVAL),
    /// `new callee(args...)`
    Construct = (Byte, None, Construct, PushResult),
    /// `==`
    Equal = (Stack, Stack, Equal, PushResult),
    /// `!=`
    NotEqual = (Stack, Stack, NotEqual, PushResult),
    /// `===`
    StrictEqual = (Stack, Stack, StrictEqual, PushResult),
    /// `!==`
    StrictNotEqual = (Stack, Stack, StrictNotEqual, PushResult),
    /// `+`
    Add = (Stack, Stack, Add, PushResult),
    /// `-`
    Sub = (Stack, Stack, Sub, PushResult),
    /// `*`
    Mul = (Stack, Stack, Mul, PushResult),
    /// `/`
    Div = (Stack, Stack, Div, PushResult),
    /// `%`
    Mod = (Stack, Stack, Mod, PushResult),
    /// `function name(...) {...}` hoisted declaration
    FuncDecl = (Literal, Literal, FuncDecl, None),
    /// `var name` hoisted declaration
    VarDecl = (Literal, None, VarDecl, None),
    /// `name = value`, result pushed
    Assign = (Literal, Stack, Assign, PushResult),
    /// `name = value;` as a statement
    AssignDrop = (Literal, Stack, Assign, None),
    /// `!value`
    LogicalNot = (Stack, None, LogicalNot, PushResult),
    /// `typeof value`
    TypeOf = (Stack, None, TypeOf, PushResult),
    /// `typeof name`
    TypeOfIdent = (Literal, None, TypeOfIdent, PushResult),
    /// `delete base[key]`
    DeleteProp = (Stack, Stack, DeleteProp, PushResult),
    /// `delete name`
    DeleteVar = (Literal, None, DeleteVar, PushResult),
    /// Forward jump, 1-byte offset
    JumpForward1 = (Branch1, None, Jump, None),
    /// Forward jump, 2-byte offset
    JumpForward2 = (Branch2, None, Jump, None),
    /// Forward jump, 3-byte offset
    JumpForward3 = (Branch3, None, Jump, None),
    /// Backward jump, 1-byte offset
    JumpBackward1 = (BackwardBranch1, None, Jump, None),
    /// Backward jump, 2-byte offset
    JumpBackward2 = (BackwardBranch2, None, Jump, None),
    /// Backward jump, 3-byte offset
    JumpBackward3 = (BackwardBranch3, None, Jump, None),
    /// Forward branch on truthy, 1-byte offset
    BranchIfTrueForward1 = (Branch1, Stack, BranchIfTrue, None),
    /// Forward branch on truthy, 2-byte offset
    BranchIfTrueForward2 = (Branch2, Stack, BranchIfTrue, None),
    /// Forward branch on truthy, 3-byte offset
    BranchIfTrueForward3 = (Branch3, Stack, BranchIfTrue, None),
    /// Backward branch on truthy, 1-byte offset
    BranchIfTrueBackward1 = (BackwardBranch1, Stack, BranchIfTrue, None),
    /// Backward branch on truthy, 2-byte offset
    BranchIfTrueBackward2 = (BackwardBranch2, Stack, BranchIfTrue, None),
    /// Backward branch on truthy, 3-byte offset
    BranchIfTrueBackward3 = (BackwardBranch3, Stack, BranchIfTrue, None),
    /// Forward branch on falsy, 1-byte offset
    BranchIfFalseForward1 = (Branch1, Stack, BranchIfFalse, None),
    /// Forward branch on falsy, 2-byte offset
    BranchIfFalseForward2 = (Branch2, Stack, BranchIfFalse, None),
    /// Forward branch on falsy, 3-byte offset
    BranchIfFalseForward3 = (Branch3, Stack, BranchIfFalse, None),
    /// Backward branch on falsy, 1-byte offset
    BranchIfFalseBackward1 = (BackwardBranch1, Stack, BranchIfFalse, None),
    /// Backward branch on falsy, 2-byte offset
    BranchIfFalseBackward2 = (BackwardBranch2, Stack, BranchIfFalse, None),
    /// Backward branch on falsy, 3-byte offset
    BranchIfFalseBackward3 = (BackwardBranch3, Stack, BranchIfFalse, None),
    /// `throw value`
    Throw = (Stack, None, Throw, None),
}

impl Opcode {
    /// Decode an opcode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Encode to an opcode byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Branch opcode of `group` whose offset operand has `kind`
    pub fn for_branch(group: OperationGroup, kind: OperandKind) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| {
            op.descriptor()
                .decode()
                .is_ok_and(|fields| fields.group == group && fields.left == kind)
        })
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op.to_byte()), Some(*op));
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_byte(0xFF), None);
    }

    #[test]
    fn test_every_descriptor_decodes() {
        for op in Opcode::ALL {
            assert!(op.descriptor().decode().is_ok(), "{op}");
        }
    }

    #[test]
    fn test_call_flags() {
        let fields = Opcode::CallEval.descriptor().decode().unwrap();
        assert_eq!(fields.group, OperationGroup::Call);
        assert!(fields.flags.contains(CallFlags::DIRECT_EVAL));
        assert!(fields.flags.contains(CallFlags::CALLEE_REFERENCE));
        assert!(!fields.flags.contains(CallFlags::EXPLICIT_THIS));

        let plain = Opcode::Call.descriptor().decode().unwrap();
        assert_eq!(plain.flags, CallFlags::NONE);
    }

    #[test]
    fn test_for_branch() {
        assert_eq!(
            Opcode::for_branch(OperationGroup::Jump, OperandKind::BackwardBranch2),
            Some(Opcode::JumpBackward2)
        );
        assert_eq!(
            Opcode::for_branch(OperationGroup::BranchIfFalse, OperandKind::Branch3),
            Some(Opcode::BranchIfFalseForward3)
        );
        assert_eq!(
            Opcode::for_branch(OperationGroup::Add, OperandKind::Branch1),
            None
        );
    }

    #[test]
    fn test_opcode_name() {
        assert_eq!(Opcode::Add.name(), "Add");
        assert_eq!(Opcode::PushUndefined.to_string(), "PushUndefined");
    }
}
