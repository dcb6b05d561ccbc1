//! Opcode descriptors
//!
//! Every opcode maps to a 32-bit descriptor that tells the dispatch loop how
//! to decode the operands, which handler family to invoke and what to do
//! with the handler result.
//!
//! ```text
//! 31      28 27      24 23            16 15      12 11     8 7              0
//! +---------+----------+----------------+----------+--------+----------------+
//! |  left   |  right   |     group      |   post   |reserved|     flags      |
//! +---------+----------+----------------+----------+--------+----------------+
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};

const LEFT_SHIFT: u32 = 28;
const RIGHT_SHIFT: u32 = 24;
const GROUP_SHIFT: u32 = 16;
const POST_SHIFT: u32 = 12;
const NIBBLE_MASK: u32 = 0xf;
const BYTE_MASK: u32 = 0xff;
const RESERVED_MASK: u32 = 0x0f00;

/// How an operand is encoded in the instruction stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperandKind {
    /// No operand
    None = 0,
    /// Forward branch, 1-byte offset
    Branch1 = 1,
    /// Forward branch, 2-byte offset
    Branch2 = 2,
    /// Forward branch, 3-byte offset
    Branch3 = 3,
    /// Backward branch, 1-byte offset
    BackwardBranch1 = 4,
    /// Backward branch, 2-byte offset
    BackwardBranch2 = 5,
    /// Backward branch, 3-byte offset
    BackwardBranch3 = 6,
    /// Raw byte immediate
    Byte = 7,
    /// Literal table index (2 bytes, little endian)
    Literal = 8,
    /// Value popped from the evaluation stack
    Stack = 9,
}

impl OperandKind {
    /// Every operand kind, in encoding order
    pub const ALL: [OperandKind; 10] = [
        OperandKind::None,
        OperandKind::Branch1,
        OperandKind::Branch2,
        OperandKind::Branch3,
        OperandKind::BackwardBranch1,
        OperandKind::BackwardBranch2,
        OperandKind::BackwardBranch3,
        OperandKind::Byte,
        OperandKind::Literal,
        OperandKind::Stack,
    ];

    /// Decode from a 4-bit field
    pub fn from_bits(bits: u8) -> Result<Self> {
        Self::ALL
            .get(bits as usize)
            .copied()
            .ok_or(BytecodeError::InvalidOperandKind(bits))
    }

    /// Number of bytes this operand occupies after the opcode byte
    pub const fn encoded_len(self) -> usize {
        match self {
            Self::None | Self::Stack => 0,
            Self::Branch1 | Self::BackwardBranch1 | Self::Byte => 1,
            Self::Branch2 | Self::BackwardBranch2 | Self::Literal => 2,
            Self::Branch3 | Self::BackwardBranch3 => 3,
        }
    }

    /// Whether this is a branch offset, and if so whether it jumps backward
    pub const fn branch_direction(self) -> Option<bool> {
        match self {
            Self::Branch1 | Self::Branch2 | Self::Branch3 => Some(false),
            Self::BackwardBranch1 | Self::BackwardBranch2 | Self::BackwardBranch3 => Some(true),
            _ => None,
        }
    }

    /// Narrowest branch kind able to hold `offset`
    pub fn branch_for(offset: usize, backward: bool) -> Result<Self> {
        let kind = match (offset, backward) {
            (0..=0xff, false) => Self::Branch1,
            (0..=0xffff, false) => Self::Branch2,
            (0..=0xff_ffff, false) => Self::Branch3,
            (0..=0xff, true) => Self::BackwardBranch1,
            (0..=0xffff, true) => Self::BackwardBranch2,
            (0..=0xff_ffff, true) => Self::BackwardBranch3,
            _ => return Err(BytecodeError::BranchTooFar(offset)),
        };
        Ok(kind)
    }
}

/// Semantic family selected by a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationGroup {
    /// No operation
    None = 0,
    /// Discard the left operand
    Pop,
    /// Push the left operand
    Push,
    /// Duplicate the top of the stack
    PushTwo,
    /// Return from the current code
    Ret,
    /// Function call
    Call,
    /// `new` expression
    Construct,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `===`
    StrictEqual,
    /// `!==`
    StrictNotEqual,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// Push `undefined`
    PushUndefined,
    /// Push `null`
    PushNull,
    /// Push `true`
    PushTrue,
    /// Push `false`
    PushFalse,
    /// Push the this-binding
    PushThis,
    /// Push the value of an identifier
    PushIdent,
    /// Push the value of an identifier used as a callee
    PushCallee,
    /// Push a fresh empty object
    PushObject,
    /// Property read `base[key]`
    GetProp,
    /// Data property initializer in an object literal
    InitProp,
    /// Function declaration
    FuncDecl,
    /// Variable declaration
    VarDecl,
    /// Assignment to an identifier
    Assign,
    /// `!`
    LogicalNot,
    /// `typeof` on a value
    TypeOf,
    /// `typeof` on an identifier
    TypeOfIdent,
    /// Getter in an object literal
    SetGetter,
    /// Setter in an object literal
    SetSetter,
    /// `delete base[key]`
    DeleteProp,
    /// `delete ident`
    DeleteVar,
    /// Unconditional branch
    Jump,
    /// Branch when the operand is truthy
    BranchIfTrue,
    /// Branch when the operand is falsy
    BranchIfFalse,
    /// `throw`
    Throw,
}

impl OperationGroup {
    /// Every group, in encoding order
    pub const ALL: [OperationGroup; 40] = [
        OperationGroup::None,
        OperationGroup::Pop,
        OperationGroup::Push,
        OperationGroup::PushTwo,
        OperationGroup::Ret,
        OperationGroup::Call,
        OperationGroup::Construct,
        OperationGroup::Equal,
        OperationGroup::NotEqual,
        OperationGroup::StrictEqual,
        OperationGroup::StrictNotEqual,
        OperationGroup::Add,
        OperationGroup::Sub,
        OperationGroup::Mul,
        OperationGroup::Div,
        OperationGroup::Mod,
        OperationGroup::PushUndefined,
        OperationGroup::PushNull,
        OperationGroup::PushTrue,
        OperationGroup::PushFalse,
        OperationGroup::PushThis,
        OperationGroup::PushIdent,
        OperationGroup::PushCallee,
        OperationGroup::PushObject,
        OperationGroup::GetProp,
        OperationGroup::InitProp,
        OperationGroup::FuncDecl,
        OperationGroup::VarDecl,
        OperationGroup::Assign,
        OperationGroup::LogicalNot,
        OperationGroup::TypeOf,
        OperationGroup::TypeOfIdent,
        OperationGroup::SetGetter,
        OperationGroup::SetSetter,
        OperationGroup::DeleteProp,
        OperationGroup::DeleteVar,
        OperationGroup::Jump,
        OperationGroup::BranchIfTrue,
        OperationGroup::BranchIfFalse,
        OperationGroup::Throw,
    ];

    /// Decode from an 8-bit field
    pub fn from_bits(bits: u8) -> Result<Self> {
        Self::ALL
            .get(bits as usize)
            .copied()
            .ok_or(BytecodeError::InvalidGroup(bits))
    }
}

/// What the dispatch loop does with a handler's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PostProcess {
    /// Drop the result
    None = 0,
    /// Push the result onto the evaluation stack
    PushResult = 1,
}

impl PostProcess {
    /// Every action, in encoding order
    pub const ALL: [PostProcess; 2] = [PostProcess::None, PostProcess::PushResult];

    /// Decode from a 4-bit field
    pub fn from_bits(bits: u8) -> Result<Self> {
        Self::ALL
            .get(bits as usize)
            .copied()
            .ok_or(BytecodeError::InvalidPostProcess(bits))
    }
}

/// Call-site flags carried in the low byte of a descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CallFlags(pub u8);

impl CallFlags {
    /// No flags
    pub const NONE: CallFlags = CallFlags(0);
    /// Call written syntactically as `eval(...)`
    pub const DIRECT_EVAL: CallFlags = CallFlags(1 << 0);
    /// Receiver sits below the callee on the stack
    pub const EXPLICIT_THIS: CallFlags = CallFlags(1 << 1);
    /// Callee was pushed by `PushCallee`; this comes from its base environment
    pub const CALLEE_REFERENCE: CallFlags = CallFlags(1 << 2);

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check whether every bit of `other` is set
    #[inline]
    pub const fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets
    #[inline]
    pub const fn union(self, other: CallFlags) -> CallFlags {
        CallFlags(self.0 | other.0)
    }
}

/// Unpacked descriptor fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorFields {
    /// Left operand kind
    pub left: OperandKind,
    /// Right operand kind
    pub right: OperandKind,
    /// Operation group
    pub group: OperationGroup,
    /// Post-process action
    pub post: PostProcess,
    /// Call-site flags
    pub flags: CallFlags,
}

/// Packed 32-bit opcode descriptor
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Descriptor(u32);

impl Descriptor {
    /// Pack descriptor fields
    pub const fn new(
        left: OperandKind,
        right: OperandKind,
        group: OperationGroup,
        post: PostProcess,
        flags: CallFlags,
    ) -> Self {
        Self(
            ((left as u32 & NIBBLE_MASK) << LEFT_SHIFT)
                | ((right as u32 & NIBBLE_MASK) << RIGHT_SHIFT)
                | ((group as u32 & BYTE_MASK) << GROUP_SHIFT)
                | ((post as u32 & NIBBLE_MASK) << POST_SHIFT)
                | (flags.0 as u32),
        )
    }

    /// Pack from an unpacked field set
    pub const fn encode(fields: DescriptorFields) -> Self {
        Self::new(
            fields.left,
            fields.right,
            fields.group,
            fields.post,
            fields.flags,
        )
    }

    /// Validate raw bits
    pub fn from_bits(bits: u32) -> Result<Self> {
        let descriptor = Self(bits);
        descriptor.decode()?;
        Ok(descriptor)
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Unpack every field, failing on unknown values or reserved bits
    pub fn decode(self) -> Result<DescriptorFields> {
        if self.0 & RESERVED_MASK != 0 {
            return Err(BytecodeError::ReservedBits(self.0));
        }
        Ok(DescriptorFields {
            left: OperandKind::from_bits(self.field(LEFT_SHIFT, NIBBLE_MASK))?,
            right: OperandKind::from_bits(self.field(RIGHT_SHIFT, NIBBLE_MASK))?,
            group: OperationGroup::from_bits(self.field(GROUP_SHIFT, BYTE_MASK))?,
            post: PostProcess::from_bits(self.field(POST_SHIFT, NIBBLE_MASK))?,
            flags: CallFlags(self.field(0, BYTE_MASK)),
        })
    }

    #[inline]
    fn field(self, shift: u32, mask: u32) -> u8 {
        ((self.0 >> shift) & mask) as u8
    }
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.decode() {
            Ok(fields) => f
                .debug_struct("Descriptor")
                .field("left", &fields.left)
                .field("right", &fields.right)
                .field("group", &fields.group)
                .field("post", &fields.post)
                .field("flags", &fields.flags.0)
                .finish(),
            Err(_) => write!(f, "Descriptor({:#010x})", self.0),
        }
    }
}
