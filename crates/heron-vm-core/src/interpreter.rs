//! Dispatch loop
//!
//! Decodes one instruction at a time, resolves its operands as the opcode
//! descriptor says (popping STACK operands right first, looking up
//! literals), routes it to a handler by operation group and applies the
//! descriptor's post-process action to the handler's completion.

use std::sync::Arc;

use heron_vm_bytecode::{CallFlags, CompiledCode, Instruction, Literal, OperationGroup, PostProcess, RawOperand};

use crate::collection::ArgList;
use crate::completion::Completion;
use crate::context::FrameContext;
use crate::convert::{abstract_equals, strict_equals};
use crate::error::{VmError, VmResult};
use crate::handlers::{self, ThisSource};
use crate::object::JsObject;
use crate::operators::{self, NumericOp};
use crate::runtime::VmRuntime;
use crate::string::JsString;
use crate::value::Value;

/// Outcome of one instruction
#[derive(Debug)]
enum InstructionResult {
    /// Fall through to the next instruction
    Continue,
    /// Continue at an absolute offset
    Jump(usize),
    /// Leave the frame
    Return(Value),
}

/// A resolved operand
#[derive(Debug)]
enum Operand {
    None,
    Branch(usize),
    Byte(u8),
    Value(Value),
    Code(Arc<CompiledCode>),
}

impl Operand {
    fn resolve(frame: &mut FrameContext, code: &CompiledCode, raw: RawOperand) -> VmResult<Self> {
        Ok(match raw {
            RawOperand::None => Self::None,
            RawOperand::Branch(target) => Self::Branch(target),
            RawOperand::Byte(b) => Self::Byte(b),
            RawOperand::Stack => Self::Value(frame.pop()?),
            RawOperand::Literal(idx) => match code.literal(idx)? {
                Literal::Number(n) => Self::Value(Value::Number(*n)),
                Literal::String(s) => Self::Value(Value::String(JsString::from(s.clone()))),
                Literal::Function(nested) => Self::Code(nested.clone()),
            },
        })
    }

    fn into_value(self) -> VmResult<Value> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Byte(b) => Ok(Value::Number(f64::from(b))),
            other => Err(mismatch("value", &other)),
        }
    }

    fn into_name(self) -> VmResult<JsString> {
        match self {
            Self::Value(Value::String(s)) => Ok(s),
            other => Err(mismatch("name", &other)),
        }
    }

    fn into_code(self) -> VmResult<Arc<CompiledCode>> {
        match self {
            Self::Code(code) => Ok(code),
            other => Err(mismatch("function literal", &other)),
        }
    }

    fn byte(self) -> VmResult<u8> {
        match self {
            Self::Byte(b) => Ok(b),
            other => Err(mismatch("byte", &other)),
        }
    }

    fn branch(self) -> VmResult<usize> {
        match self {
            Self::Branch(target) => Ok(target),
            other => Err(mismatch("branch target", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &Operand) -> VmError {
    VmError::internal(format!("expected {expected} operand, found {found:?}"))
}

/// Run `frame` until it returns, throws or falls off the end of its code
///
/// Script errors raised by handlers end the frame as a `Throw` completion;
/// bytecode and internal errors are returned as `Err`.
pub(crate) fn run(rt: &mut VmRuntime, frame: &mut FrameContext) -> VmResult<Completion> {
    let code = frame.code().clone();
    loop {
        let pos = frame.position();
        if pos >= code.bytecode.len() {
            return Ok(Completion::Empty);
        }

        let insn = code.decode_at(pos)?;
        tracing::trace!(
            pos,
            opcode = insn.opcode.name(),
            stack = frame.stack_depth(),
            "dispatch"
        );
        frame.set_position(insn.next);

        match execute_instruction(rt, frame, &code, &insn) {
            Ok(InstructionResult::Continue) => {}
            Ok(InstructionResult::Jump(target)) => frame.set_position(target),
            Ok(InstructionResult::Return(value)) => return Ok(Completion::Return(value)),
            Err(err) => {
                let exception = rt.thrown_value(err)?;
                tracing::trace!(pos, exception = %exception.describe(), "throw");
                return Ok(Completion::Throw(exception));
            }
        }
    }
}

fn execute_instruction(
    rt: &mut VmRuntime,
    frame: &mut FrameContext,
    code: &CompiledCode,
    insn: &Instruction,
) -> VmResult<InstructionResult> {
    let fields = insn.fields;
    let right = Operand::resolve(frame, code, insn.right)?;
    let left = Operand::resolve(frame, code, insn.left)?;

    let completion = match fields.group {
        OperationGroup::None => Completion::Empty,
        OperationGroup::Pop => {
            left.into_value()?;
            Completion::Empty
        }
        OperationGroup::Push => Completion::Normal(left.into_value()?),
        OperationGroup::PushTwo => Completion::Normal(frame.peek()?.clone()),
        OperationGroup::Ret => {
            let value = match left {
                Operand::None => Value::Undefined,
                other => other.into_value()?,
            };
            return Ok(InstructionResult::Return(value));
        }

        // ==================== Calls ====================
        OperationGroup::Call => dispatch_call(rt, frame, fields.flags, left)?,
        OperationGroup::Construct => dispatch_construct(rt, frame, left)?,

        // ==================== Binary operators ====================
        OperationGroup::Equal => {
            Completion::boolean(abstract_equals(rt, &left.into_value()?, &right.into_value()?)?)
        }
        OperationGroup::NotEqual => {
            Completion::boolean(!abstract_equals(rt, &left.into_value()?, &right.into_value()?)?)
        }
        OperationGroup::StrictEqual => {
            Completion::boolean(strict_equals(&left.into_value()?, &right.into_value()?))
        }
        OperationGroup::StrictNotEqual => {
            Completion::boolean(!strict_equals(&left.into_value()?, &right.into_value()?))
        }
        OperationGroup::Add => {
            Completion::Normal(operators::add(rt, &left.into_value()?, &right.into_value()?)?)
        }
        OperationGroup::Sub => numeric(rt, NumericOp::Sub, left, right)?,
        OperationGroup::Mul => numeric(rt, NumericOp::Mul, left, right)?,
        OperationGroup::Div => numeric(rt, NumericOp::Div, left, right)?,
        OperationGroup::Mod => numeric(rt, NumericOp::Mod, left, right)?,

        // ==================== Constants and identifiers ====================
        OperationGroup::PushUndefined => Completion::undefined(),
        OperationGroup::PushNull => Completion::Normal(Value::Null),
        OperationGroup::PushTrue => Completion::boolean(true),
        OperationGroup::PushFalse => Completion::boolean(false),
        OperationGroup::PushThis => Completion::Normal(frame.this_binding().clone()),
        OperationGroup::PushIdent => handlers::push_ident(rt, frame, left.into_name()?)?,
        OperationGroup::PushCallee => handlers::push_callee(rt, frame, left.into_name()?)?,
        OperationGroup::PushObject => Completion::Normal(Value::Object(JsObject::new(Some(
            rt.realm().object_prototype.clone(),
        )))),

        // ==================== Properties ====================
        OperationGroup::GetProp => {
            handlers::get_prop(rt, frame, left.into_value()?, right.into_value()?)?
        }
        OperationGroup::InitProp => {
            handlers::init_prop(frame.peek()?, left.into_name()?, right.into_value()?)?;
            Completion::Empty
        }
        OperationGroup::SetGetter | OperationGroup::SetSetter => {
            let is_getter = fields.group == OperationGroup::SetGetter;
            handlers::set_accessor(frame.peek()?, left.into_name()?, right.into_value()?, is_getter)?;
            Completion::Empty
        }

        // ==================== Declarations and assignment ====================
        OperationGroup::FuncDecl => {
            handlers::func_decl(rt, frame, left.into_name()?, right.into_code()?)?
        }
        OperationGroup::VarDecl => handlers::var_decl(rt, frame, left.into_name()?)?,
        OperationGroup::Assign => {
            handlers::assignment(rt, frame, left.into_name()?, right.into_value()?)?
        }

        // ==================== Unary operators ====================
        OperationGroup::LogicalNot => handlers::logical_not(&left.into_value()?),
        OperationGroup::TypeOf => handlers::type_of(&left.into_value()?),
        OperationGroup::TypeOfIdent => handlers::typeof_ident(rt, frame, left.into_name()?)?,
        OperationGroup::DeleteProp => {
            handlers::delete_prop(rt, frame, left.into_value()?, right.into_value()?)?
        }
        OperationGroup::DeleteVar => handlers::delete_var(frame, left.into_name()?)?,

        // ==================== Control flow ====================
        OperationGroup::Jump => return Ok(InstructionResult::Jump(left.branch()?)),
        OperationGroup::BranchIfTrue | OperationGroup::BranchIfFalse => {
            let target = left.branch()?;
            let condition = right.into_value()?.to_boolean();
            let want = fields.group == OperationGroup::BranchIfTrue;
            return Ok(if condition == want {
                InstructionResult::Jump(target)
            } else {
                InstructionResult::Continue
            });
        }
        OperationGroup::Throw => return Err(VmError::exception(left.into_value()?)),
    };

    post_process(frame, fields.post, completion)
}

#[inline(never)]
fn dispatch_call(
    rt: &mut VmRuntime,
    frame: &mut FrameContext,
    flags: CallFlags,
    argc: Operand,
) -> VmResult<Completion> {
    let argc = usize::from(argc.byte()?);
    let args = ArgList::pop_from_stack(frame.stack_mut(), argc)?;
    let callee = frame.pop()?;
    let this = if flags.contains(CallFlags::EXPLICIT_THIS) {
        ThisSource::Explicit(frame.pop()?)
    } else if flags.contains(CallFlags::CALLEE_REFERENCE) {
        ThisSource::Reference(frame.pop_callee_base()?)
    } else {
        ThisSource::None
    };
    handlers::call(rt, frame, callee, this, args, flags.contains(CallFlags::DIRECT_EVAL))
}

#[inline(never)]
fn dispatch_construct(rt: &mut VmRuntime, frame: &mut FrameContext, argc: Operand) -> VmResult<Completion> {
    let argc = usize::from(argc.byte()?);
    let args = ArgList::pop_from_stack(frame.stack_mut(), argc)?;
    let ctor = frame.pop()?;
    handlers::construct(rt, frame, ctor, args)
}

fn numeric(rt: &mut VmRuntime, op: NumericOp, left: Operand, right: Operand) -> VmResult<Completion> {
    let value = operators::numeric(rt, op, &left.into_value()?, &right.into_value()?)?;
    Ok(Completion::Normal(value))
}

fn post_process(
    frame: &mut FrameContext,
    post: PostProcess,
    completion: Completion,
) -> VmResult<InstructionResult> {
    match (post, completion) {
        (_, Completion::Throw(exception)) => Err(VmError::exception(exception)),
        (PostProcess::PushResult, Completion::Normal(value)) => {
            frame.push(value);
            Ok(InstructionResult::Continue)
        }
        (PostProcess::PushResult, other) => Err(VmError::internal(format!(
            "no value to push from {other:?}"
        ))),
        (PostProcess::None, _) => Ok(InstructionResult::Continue),
    }
}
