//! Frame context
//!
//! One `FrameContext` exists per activation of the dispatch loop. It owns
//! the evaluation stack and the per-frame flags, so a nested call never sees
//! (or clobbers) its caller's state.

use std::sync::Arc;

use heron_vm_bytecode::{CompiledCode, ScopeFlags};

use crate::env::LexEnv;
use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Mode flags for a new frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// Run as strict mode code
    pub strict: bool,
    /// Run as eval code (declarations become deletable)
    pub eval_code: bool,
}

/// Per-activation execution state
#[derive(Debug)]
pub struct FrameContext {
    code: Arc<CompiledCode>,
    pos: usize,
    lex_env: LexEnv,
    this_binding: Value,
    is_strict: bool,
    is_eval_code: bool,
    is_call_in_direct_eval_form: bool,
    stack: Vec<Value>,
    callee_bases: Vec<Option<LexEnv>>,
}

impl FrameContext {
    /// Create a frame positioned at `pos`
    pub fn new(code: Arc<CompiledCode>, pos: usize, lex_env: LexEnv, this_binding: Value, flags: RunFlags) -> Self {
        Self {
            code,
            pos,
            lex_env,
            this_binding,
            is_strict: flags.strict,
            is_eval_code: flags.eval_code,
            is_call_in_direct_eval_form: false,
            stack: Vec::new(),
            callee_bases: Vec::new(),
        }
    }

    /// Code being executed
    #[inline]
    pub fn code(&self) -> &Arc<CompiledCode> {
        &self.code
    }

    /// Offset of the next instruction
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current lexical environment
    #[inline]
    pub fn lex_env(&self) -> &LexEnv {
        &self.lex_env
    }

    /// The this-binding
    #[inline]
    pub fn this_binding(&self) -> &Value {
        &self.this_binding
    }

    /// Is the frame running strict mode code
    #[inline]
    pub fn is_strict(&self) -> bool {
        self.is_strict
    }

    /// Is the frame running eval code
    #[inline]
    pub fn is_eval_code(&self) -> bool {
        self.is_eval_code
    }

    /// Is a call in direct-eval form in progress
    #[inline]
    pub fn is_direct_eval_form_call(&self) -> bool {
        self.is_call_in_direct_eval_form
    }

    /// Scope flags of the running code
    #[inline]
    pub fn scope_flags(&self) -> ScopeFlags {
        self.code.flags
    }

    pub(crate) fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn begin_direct_eval_call(&mut self) {
        assert!(!self.is_call_in_direct_eval_form, "direct eval call already in progress");
        self.is_call_in_direct_eval_form = true;
    }

    pub(crate) fn end_direct_eval_call(&mut self) {
        assert!(self.is_call_in_direct_eval_form, "no direct eval call in progress");
        self.is_call_in_direct_eval_form = false;
    }

    // ==================== Evaluation stack ====================

    #[inline]
    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> VmResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::internal("evaluation stack underflow"))
    }

    pub(crate) fn peek(&self) -> VmResult<&Value> {
        self.stack
            .last()
            .ok_or_else(|| VmError::internal("evaluation stack underflow"))
    }

    pub(crate) fn stack_mut(&mut self) -> &mut Vec<Value> {
        &mut self.stack
    }

    /// Current evaluation stack depth
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn push_callee_base(&mut self, base: Option<LexEnv>) {
        self.callee_bases.push(base);
    }

    pub(crate) fn pop_callee_base(&mut self) -> VmResult<Option<LexEnv>> {
        self.callee_bases
            .pop()
            .ok_or_else(|| VmError::internal("call without a recorded callee reference"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FrameContext {
        let code = Arc::new(CompiledCode::builder().build().unwrap());
        FrameContext::new(code, 0, LexEnv::new_declarative(None), Value::Undefined, RunFlags::default())
    }

    #[test]
    fn test_direct_eval_flag_cycle() {
        let mut f = frame();
        assert!(!f.is_direct_eval_form_call());
        f.begin_direct_eval_call();
        assert!(f.is_direct_eval_form_call());
        f.end_direct_eval_call();
        assert!(!f.is_direct_eval_form_call());
    }

    #[test]
    #[should_panic(expected = "already in progress")]
    fn test_direct_eval_flag_not_reentrant() {
        let mut f = frame();
        f.begin_direct_eval_call();
        f.begin_direct_eval_call();
    }

    #[test]
    fn test_stack_underflow_is_internal() {
        let mut f = frame();
        assert!(matches!(f.pop(), Err(VmError::Internal(_))));
        f.push(Value::Null);
        assert!(f.peek().unwrap().is_null());
        assert_eq!(f.stack_depth(), 1);
        assert!(matches!(f.pop_callee_base(), Err(VmError::Internal(_))));
    }
}
