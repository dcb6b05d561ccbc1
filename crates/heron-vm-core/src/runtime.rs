//! VM runtime: engine entry points
//!
//! `VmRuntime` owns the realm and the configuration. Every script-level
//! activation (global code, eval code, function bodies) goes through
//! [`VmRuntime::run_from_pos`], which creates a fresh [`FrameContext`] and
//! hands it to the dispatch loop.

use std::sync::Arc;

use heron_vm_bytecode::{CompiledCode, ScopeFlags};

use crate::collection::ArgList;
use crate::completion::{Completion, CompletionCode};
use crate::context::{FrameContext, RunFlags};
use crate::convert::to_object;
use crate::env::LexEnv;
use crate::error::{VmError, VmResult};
use crate::interpreter;
use crate::object::{
    FunctionKind, JsObject, NativeCall, ObjectKind, PropertyAttributes, PropertyDescriptor,
};
use crate::realm::{ErrorKind, Realm};
use crate::string::{JsString, Magic};
use crate::value::Value;

/// Free stack below which a new frame moves to a fresh stack segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each stack segment allocated for deep recursion
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Turns eval source text into compiled code; the flag requests strict code
pub type EvalCompiler = Arc<dyn Fn(&str, bool) -> Result<CompiledCode, String> + Send + Sync>;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum nesting of calls and constructs
    pub max_call_depth: usize,
    /// Run global code as strict mode code
    pub strict_mode: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1000,
            strict_mode: false,
        }
    }
}

/// The VM runtime
pub struct VmRuntime {
    realm: Realm,
    config: VmConfig,
    global_code: Option<Arc<CompiledCode>>,
    global_strict: bool,
    call_depth: usize,
    eval_compiler: Option<EvalCompiler>,
}

impl VmRuntime {
    /// Create a new runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            realm: Realm::new(),
            config,
            global_code: None,
            global_strict: false,
            call_depth: 0,
            eval_compiler: None,
        }
    }

    /// Get configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The realm
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// The global object
    pub fn global_object(&self) -> &JsObject {
        &self.realm.global_object
    }

    /// The global environment
    pub fn global_env(&self) -> &LexEnv {
        &self.realm.global_env
    }

    /// Install the compiler used by the global `eval` function
    ///
    /// The value of an eval call is the operand of the eval code's `Return`.
    /// Code that falls off its end evaluates to undefined, so a compiler that
    /// wants the program's completion value must end the unit with `Return`.
    pub fn set_eval_compiler(
        &mut self,
        compiler: impl Fn(&str, bool) -> Result<CompiledCode, String> + Send + Sync + 'static,
    ) {
        self.eval_compiler = Some(Arc::new(compiler));
    }

    pub(crate) fn compile_eval(&self, source: &str, strict: bool) -> VmResult<Arc<CompiledCode>> {
        let compiler = self
            .eval_compiler
            .as_ref()
            .ok_or_else(|| VmError::syntax_error("eval is unavailable without a compiler"))?;
        compiler(source, strict)
            .map(Arc::new)
            .map_err(VmError::SyntaxError)
    }

    // ==================== Entry points ====================

    /// Install the top-level code
    pub fn init(&mut self, code: impl Into<Arc<CompiledCode>>, strict: bool) {
        self.global_code = Some(code.into());
        self.global_strict = strict;
    }

    /// Run the installed global code
    pub fn run_global(&mut self) -> VmResult<CompletionCode> {
        let code = self
            .global_code
            .clone()
            .ok_or_else(|| VmError::internal("no global code installed"))?;
        let strict = self.global_strict || self.config.strict_mode || code.is_strict();
        let this = Value::Object(self.realm.global_object.clone());
        let env = self.realm.global_env.clone();

        match self.run_from_pos(code, 0, this, env, RunFlags { strict, eval_code: false })? {
            Completion::Throw(exception) => {
                tracing::debug!(exception = %exception.describe(), "uncaught exception in global code");
                Ok(CompletionCode::UnhandledException(exception))
            }
            _ => Ok(CompletionCode::Ok),
        }
    }

    /// Run eval code (ES5 10.4.2)
    ///
    /// A direct eval inherits the caller's this-binding and environment, and
    /// its strictness. Strict eval code gets its own declarative environment.
    pub fn run_eval(
        &mut self,
        code: Arc<CompiledCode>,
        is_direct: bool,
        caller: Option<&FrameContext>,
    ) -> VmResult<Completion> {
        let (this, env, caller_strict) = match caller.filter(|_| is_direct) {
            Some(frame) => (
                frame.this_binding().clone(),
                frame.lex_env().clone(),
                frame.is_strict(),
            ),
            None => (
                Value::Object(self.realm.global_object.clone()),
                self.realm.global_env.clone(),
                false,
            ),
        };
        let strict = code.is_strict() || caller_strict;
        let env = if strict {
            LexEnv::new_declarative(Some(env))
        } else {
            env
        };
        self.run_from_pos(code, 0, this, env, RunFlags { strict, eval_code: true })
    }

    /// Run `code` from instruction offset `pos` in a new frame
    ///
    /// Nested activations recurse on the native stack, which is grown in
    /// segments so `max_call_depth` is reached before the thread stack runs
    /// out.
    pub fn run_from_pos(
        &mut self,
        code: Arc<CompiledCode>,
        pos: usize,
        this: Value,
        env: LexEnv,
        flags: RunFlags,
    ) -> VmResult<Completion> {
        let mut frame = FrameContext::new(code, pos, env, this, flags);
        tracing::debug!(
            code = frame.code().display_name(),
            pos,
            strict = flags.strict,
            eval = flags.eval_code,
            depth = self.call_depth,
            "enter frame"
        );
        let completion = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            interpreter::run(self, &mut frame)
        });
        tracing::debug!(
            code = frame.code().display_name(),
            ok = completion.is_ok(),
            "leave frame"
        );
        completion
    }

    /// Scope flags of a code unit
    pub fn scope_flags(code: &CompiledCode) -> ScopeFlags {
        code.flags
    }

    // ==================== Calls ====================

    /// [[Call]]
    pub fn call_function(
        &mut self,
        func: &Value,
        this: Value,
        args: ArgList,
        caller: Option<&FrameContext>,
    ) -> VmResult<Value> {
        let Some(obj) = func.as_object().filter(|o| o.is_callable()).cloned() else {
            return Err(VmError::type_error(format!(
                "{} is not a function",
                func.describe()
            )));
        };
        self.enter_call()?;
        let result = self.invoke(&obj, this, args, caller, false);
        self.call_depth -= 1;
        result
    }

    /// [[Construct]] (ES5 13.2.2)
    pub fn construct(
        &mut self,
        ctor: &Value,
        args: ArgList,
        caller: Option<&FrameContext>,
    ) -> VmResult<Value> {
        let Some(obj) = ctor.as_object().filter(|o| o.is_constructor()).cloned() else {
            return Err(VmError::type_error(format!(
                "{} is not a constructor",
                ctor.describe()
            )));
        };
        self.enter_call()?;
        let result = self.construct_object(&obj, args, caller);
        self.call_depth -= 1;
        result
    }

    fn enter_call(&mut self) -> VmResult<()> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(VmError::range_error("Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        Ok(())
    }

    fn construct_object(
        &mut self,
        ctor: &JsObject,
        args: ArgList,
        caller: Option<&FrameContext>,
    ) -> VmResult<Value> {
        if let Some(FunctionKind::Native { .. }) = ctor.function_kind() {
            return self.invoke(ctor, Value::Undefined, args, caller, true);
        }

        let proto = match self.get(ctor, &JsString::magic(Magic::Prototype))? {
            Value::Object(proto) => proto,
            _ => self.realm.object_prototype.clone(),
        };
        let instance = JsObject::new(Some(proto));
        let result = self.invoke(ctor, Value::Object(instance.clone()), args, caller, true)?;
        Ok(if result.is_object() {
            result
        } else {
            Value::Object(instance)
        })
    }

    fn invoke(
        &mut self,
        func: &JsObject,
        this: Value,
        args: ArgList,
        caller: Option<&FrameContext>,
        is_construct: bool,
    ) -> VmResult<Value> {
        match func.function_kind() {
            Some(FunctionKind::Native { func: native, .. }) => {
                let native = native.clone();
                native(
                    self,
                    NativeCall {
                        this,
                        args,
                        caller,
                        is_construct,
                    },
                )
            }
            Some(FunctionKind::Script { code, scope }) => {
                let (code, scope) = (code.clone(), scope.clone());
                self.call_script(func, code, scope, this, args)
            }
            None => Err(VmError::type_error("not a function")),
        }
    }

    /// Enter a script function body (ES5 10.4.3, 10.5)
    fn call_script(
        &mut self,
        callee: &JsObject,
        code: Arc<CompiledCode>,
        scope: LexEnv,
        this: Value,
        args: ArgList,
    ) -> VmResult<Value> {
        let strict = code.is_strict();
        let this = if strict || this.is_object() {
            this
        } else if this.is_nullish() {
            Value::Object(self.realm.global_object.clone())
        } else {
            Value::Object(to_object(self, &this)?)
        };

        let env = LexEnv::new_declarative(Some(scope));
        for (i, name) in code.param_names.iter().enumerate() {
            let name = JsString::from(name.clone());
            if !env.has_binding(&name) {
                env.create_mutable_binding(name.clone(), false)?;
            }
            env.set_mutable_binding(self, &name, args.get_or_undefined(i), strict)?;
        }

        let arguments = JsString::magic(Magic::Arguments);
        if !code.flags.not_ref_arguments && !env.has_binding(&arguments) {
            let arguments_obj = Value::Object(self.create_arguments_object(callee, &args, strict));
            if strict {
                env.create_immutable_binding(arguments, arguments_obj)?;
            } else {
                env.create_mutable_binding(arguments.clone(), false)?;
                env.set_mutable_binding(self, &arguments, arguments_obj, false)?;
            }
        }

        match self.run_from_pos(code, 0, this, env, RunFlags { strict, eval_code: false })? {
            Completion::Return(value) => Ok(value),
            Completion::Throw(exception) => Err(VmError::exception(exception)),
            _ => Ok(Value::Undefined),
        }
    }

    // ==================== Object operations ====================

    /// Create a script function object (ES5 13.2)
    pub fn create_function(&self, code: Arc<CompiledCode>, scope: LexEnv) -> JsObject {
        let param_count = code.param_count();
        let func = JsObject::with_kind(
            Some(self.realm.function_prototype.clone()),
            ObjectKind::Function(FunctionKind::Script { code, scope }),
        );
        func.define_own_property(
            JsString::magic(Magic::Length),
            PropertyDescriptor::data_with_attrs(
                Value::Number(param_count as f64),
                PropertyAttributes::frozen(),
            ),
        );

        let proto = JsObject::new(Some(self.realm.object_prototype.clone()));
        proto.define_own_property(
            JsString::magic(Magic::Constructor),
            PropertyDescriptor::data_with_attrs(
                Value::Object(func.clone()),
                PropertyAttributes::hidden(),
            ),
        );
        func.define_own_property(
            JsString::magic(Magic::Prototype),
            PropertyDescriptor::data_with_attrs(
                Value::Object(proto),
                PropertyAttributes {
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            ),
        );
        func
    }

    // Unmapped: parameters and indexed properties do not alias.
    fn create_arguments_object(&self, callee: &JsObject, args: &ArgList, strict: bool) -> JsObject {
        let obj = JsObject::with_kind(
            Some(self.realm.object_prototype.clone()),
            ObjectKind::Arguments,
        );
        for (i, value) in args.iter().enumerate() {
            obj.create_data_property(JsString::from(i.to_string()), value.clone());
        }
        obj.define_own_property(
            JsString::magic(Magic::Length),
            PropertyDescriptor::data_with_attrs(
                Value::Number(args.len() as f64),
                PropertyAttributes::hidden(),
            ),
        );
        if !strict {
            obj.define_own_property(
                JsString::magic(Magic::Callee),
                PropertyDescriptor::data_with_attrs(
                    Value::Object(callee.clone()),
                    PropertyAttributes::hidden(),
                ),
            );
        }
        obj
    }

    /// [[Get]] (ES5 8.12.3)
    pub fn get(&mut self, obj: &JsObject, key: &JsString) -> VmResult<Value> {
        self.get_with_receiver(obj, key, Value::Object(obj.clone()))
    }

    /// [[Get]] with getters invoked on `receiver`
    pub fn get_with_receiver(
        &mut self,
        obj: &JsObject,
        key: &JsString,
        receiver: Value,
    ) -> VmResult<Value> {
        match obj.get_property(key) {
            Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
            Some(PropertyDescriptor::Accessor { get: Some(getter), .. }) => {
                self.call_function(&Value::Object(getter), receiver, ArgList::new(), None)
            }
            Some(PropertyDescriptor::Accessor { get: None, .. }) | None => Ok(Value::Undefined),
        }
    }

    /// [[Put]] (ES5 8.12.5)
    pub fn put(&mut self, obj: &JsObject, key: JsString, value: Value, throw: bool) -> VmResult<()> {
        match obj.get_property(&key) {
            Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) => {
                let args: ArgList = [value].into_iter().collect();
                self.call_function(&Value::Object(setter), Value::Object(obj.clone()), args, None)?;
                Ok(())
            }
            Some(PropertyDescriptor::Accessor { set: None, .. }) => reject(
                throw,
                format!("Cannot set property '{key}' which has only a getter"),
            ),
            Some(PropertyDescriptor::Data { attributes, .. }) if !attributes.writable => reject(
                throw,
                format!("Cannot assign to read only property '{key}'"),
            ),
            Some(PropertyDescriptor::Data { .. }) if obj.has_own_property(&key) => {
                obj.set_own_value(&key, value);
                Ok(())
            }
            _ if !obj.is_extensible() => reject(
                throw,
                format!("Cannot add property '{key}', object is not extensible"),
            ),
            _ => {
                obj.create_data_property(key, value);
                Ok(())
            }
        }
    }

    // ==================== Errors ====================

    /// Create an error object of `kind`
    pub fn create_error(&self, kind: ErrorKind, message: &str) -> JsObject {
        self.realm.create_error(kind, message)
    }

    /// The value script code observes for `err`
    ///
    /// Engine faults are handed back unchanged.
    pub(crate) fn thrown_value(&self, err: VmError) -> VmResult<Value> {
        let (kind, message) = match err {
            VmError::Exception(thrown) => return Ok(thrown.value),
            VmError::TypeError(m) => (ErrorKind::Type, m),
            VmError::ReferenceError(m) => (ErrorKind::Reference, m),
            VmError::RangeError(m) => (ErrorKind::Range, m),
            VmError::SyntaxError(m) => (ErrorKind::Syntax, m),
            fault @ (VmError::Bytecode(_) | VmError::Internal(_)) => return Err(fault),
        };
        Ok(Value::Object(self.realm.create_error(kind, &message)))
    }
}

impl Default for VmRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn reject(throw: bool, message: String) -> VmResult<()> {
    if throw {
        Err(VmError::TypeError(message))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_call_depth, 1000);
        assert!(!config.strict_mode);
    }

    #[test]
    fn test_run_global_without_code() {
        let mut rt = VmRuntime::new();
        assert!(matches!(rt.run_global(), Err(VmError::Internal(_))));
    }

    #[test]
    fn test_create_function_shape() {
        let rt = VmRuntime::new();
        let code = Arc::new(CompiledCode::builder().param("a").param("b").build().unwrap());
        let f = rt.create_function(code, rt.global_env().clone());

        assert!(f.is_callable() && f.is_constructor());
        match f.get_own_property("length") {
            Some(PropertyDescriptor::Data { value, .. }) => assert_eq!(value.as_number(), Some(2.0)),
            other => panic!("unexpected {other:?}"),
        }
        let Some(PropertyDescriptor::Data { value: Value::Object(proto), .. }) =
            f.get_own_property("prototype")
        else {
            panic!("missing prototype");
        };
        match proto.get_own_property("constructor") {
            Some(PropertyDescriptor::Data { value: Value::Object(ctor), .. }) => {
                assert!(ctor.ptr_eq(&f))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_put_respects_read_only() {
        let mut rt = VmRuntime::new();
        let obj = JsObject::new(None);
        obj.define_own_property(
            JsString::from("ro"),
            PropertyDescriptor::data_with_attrs(Value::Number(1.0), PropertyAttributes::frozen()),
        );

        rt.put(&obj, JsString::from("ro"), Value::Number(2.0), false).unwrap();
        assert!(matches!(
            rt.put(&obj, JsString::from("ro"), Value::Number(2.0), true),
            Err(VmError::TypeError(_))
        ));
        assert_eq!(rt.get(&obj, &JsString::from("ro")).unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn test_put_through_setter() {
        let mut rt = VmRuntime::new();
        let sink = JsObject::new(None);
        let captured = sink.clone();
        let setter = JsObject::native_function(
            None,
            move |_, call| {
                captured.create_data_property("seen", call.args.get_or_undefined(0));
                Ok(Value::Undefined)
            },
            false,
        );
        let obj = JsObject::new(None);
        obj.define_accessor(JsString::from("p"), setter, false);

        rt.put(&obj, JsString::from("p"), Value::Number(7.0), true).unwrap();
        assert!(sink.has_own_property("seen"));
        assert!(obj.get_own_property("p").is_some_and(|p| p.is_accessor()));
    }

    #[test]
    fn test_call_depth_limit() {
        let mut rt = VmRuntime::with_config(VmConfig {
            max_call_depth: 4,
            ..VmConfig::default()
        });
        let recurse = JsObject::native_function(
            None,
            |rt, call| {
                let me = call.this.clone();
                rt.call_function(&me, call.this, ArgList::new(), None)
            },
            false,
        );
        let f = Value::Object(recurse);
        let err = rt.call_function(&f, f.clone(), ArgList::new(), None).unwrap_err();
        assert!(matches!(err, VmError::RangeError(_)));
    }

    #[test]
    fn test_thrown_value_materializes_errors() {
        let rt = VmRuntime::new();
        let value = rt.thrown_value(VmError::type_error("nope")).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.prototype().unwrap().ptr_eq(&rt.realm().type_error_prototype));
        assert!(rt.thrown_value(VmError::internal("boom")).is_err());
    }
}
