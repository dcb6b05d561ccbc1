//! Opcode handlers
//!
//! Handlers receive operands already resolved by the dispatch loop and
//! return a [`Completion`]. A throw from any sub-step leaves through `?`
//! before later steps run; values owned by the handler (argument lists,
//! this-values, temporary references) are released by drop on every path.

use std::sync::Arc;

use heron_vm_bytecode::CompiledCode;

use crate::collection::ArgList;
use crate::completion::Completion;
use crate::context::FrameContext;
use crate::convert::{check_object_coercible, to_object, to_string};
use crate::env::LexEnv;
use crate::error::{VmError, VmResult};
use crate::object::{PropertyAttributes, PropertyDescriptor};
use crate::reference::{Reference, get_identifier_reference};
use crate::runtime::VmRuntime;
use crate::string::{JsString, Magic};
use crate::value::Value;

/// Where a call takes its this-value from
#[derive(Debug, Clone)]
pub enum ThisSource {
    /// Receiver of a property call
    Explicit(Value),
    /// Environment the callee identifier was resolved in
    Reference(Option<LexEnv>),
    /// Plain call; this is undefined
    None,
}

// ==================== Declarations ====================

/// Function declaration instantiation (ES5 10.5 step 5)
pub fn func_decl(
    rt: &mut VmRuntime,
    frame: &FrameContext,
    name: JsString,
    code: Arc<CompiledCode>,
) -> VmResult<Completion> {
    let env = frame.lex_env().clone();
    let configurable = frame.is_eval_code();
    let function = rt.create_function(code, env.clone());

    if !env.has_binding(&name) {
        env.create_mutable_binding(name.clone(), configurable)?;
    } else if env.ptr_eq(rt.global_env()) {
        let global = rt.global_object().clone();
        match global.get_property(&name) {
            Some(existing) if existing.is_configurable() => global.define_own_property(
                name.clone(),
                PropertyDescriptor::data_with_attrs(
                    Value::Undefined,
                    PropertyAttributes {
                        writable: true,
                        enumerable: true,
                        configurable,
                    },
                ),
            ),
            Some(PropertyDescriptor::Accessor { .. }) => {
                return Err(VmError::type_error(format!(
                    "Cannot redeclare accessor '{name}' as a function"
                )));
            }
            Some(PropertyDescriptor::Data { attributes, .. })
                if !(attributes.writable && attributes.enumerable) =>
            {
                return Err(VmError::type_error(format!(
                    "Cannot redeclare read-only '{name}' as a function"
                )));
            }
            _ => {}
        }
    }

    env.set_mutable_binding(rt, &name, Value::Object(function), frame.is_strict())?;
    Ok(Completion::Empty)
}

/// Variable declaration instantiation (ES5 10.5 step 8)
///
/// An existing binding is left untouched.
pub fn var_decl(rt: &mut VmRuntime, frame: &FrameContext, name: JsString) -> VmResult<Completion> {
    let env = frame.lex_env();
    if !env.has_binding(&name) {
        env.create_mutable_binding(name.clone(), frame.is_eval_code())?;
        debug_assert!(
            env.get_binding_value(rt, &name, false)
                .is_ok_and(|v| v.is_undefined()),
            "new binding '{name}' is not undefined"
        );
    }
    Ok(Completion::Empty)
}

// ==================== Calls ====================

/// Function call (ES5 11.2.3)
///
/// `args` are already in source order. When `direct_eval` is set the
/// caller frame is marked for the duration of the invocation so the global
/// `eval` can tell a direct call from an indirect one.
pub fn call(
    rt: &mut VmRuntime,
    frame: &mut FrameContext,
    callee: Value,
    this: ThisSource,
    args: ArgList,
    direct_eval: bool,
) -> VmResult<Completion> {
    if !callee.is_callable() {
        return Err(VmError::type_error(format!(
            "{} is not a function",
            callee.describe()
        )));
    }

    let this = match this {
        ThisSource::Explicit(value) => value,
        ThisSource::Reference(Some(env)) => env.implicit_this_value()?,
        ThisSource::Reference(None) | ThisSource::None => Value::Undefined,
    };

    let result = if direct_eval {
        frame.begin_direct_eval_call();
        let result = rt.call_function(&callee, this, args, Some(&*frame));
        frame.end_direct_eval_call();
        result
    } else {
        rt.call_function(&callee, this, args, Some(&*frame))
    };
    Ok(Completion::Normal(result?))
}

/// `new` operator (ES5 11.2.2)
pub fn construct(
    rt: &mut VmRuntime,
    frame: &FrameContext,
    ctor: Value,
    args: ArgList,
) -> VmResult<Completion> {
    debug_assert!(!frame.is_direct_eval_form_call());
    if !ctor.is_constructor() {
        return Err(VmError::type_error(format!(
            "{} is not a constructor",
            ctor.describe()
        )));
    }
    Ok(Completion::Normal(rt.construct(&ctor, args, Some(frame))?))
}

// ==================== Identifiers ====================

/// Identifier read (ES5 11.1.2 followed by GetValue)
pub fn push_ident(rt: &mut VmRuntime, frame: &FrameContext, name: JsString) -> VmResult<Completion> {
    let reference = get_identifier_reference(Some(frame.lex_env()), name, frame.is_strict());
    Ok(Completion::Normal(reference.get_value(rt)?))
}

/// Identifier read for a call; remembers the base for the implicit this
pub fn push_callee(rt: &mut VmRuntime, frame: &mut FrameContext, name: JsString) -> VmResult<Completion> {
    let reference = get_identifier_reference(Some(frame.lex_env()), name, frame.is_strict());
    let value = reference.get_value(rt)?;
    frame.push_callee_base(reference.base_env().cloned());
    Ok(Completion::Normal(value))
}

/// Simple assignment to an identifier (ES5 11.13.1)
pub fn assignment(
    rt: &mut VmRuntime,
    frame: &FrameContext,
    name: JsString,
    value: Value,
) -> VmResult<Completion> {
    set_variable_value(rt, frame, name, value.clone())?;
    Ok(Completion::Normal(value))
}

/// Resolve `name` in the current environment and PutValue into it
pub fn set_variable_value(
    rt: &mut VmRuntime,
    frame: &FrameContext,
    name: JsString,
    value: Value,
) -> VmResult<()> {
    get_identifier_reference(Some(frame.lex_env()), name, frame.is_strict()).put_value(rt, value)
}

// ==================== Unary operators ====================

/// Logical NOT (ES5 11.4.9)
pub fn logical_not(value: &Value) -> Completion {
    Completion::boolean(!value.to_boolean())
}

/// `typeof` on a value (ES5 11.4.3)
pub fn type_of(value: &Value) -> Completion {
    Completion::Normal(Value::String(value.type_of()))
}

/// `typeof` on an identifier; unresolvable names are "undefined"
pub fn typeof_ident(rt: &mut VmRuntime, frame: &FrameContext, name: JsString) -> VmResult<Completion> {
    let reference = get_identifier_reference(Some(frame.lex_env()), name, frame.is_strict());
    if reference.is_unresolvable() {
        return Ok(Completion::Normal(Value::String(JsString::magic(Magic::Undefined))));
    }
    Ok(type_of(&reference.get_value(rt)?))
}

// ==================== Object literals and properties ====================

/// Property read (ES5 11.2.1)
pub fn get_prop(
    rt: &mut VmRuntime,
    frame: &FrameContext,
    base: Value,
    key: Value,
) -> VmResult<Completion> {
    check_object_coercible(&base)?;
    let name = to_string(rt, &key)?;
    let value = Reference::property(base, name, frame.is_strict()).get_value(rt)?;
    Ok(Completion::Normal(value))
}

/// Data property of an object literal (ES5 11.1.5)
pub fn init_prop(object: &Value, name: JsString, value: Value) -> VmResult<()> {
    let Value::Object(obj) = object else {
        return Err(VmError::internal("property initializer without an object"));
    };
    obj.define_own_property(name, PropertyDescriptor::data(value));
    Ok(())
}

/// Getter or setter of an object literal (ES5 11.1.5)
///
/// A non-accessor property of the same name is replaced; an accessor keeps
/// the side that is not being defined.
pub fn set_accessor(object: &Value, name: JsString, accessor: Value, is_getter: bool) -> VmResult<()> {
    let (Value::Object(obj), Value::Object(func)) = (object, accessor) else {
        return Err(VmError::internal(
            "accessor definition needs an object and a function",
        ));
    };
    debug_assert!(func.is_callable());
    obj.define_accessor(name, func, is_getter);
    Ok(())
}

// ==================== Delete ====================

/// `delete base[key]` (ES5 11.4.1 with a property reference)
pub fn delete_prop(
    rt: &mut VmRuntime,
    frame: &FrameContext,
    base: Value,
    key: Value,
) -> VmResult<Completion> {
    if base.is_undefined() {
        debug_assert!(!frame.is_strict(), "undefined base in strict delete");
        return Ok(Completion::boolean(true));
    }
    check_object_coercible(&base)?;
    let name = to_string(rt, &key)?;
    let obj = to_object(rt, &base)?;
    Ok(Completion::boolean(obj.delete(&name, frame.is_strict())?))
}

/// `delete name` (ES5 11.4.1 with an environment reference)
pub fn delete_var(frame: &FrameContext, name: JsString) -> VmResult<Completion> {
    debug_assert!(!frame.is_strict(), "delete of an identifier in strict code");
    let reference = get_identifier_reference(Some(frame.lex_env()), name, false);
    match reference.base_env() {
        None => Ok(Completion::boolean(true)),
        Some(env) => Ok(Completion::boolean(env.delete_binding(&reference.name)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunFlags;
    use crate::object::JsObject;
    use proptest::prelude::*;

    fn global_frame(rt: &VmRuntime, flags: RunFlags) -> FrameContext {
        let code = Arc::new(CompiledCode::builder().build().unwrap());
        FrameContext::new(
            code,
            0,
            rt.global_env().clone(),
            Value::Object(rt.global_object().clone()),
            flags,
        )
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Undefined),
            Just(Value::Null),
            any::<bool>().prop_map(Value::Boolean),
            any::<f64>().prop_map(Value::Number),
            ".{0,8}".prop_map(|s: String| Value::string(s)),
            Just(Value::Object(JsObject::new(None))),
            Just(Value::Object(JsObject::native_function(
                None,
                |_, _| Ok(Value::Undefined),
                false
            ))),
        ]
    }

    #[test]
    fn test_var_decl_keeps_existing_value() {
        let mut rt = VmRuntime::new();
        let frame = global_frame(&rt, RunFlags::default());
        let x = JsString::from("x");

        var_decl(&mut rt, &frame, x.clone()).unwrap();
        assignment(&mut rt, &frame, x.clone(), Value::Number(5.0)).unwrap();
        var_decl(&mut rt, &frame, x.clone()).unwrap();

        let value = push_ident(&mut rt, &frame, x).unwrap().into_result().unwrap();
        assert_eq!(value.as_number(), Some(5.0));
    }

    #[test]
    fn test_var_decl_configurable_only_in_eval() {
        let mut rt = VmRuntime::new();
        let plain = global_frame(&rt, RunFlags::default());
        let eval = global_frame(&rt, RunFlags { strict: false, eval_code: true });

        var_decl(&mut rt, &plain, JsString::from("a")).unwrap();
        var_decl(&mut rt, &eval, JsString::from("b")).unwrap();

        let global = rt.global_object();
        assert!(!global.get_own_property("a").unwrap().is_configurable());
        assert!(global.get_own_property("b").unwrap().is_configurable());
    }

    #[test]
    fn test_call_non_callable() {
        let mut rt = VmRuntime::new();
        let mut frame = global_frame(&rt, RunFlags::default());
        let err = call(&mut rt, &mut frame, Value::Number(1.0), ThisSource::None, ArgList::new(), false)
            .unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_call_clears_direct_eval_flag_on_throw() {
        let mut rt = VmRuntime::new();
        let mut frame = global_frame(&rt, RunFlags::default());
        let thrower = JsObject::native_function(
            None,
            |_, call| {
                assert!(call.caller.is_some_and(FrameContext::is_direct_eval_form_call));
                Err(VmError::type_error("inside"))
            },
            false,
        );
        let result = call(
            &mut rt,
            &mut frame,
            Value::Object(thrower),
            ThisSource::None,
            ArgList::new(),
            true,
        );
        assert!(result.is_err());
        assert!(!frame.is_direct_eval_form_call());
    }

    #[test]
    fn test_implicit_this_from_object_environment() {
        let mut rt = VmRuntime::new();
        let mut frame = global_frame(&rt, RunFlags::default());
        let scope = JsObject::new(None);
        let env = LexEnv::new_object(scope.clone(), true, None);
        let echo = JsObject::native_function(None, |_, call| Ok(call.this), false);

        let this = call(
            &mut rt,
            &mut frame,
            Value::Object(echo),
            ThisSource::Reference(Some(env)),
            ArgList::new(),
            false,
        )
        .unwrap()
        .into_result()
        .unwrap();
        assert!(this.as_object().is_some_and(|o| o.ptr_eq(&scope)));
    }

    #[test]
    fn test_typeof_ident_unresolvable() {
        let mut rt = VmRuntime::new();
        let frame = global_frame(&rt, RunFlags { strict: true, eval_code: false });
        let result = typeof_ident(&mut rt, &frame, JsString::from("nowhere")).unwrap();
        assert_eq!(result.value().and_then(Value::as_string).map(|s| s.as_str()), Some("undefined"));
    }

    #[test]
    fn test_delete_var() {
        let mut rt = VmRuntime::new();
        let eval = global_frame(&rt, RunFlags { strict: false, eval_code: true });
        let plain = global_frame(&rt, RunFlags::default());

        var_decl(&mut rt, &eval, JsString::from("temp")).unwrap();
        var_decl(&mut rt, &plain, JsString::from("kept")).unwrap();

        let deleted = delete_var(&plain, JsString::from("temp")).unwrap();
        assert_eq!(deleted.value().and_then(Value::as_boolean), Some(true));
        assert!(!rt.global_object().has_own_property("temp"));

        let refused = delete_var(&plain, JsString::from("kept")).unwrap();
        assert_eq!(refused.value().and_then(Value::as_boolean), Some(false));

        let missing = delete_var(&plain, JsString::from("never")).unwrap();
        assert_eq!(missing.value().and_then(Value::as_boolean), Some(true));
    }

    #[test]
    fn test_delete_prop_strictness() {
        let mut rt = VmRuntime::new();
        let strict = global_frame(&rt, RunFlags { strict: true, eval_code: false });
        let sloppy = global_frame(&rt, RunFlags::default());
        let key = Value::string("length");

        let sloppy_result = delete_prop(&mut rt, &sloppy, Value::string("abc"), key.clone()).unwrap();
        assert_eq!(sloppy_result.value().and_then(Value::as_boolean), Some(false));
        assert!(matches!(
            delete_prop(&mut rt, &strict, Value::string("abc"), key),
            Err(VmError::TypeError(_))
        ));
        assert!(matches!(
            delete_prop(&mut rt, &sloppy, Value::Null, Value::string("x")),
            Err(VmError::TypeError(_))
        ));
    }

    #[test]
    fn test_set_accessor_requires_objects() {
        let obj = Value::Object(JsObject::new(None));
        assert!(matches!(
            set_accessor(&obj, JsString::from("p"), Value::Number(1.0), true),
            Err(VmError::Internal(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_typeof_is_interned_and_stable(v in value_strategy()) {
            let a = type_of(&v).into_value().unwrap();
            let b = type_of(&v).into_value().unwrap();
            let (a, b) = (a.as_string().unwrap(), b.as_string().unwrap());
            prop_assert!(a.ptr_eq(b));
            prop_assert!(
                ["undefined", "object", "boolean", "number", "string", "function"]
                    .contains(&a.as_str())
            );
        }

        #[test]
        fn prop_double_not_is_to_boolean(v in value_strategy()) {
            let once = logical_not(&v).into_value().unwrap();
            let twice = logical_not(&once).into_value().unwrap();
            prop_assert_eq!(twice.as_boolean(), Some(v.to_boolean()));
        }
    }
}
