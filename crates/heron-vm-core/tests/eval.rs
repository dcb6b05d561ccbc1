//! Direct and indirect eval
//!
//! The installed eval compiler understands a handful of forms:
//!
//! - `var NAME` declares `NAME`
//! - `eval SRC` returns the result of a direct eval of `SRC`
//! - `call NAME` returns the result of calling `NAME` with no arguments
//! - `throw` throws the string `"boom"`
//! - anything else is read as an identifier and returned

use heron_vm_bytecode::{CompiledCode, Opcode};
use heron_vm_core::{
    CompletionCode, FrameContext, JsObject, PropertyDescriptor, Value, VmError, VmRuntime,
};
use tracing_subscriber::EnvFilter;

fn compile(source: &str, strict: bool) -> Result<CompiledCode, String> {
    let mut b = CompiledCode::builder().name("eval").strict(strict);
    if let Some(name) = source.strip_prefix("var ") {
        b.op_with(Opcode::VarDecl, name);
    } else if let Some(inner) = source.strip_prefix("eval ") {
        b.op_with(Opcode::PushCallee, "eval")
            .push_string(inner)
            .op_with(Opcode::CallEval, 1u8)
            .op(Opcode::Return);
    } else if let Some(name) = source.strip_prefix("call ") {
        b.op_with(Opcode::PushCallee, name)
            .op_with(Opcode::CallIdent, 0u8)
            .op(Opcode::Return);
    } else if source == "throw" {
        b.push_string("boom").op(Opcode::Throw);
    } else {
        b.op_with(Opcode::PushIdent, source).op(Opcode::Return);
    }
    b.build().map_err(|e| e.to_string())
}

fn runtime() -> VmRuntime {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let mut rt = VmRuntime::new();
    rt.set_eval_compiler(compile);
    rt
}

fn global(rt: &VmRuntime, name: &str) -> Value {
    match rt.global_object().get_own_property(name) {
        Some(PropertyDescriptor::Data { value, .. }) => value,
        other => panic!("no data property {name}: {other:?}"),
    }
}

/// Install `in_direct_eval()`, which reports whether its calling frame is in
/// the middle of a call in direct-eval form
fn install_flag_reader(rt: &VmRuntime) {
    let reader = JsObject::native_function(
        None,
        |_, call| {
            let flag = call.caller.is_some_and(FrameContext::is_direct_eval_form_call);
            Ok(Value::Boolean(flag))
        },
        false,
    );
    rt.global_object()
        .create_data_property("in_direct_eval", Value::Object(reader));
}

/// Install `attempt(src)`, which evals `src` on behalf of its caller and
/// returns whether that threw
fn install_attempt(rt: &VmRuntime) {
    let attempt = JsObject::native_function(
        None,
        |rt, call| {
            let global = rt.global_object().clone();
            let eval = rt.get(&global, &"eval".into())?;
            let threw = rt
                .call_function(&eval, Value::Undefined, call.args, call.caller)
                .is_err();
            Ok(Value::Boolean(threw))
        },
        false,
    );
    rt.global_object()
        .create_data_property("attempt", Value::Object(attempt));
}

/// A function with a local `x = 2` that evaluates `"x"` with `call_op`
fn local_reader(name: &str, call_op: Opcode) -> CompiledCode {
    let mut b = CompiledCode::builder().name(name);
    b.op_with(Opcode::VarDecl, "x")
        .op_with(Opcode::PushByte, 2u8)
        .op_with(Opcode::AssignDrop, "x")
        .op_with(Opcode::PushCallee, "eval")
        .push_string("x")
        .op_with(call_op, 1u8)
        .op(Opcode::Return);
    b.build().unwrap()
}

#[test]
fn test_direct_eval_sees_caller_scope() {
    let mut b = CompiledCode::builder();
    b.func_decl("direct", local_reader("direct", Opcode::CallEval))
        .func_decl("indirect", local_reader("indirect", Opcode::CallIdent))
        .op_with(Opcode::VarDecl, "x")
        .op_with(Opcode::PushByte, 1u8)
        .op_with(Opcode::AssignDrop, "x")
        .op_with(Opcode::PushCallee, "direct")
        .op_with(Opcode::CallIdent, 0u8)
        .op_with(Opcode::AssignDrop, "from_direct")
        .op_with(Opcode::PushCallee, "indirect")
        .op_with(Opcode::CallIdent, 0u8)
        .op_with(Opcode::AssignDrop, "from_indirect");

    let mut rt = runtime();
    rt.init(b.build().unwrap(), false);
    assert!(rt.run_global().unwrap().is_ok());

    assert_eq!(global(&rt, "from_direct").as_number(), Some(2.0));
    assert_eq!(global(&rt, "from_indirect").as_number(), Some(1.0));
}

#[test]
fn test_eval_declarations_are_deletable() {
    let mut b = CompiledCode::builder();
    b.op_with(Opcode::PushCallee, "eval")
        .push_string("var fresh")
        .op_with(Opcode::CallEval, 1u8)
        .op(Opcode::Pop)
        .op_with(Opcode::TypeOfIdent, "fresh")
        .op_with(Opcode::AssignDrop, "before")
        .op_with(Opcode::DeleteVar, "fresh")
        .op_with(Opcode::AssignDrop, "deleted");

    let mut rt = runtime();
    rt.init(b.build().unwrap(), false);
    assert!(rt.run_global().unwrap().is_ok());

    assert_eq!(
        global(&rt, "before").as_string().map(|s| s.as_str()),
        Some("undefined")
    );
    assert_eq!(global(&rt, "deleted").as_boolean(), Some(true));
    assert!(!rt.global_object().has_own_property("fresh"));
}

#[test]
fn test_eval_of_non_string_returns_argument() {
    let mut b = CompiledCode::builder();
    b.op_with(Opcode::PushCallee, "eval")
        .op_with(Opcode::PushByte, 42u8)
        .op_with(Opcode::CallEval, 1u8)
        .op_with(Opcode::AssignDrop, "r");

    let mut rt = VmRuntime::new();
    rt.init(b.build().unwrap(), false);
    assert!(rt.run_global().unwrap().is_ok());

    assert_eq!(global(&rt, "r").as_number(), Some(42.0));
}

#[test]
fn test_eval_without_compiler_is_syntax_error() {
    let mut b = CompiledCode::builder();
    b.op_with(Opcode::PushCallee, "eval")
        .push_string("x")
        .op_with(Opcode::CallEval, 1u8)
        .op(Opcode::Pop);

    let mut rt = VmRuntime::new();
    rt.init(b.build().unwrap(), false);
    let outcome = rt.run_global().unwrap();

    match outcome {
        CompletionCode::UnhandledException(Value::Object(err)) => {
            let proto = err.prototype().unwrap();
            assert!(proto.ptr_eq(&rt.realm().syntax_error_prototype));
        }
        other => panic!("expected a SyntaxError, got {other:?}"),
    }
}

#[test]
fn test_strict_direct_eval_keeps_declarations_local() {
    let mut b = CompiledCode::builder();
    b.op_with(Opcode::PushCallee, "eval")
        .push_string("var hidden")
        .op_with(Opcode::CallEval, 1u8)
        .op(Opcode::Pop)
        .op_with(Opcode::TypeOfIdent, "hidden")
        .op(Opcode::Return);

    let mut rt = runtime();
    rt.init(b.build().unwrap(), true);

    assert!(rt.run_global().unwrap().is_ok());
    assert!(!rt.global_object().has_own_property("hidden"));
}

#[test]
fn test_eval_falling_off_the_end_is_undefined() {
    let mut b = CompiledCode::builder();
    b.op_with(Opcode::PushCallee, "eval")
        .push_string("var declared")
        .op_with(Opcode::CallEval, 1u8)
        .op(Opcode::TypeOf)
        .op_with(Opcode::AssignDrop, "t");

    let mut rt = runtime();
    rt.init(b.build().unwrap(), false);
    assert!(rt.run_global().unwrap().is_ok());

    assert_eq!(global(&rt, "t").as_string().map(|s| s.as_str()), Some("undefined"));
    assert!(rt.global_object().has_own_property("declared"));
}

// ==================== Nested direct eval ====================

#[test]
fn test_nested_direct_eval_sees_each_callers_scope() {
    // function inner() { var x = 3; return eval("x") }
    let mut inner = CompiledCode::builder().name("inner");
    inner
        .op_with(Opcode::VarDecl, "x")
        .op_with(Opcode::PushByte, 3u8)
        .op_with(Opcode::AssignDrop, "x")
        .op_with(Opcode::PushCallee, "eval")
        .push_string("x")
        .op_with(Opcode::CallEval, 1u8)
        .op(Opcode::Return);

    let mut outer = CompiledCode::builder().name("outer");
    outer.op_with(Opcode::VarDecl, "x")
        .op_with(Opcode::PushByte, 2u8)
        .op_with(Opcode::AssignDrop, "x");
    for (source, target) in [
        ("eval x", "nested"),
        ("call inner", "from_inner"),
        ("call in_direct_eval", "eval_frame_flag"),
        ("x", "again"),
    ] {
        outer
            .op_with(Opcode::PushCallee, "eval")
            .push_string(source)
            .op_with(Opcode::CallEval, 1u8)
            .op_with(Opcode::AssignDrop, target);
    }
    outer
        .op_with(Opcode::PushCallee, "in_direct_eval")
        .op_with(Opcode::CallIdent, 0u8)
        .op_with(Opcode::AssignDrop, "outer_flag")
        .op(Opcode::ReturnUndefined);

    let mut b = CompiledCode::builder();
    b.func_decl("inner", inner.build().unwrap())
        .func_decl("outer", outer.build().unwrap())
        .op_with(Opcode::VarDecl, "x")
        .op_with(Opcode::PushByte, 1u8)
        .op_with(Opcode::AssignDrop, "x")
        .op_with(Opcode::PushCallee, "outer")
        .op_with(Opcode::CallIdent, 0u8)
        .op(Opcode::Pop);

    let mut rt = runtime();
    install_flag_reader(&rt);
    rt.init(b.build().unwrap(), false);
    assert!(rt.run_global().unwrap().is_ok());

    assert_eq!(global(&rt, "nested").as_number(), Some(2.0));
    assert_eq!(global(&rt, "from_inner").as_number(), Some(3.0));
    assert_eq!(global(&rt, "eval_frame_flag").as_boolean(), Some(false));
    assert_eq!(global(&rt, "again").as_number(), Some(2.0));
    assert_eq!(global(&rt, "outer_flag").as_boolean(), Some(false));
    assert_eq!(global(&rt, "x").as_number(), Some(1.0));
}

#[test]
fn test_direct_eval_flag_cleared_after_inner_throw() {
    // `attempt` is called in direct-eval form, so the eval it performs runs
    // in `guarded`'s scope and its throw unwinds through that call.
    let mut guarded = CompiledCode::builder().name("guarded");
    guarded
        .op_with(Opcode::VarDecl, "x")
        .op_with(Opcode::PushByte, 2u8)
        .op_with(Opcode::AssignDrop, "x")
        .op_with(Opcode::PushCallee, "attempt")
        .push_string("eval throw")
        .op_with(Opcode::CallEval, 1u8)
        .op_with(Opcode::AssignDrop, "threw")
        .op_with(Opcode::PushCallee, "in_direct_eval")
        .op_with(Opcode::CallIdent, 0u8)
        .op_with(Opcode::AssignDrop, "flag_after")
        .op_with(Opcode::PushCallee, "eval")
        .push_string("x")
        .op_with(Opcode::CallEval, 1u8)
        .op_with(Opcode::AssignDrop, "again")
        .op(Opcode::ReturnUndefined);

    let mut b = CompiledCode::builder();
    b.func_decl("guarded", guarded.build().unwrap())
        .op_with(Opcode::PushCallee, "guarded")
        .op_with(Opcode::CallIdent, 0u8)
        .op(Opcode::Pop);

    let mut rt = runtime();
    install_flag_reader(&rt);
    install_attempt(&rt);
    rt.init(b.build().unwrap(), false);
    assert!(rt.run_global().unwrap().is_ok());

    assert_eq!(global(&rt, "threw").as_boolean(), Some(true));
    assert_eq!(global(&rt, "flag_after").as_boolean(), Some(false));
    assert_eq!(global(&rt, "again").as_number(), Some(2.0));
}

#[test]
fn test_eval_throw_reaches_native_caller() {
    let mut rt = runtime();
    let global = rt.global_object().clone();
    let eval = rt.get(&global, &"eval".into()).unwrap();
    let args = [Value::string("throw")].into_iter().collect();

    match rt.call_function(&eval, Value::Undefined, args, None) {
        Err(VmError::Exception(thrown)) => {
            assert_eq!(thrown.value.as_string().map(|s| s.as_str()), Some("boom"))
        }
        other => panic!("expected the thrown string, got {other:?}"),
    }
}
