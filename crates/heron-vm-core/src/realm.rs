//! Realm: the global object and the intrinsics the core depends on
//!
//! This is deliberately small. It carries the prototypes needed to build
//! thrown errors and wrapper objects, the global value properties and the
//! global `eval` function.

use crate::context::FrameContext;
use crate::convert::to_string;
use crate::env::LexEnv;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, NativeCall, ObjectKind, PropertyAttributes, PropertyDescriptor};
use crate::runtime::VmRuntime;
use crate::string::{JsString, Magic};
use crate::value::Value;

/// Standard error constructors the engine throws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// `Error`
    Error,
    /// `TypeError`
    Type,
    /// `ReferenceError`
    Reference,
    /// `RangeError`
    Range,
    /// `SyntaxError`
    Syntax,
}

impl ErrorKind {
    /// Constructor name
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Type => "TypeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Syntax => "SyntaxError",
        }
    }
}

/// Global object, global environment and intrinsic prototypes
#[derive(Debug, Clone)]
pub struct Realm {
    /// The global object
    pub global_object: JsObject,
    /// Object environment over the global object
    pub global_env: LexEnv,
    /// `Object.prototype`
    pub object_prototype: JsObject,
    /// `Function.prototype`
    pub function_prototype: JsObject,
    /// `Boolean.prototype`
    pub boolean_prototype: JsObject,
    /// `Number.prototype`
    pub number_prototype: JsObject,
    /// `String.prototype`
    pub string_prototype: JsObject,
    /// `Error.prototype`
    pub error_prototype: JsObject,
    /// `TypeError.prototype`
    pub type_error_prototype: JsObject,
    /// `ReferenceError.prototype`
    pub reference_error_prototype: JsObject,
    /// `RangeError.prototype`
    pub range_error_prototype: JsObject,
    /// `SyntaxError.prototype`
    pub syntax_error_prototype: JsObject,
}

impl Realm {
    /// Build a fresh realm
    pub fn new() -> Self {
        let object_prototype = JsObject::new(None);
        let function_prototype = JsObject::native_function(
            Some(object_prototype.clone()),
            |_, _| Ok(Value::Undefined),
            false,
        );
        let native = |f: fn(&mut VmRuntime, NativeCall<'_>) -> VmResult<Value>| {
            JsObject::native_function(Some(function_prototype.clone()), f, false)
        };

        object_prototype.define_own_property(
            JsString::magic(Magic::ToString),
            PropertyDescriptor::data_with_attrs(
                Value::Object(native(object_to_string)),
                PropertyAttributes::hidden(),
            ),
        );
        object_prototype.define_own_property(
            JsString::magic(Magic::ValueOf),
            PropertyDescriptor::data_with_attrs(
                Value::Object(native(object_value_of)),
                PropertyAttributes::hidden(),
            ),
        );

        let wrapper_prototype = |primitive: Value| {
            let proto = JsObject::with_kind(
                Some(object_prototype.clone()),
                ObjectKind::PrimitiveWrapper(primitive),
            );
            proto.define_own_property(
                JsString::magic(Magic::ValueOf),
                PropertyDescriptor::data_with_attrs(
                    Value::Object(native(wrapper_value_of)),
                    PropertyAttributes::hidden(),
                ),
            );
            proto
        };
        let boolean_prototype = wrapper_prototype(Value::Boolean(false));
        let number_prototype = wrapper_prototype(Value::Number(0.0));
        let string_prototype = wrapper_prototype(Value::String(JsString::magic(Magic::Empty)));

        let error_prototype = new_error_prototype(Some(object_prototype.clone()), ErrorKind::Error);
        error_prototype.define_own_property(
            JsString::magic(Magic::ToString),
            PropertyDescriptor::data_with_attrs(
                Value::Object(native(error_to_string)),
                PropertyAttributes::hidden(),
            ),
        );
        let derived = |kind| new_error_prototype(Some(error_prototype.clone()), kind);

        let global_object = JsObject::new(Some(object_prototype.clone()));
        for (name, value) in [
            (Magic::Undefined, Value::Undefined),
            (Magic::NaN, Value::Number(f64::NAN)),
            (Magic::Infinity, Value::Number(f64::INFINITY)),
        ] {
            global_object.define_own_property(
                JsString::magic(name),
                PropertyDescriptor::data_with_attrs(value, PropertyAttributes::frozen()),
            );
        }
        global_object.define_own_property(
            JsString::magic(Magic::Eval),
            PropertyDescriptor::data_with_attrs(
                Value::Object(native(global_eval)),
                PropertyAttributes::hidden(),
            ),
        );
        let global_env = LexEnv::new_object(global_object.clone(), false, None);

        Self {
            type_error_prototype: derived(ErrorKind::Type),
            reference_error_prototype: derived(ErrorKind::Reference),
            range_error_prototype: derived(ErrorKind::Range),
            syntax_error_prototype: derived(ErrorKind::Syntax),
            global_object,
            global_env,
            object_prototype,
            function_prototype,
            boolean_prototype,
            number_prototype,
            string_prototype,
            error_prototype,
        }
    }

    /// Prototype for instances of `kind`
    pub fn error_prototype_for(&self, kind: ErrorKind) -> &JsObject {
        match kind {
            ErrorKind::Error => &self.error_prototype,
            ErrorKind::Type => &self.type_error_prototype,
            ErrorKind::Reference => &self.reference_error_prototype,
            ErrorKind::Range => &self.range_error_prototype,
            ErrorKind::Syntax => &self.syntax_error_prototype,
        }
    }

    /// Create an error instance carrying `message`
    pub fn create_error(&self, kind: ErrorKind, message: &str) -> JsObject {
        let error = JsObject::with_kind(
            Some(self.error_prototype_for(kind).clone()),
            ObjectKind::Error,
        );
        if !message.is_empty() {
            error.define_own_property(
                JsString::magic(Magic::Message),
                PropertyDescriptor::data_with_attrs(
                    Value::string(message),
                    PropertyAttributes::hidden(),
                ),
            );
        }
        error
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

fn new_error_prototype(parent: Option<JsObject>, kind: ErrorKind) -> JsObject {
    let proto = JsObject::new(parent);
    proto.define_own_property(
        JsString::magic(Magic::Name),
        PropertyDescriptor::data_with_attrs(Value::string(kind.name()), PropertyAttributes::hidden()),
    );
    proto.define_own_property(
        JsString::magic(Magic::Message),
        PropertyDescriptor::data_with_attrs(
            Value::String(JsString::magic(Magic::Empty)),
            PropertyAttributes::hidden(),
        ),
    );
    proto
}

// ==================== Natives ====================

/// `Object.prototype.toString` (ES5 15.2.4.2)
fn object_to_string(_rt: &mut VmRuntime, call: NativeCall<'_>) -> VmResult<Value> {
    let class = match &call.this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Boolean(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Arguments => "Arguments",
            ObjectKind::Error => "Error",
            ObjectKind::PrimitiveWrapper(Value::Boolean(_)) => "Boolean",
            ObjectKind::PrimitiveWrapper(Value::Number(_)) => "Number",
            ObjectKind::PrimitiveWrapper(_) => "String",
        },
    };
    Ok(Value::string(format!("[object {class}]")))
}

/// `Object.prototype.valueOf` (ES5 15.2.4.4)
fn object_value_of(rt: &mut VmRuntime, call: NativeCall<'_>) -> VmResult<Value> {
    crate::convert::to_object(rt, &call.this).map(Value::Object)
}

/// `valueOf` shared by the Boolean, Number and String prototypes
fn wrapper_value_of(_rt: &mut VmRuntime, call: NativeCall<'_>) -> VmResult<Value> {
    match &call.this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::PrimitiveWrapper(primitive) => Ok(primitive.clone()),
            _ => Err(VmError::type_error("valueOf called on incompatible receiver")),
        },
        Value::Boolean(_) | Value::Number(_) | Value::String(_) => Ok(call.this),
        _ => Err(VmError::type_error("valueOf called on incompatible receiver")),
    }
}

/// `Error.prototype.toString` (ES5 15.11.4.4)
fn error_to_string(rt: &mut VmRuntime, call: NativeCall<'_>) -> VmResult<Value> {
    let Value::Object(obj) = &call.this else {
        return Err(VmError::type_error("Error.prototype.toString called on non-object"));
    };
    let name = match rt.get(obj, &JsString::magic(Magic::Name))? {
        Value::Undefined => JsString::from("Error"),
        other => to_string(rt, &other)?,
    };
    let message = match rt.get(obj, &JsString::magic(Magic::Message))? {
        Value::Undefined => JsString::magic(Magic::Empty),
        other => to_string(rt, &other)?,
    };
    Ok(Value::String(match (name.is_empty(), message.is_empty()) {
        (true, _) => message,
        (_, true) => name,
        _ => JsString::from(format!("{name}: {message}")),
    }))
}

/// Global `eval` (ES5 15.1.2.1)
///
/// Runs as a direct eval only when the calling frame is in the middle of a
/// call in direct-eval form.
fn global_eval(rt: &mut VmRuntime, call: NativeCall<'_>) -> VmResult<Value> {
    let source = match call.args.get(0) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Ok(other.clone()),
        None => return Ok(Value::Undefined),
    };
    let caller = call
        .caller
        .filter(|frame| frame.is_direct_eval_form_call());
    let strict_caller = caller.is_some_and(FrameContext::is_strict);

    let code = rt.compile_eval(source.as_str(), strict_caller)?;
    rt.run_eval(code, caller.is_some(), caller)?.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_prototype_chain() {
        let realm = Realm::new();
        let err = realm.create_error(ErrorKind::Type, "bad");

        let proto = err.prototype().unwrap();
        assert!(proto.ptr_eq(&realm.type_error_prototype));
        assert!(proto.prototype().unwrap().ptr_eq(&realm.error_prototype));
        assert_eq!(Value::Object(err).describe(), "TypeError: bad");
    }

    #[test]
    fn test_global_value_properties() {
        let realm = Realm::new();
        let undefined = realm.global_object.get_own_property("undefined").unwrap();
        assert!(!undefined.is_configurable());
        assert!(realm.global_object.has_own_property("eval"));
        assert!(realm.global_env.binding_object().is_some());
    }

    #[test]
    fn test_function_prototype_is_callable() {
        let realm = Realm::new();
        assert!(realm.function_prototype.is_callable());
        assert!(!realm.function_prototype.is_constructor());
    }
}
