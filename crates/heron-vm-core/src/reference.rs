//! References (ES5 8.7)

use crate::convert::to_object;
use crate::env::LexEnv;
use crate::error::{VmError, VmResult};
use crate::object::PropertyDescriptor;
use crate::runtime::VmRuntime;
use crate::string::JsString;
use crate::value::Value;

/// Base component of a reference
#[derive(Debug, Clone)]
pub enum ReferenceBase {
    /// Name not found in any environment
    Unresolvable,
    /// Binding in an environment record
    Environment(LexEnv),
    /// Property of a value
    Value(Value),
}

/// A resolved name
#[derive(Debug, Clone)]
pub struct Reference {
    /// Base value
    pub base: ReferenceBase,
    /// Referenced name
    pub name: JsString,
    /// Produced by strict mode code
    pub strict: bool,
}

/// GetIdentifierReference (ES5 10.2.2.1), walking from `env` outwards
pub fn get_identifier_reference(env: Option<&LexEnv>, name: JsString, strict: bool) -> Reference {
    let base = match resolve_reference_base(env, &name) {
        Some(found) => ReferenceBase::Environment(found),
        None => ReferenceBase::Unresolvable,
    };
    Reference { base, name, strict }
}

/// The innermost environment on the chain from `env` that binds `name`
pub fn resolve_reference_base(env: Option<&LexEnv>, name: &str) -> Option<LexEnv> {
    let mut current = env;
    while let Some(e) = current {
        if e.has_binding(name) {
            return Some(e.clone());
        }
        current = e.outer();
    }
    None
}

impl Reference {
    /// Create a property reference
    pub fn property(base: Value, name: JsString, strict: bool) -> Self {
        Self {
            base: ReferenceBase::Value(base),
            name,
            strict,
        }
    }

    /// IsUnresolvableReference
    #[inline]
    pub fn is_unresolvable(&self) -> bool {
        matches!(self.base, ReferenceBase::Unresolvable)
    }

    /// IsPropertyReference
    #[inline]
    pub fn is_property_reference(&self) -> bool {
        matches!(self.base, ReferenceBase::Value(_))
    }

    /// Environment holding the binding, for environment references
    pub fn base_env(&self) -> Option<&LexEnv> {
        match &self.base {
            ReferenceBase::Environment(env) => Some(env),
            _ => None,
        }
    }

    /// GetValue (ES5 8.7.1)
    pub fn get_value(&self, rt: &mut VmRuntime) -> VmResult<Value> {
        match &self.base {
            ReferenceBase::Unresolvable => Err(VmError::reference_error(format!(
                "{} is not defined",
                self.name
            ))),
            ReferenceBase::Environment(env) => env.get_binding_value(rt, &self.name, self.strict),
            ReferenceBase::Value(Value::Object(obj)) => rt.get(obj, &self.name),
            ReferenceBase::Value(primitive) => {
                let wrapper = to_object(rt, primitive)?;
                rt.get_with_receiver(&wrapper, &self.name, primitive.clone())
            }
        }
    }

    /// PutValue (ES5 8.7.2)
    pub fn put_value(&self, rt: &mut VmRuntime, value: Value) -> VmResult<()> {
        match &self.base {
            ReferenceBase::Unresolvable if self.strict => Err(VmError::reference_error(format!(
                "{} is not defined",
                self.name
            ))),
            ReferenceBase::Unresolvable => {
                let global = rt.global_object().clone();
                rt.put(&global, self.name.clone(), value, false)
            }
            ReferenceBase::Environment(env) => {
                env.set_mutable_binding(rt, &self.name, value, self.strict)
            }
            ReferenceBase::Value(Value::Object(obj)) => {
                rt.put(obj, self.name.clone(), value, self.strict)
            }
            ReferenceBase::Value(primitive) => self.put_on_primitive(rt, primitive, value),
        }
    }

    // Writes to a primitive base only ever reach an inherited setter; any
    // other outcome would land on a throwaway wrapper.
    fn put_on_primitive(&self, rt: &mut VmRuntime, base: &Value, value: Value) -> VmResult<()> {
        let wrapper = to_object(rt, base)?;
        if let Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) =
            wrapper.get_property(&self.name)
        {
            rt.call_function(&Value::Object(setter), base.clone(), [value].into_iter().collect(), None)?;
            return Ok(());
        }
        if self.strict {
            return Err(VmError::type_error(format!(
                "Cannot create property '{}' on primitive",
                self.name
            )));
        }
        Ok(())
    }
}
