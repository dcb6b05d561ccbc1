//! Lexical environments (ES5 10.2)
//!
//! An environment is a record plus an optional outer environment. The
//! declarative record keeps its own bindings; the object record exposes the
//! properties of a binding object (the global object, `with` targets).

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

use crate::error::{VmError, VmResult};
use crate::object::{JsObject, PropertyAttributes, PropertyDescriptor};
use crate::runtime::VmRuntime;
use crate::string::JsString;
use crate::value::Value;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
    deletable: bool,
}

enum EnvRecord {
    Declarative(RwLock<IndexMap<JsString, Binding, FxBuildHasher>>),
    Object {
        bindings: JsObject,
        provide_this: bool,
    },
}

struct EnvData {
    record: EnvRecord,
    outer: Option<LexEnv>,
}

/// A lexical environment handle
#[derive(Clone)]
pub struct LexEnv(Arc<EnvData>);

impl LexEnv {
    /// NewDeclarativeEnvironment (ES5 10.2.2.2)
    pub fn new_declarative(outer: Option<LexEnv>) -> Self {
        Self(Arc::new(EnvData {
            record: EnvRecord::Declarative(RwLock::new(IndexMap::default())),
            outer,
        }))
    }

    /// NewObjectEnvironment (ES5 10.2.2.3)
    pub fn new_object(bindings: JsObject, provide_this: bool, outer: Option<LexEnv>) -> Self {
        Self(Arc::new(EnvData {
            record: EnvRecord::Object {
                bindings,
                provide_this,
            },
            outer,
        }))
    }

    /// Outer environment
    pub fn outer(&self) -> Option<&LexEnv> {
        self.0.outer.as_ref()
    }

    /// Check for a declarative record
    pub fn is_declarative(&self) -> bool {
        matches!(self.0.record, EnvRecord::Declarative(_))
    }

    /// Binding object of an object record
    pub fn binding_object(&self) -> Option<&JsObject> {
        match &self.0.record {
            EnvRecord::Object { bindings, .. } => Some(bindings),
            EnvRecord::Declarative(_) => None,
        }
    }

    /// HasBinding
    pub fn has_binding(&self, name: &str) -> bool {
        match &self.0.record {
            EnvRecord::Declarative(map) => map.read().contains_key(name),
            EnvRecord::Object { bindings, .. } => bindings.has_property(name),
        }
    }

    /// CreateMutableBinding; the new binding holds undefined
    pub fn create_mutable_binding(&self, name: JsString, deletable: bool) -> VmResult<()> {
        match &self.0.record {
            EnvRecord::Declarative(map) => {
                let mut map = map.write();
                debug_assert!(!map.contains_key(&name), "binding already exists");
                map.insert(
                    name,
                    Binding {
                        value: Value::Undefined,
                        mutable: true,
                        deletable,
                    },
                );
                Ok(())
            }
            EnvRecord::Object { bindings, .. } => {
                if !bindings.is_extensible() {
                    return Err(VmError::type_error(format!(
                        "Cannot define variable '{name}' on a non-extensible object"
                    )));
                }
                bindings.define_own_property(
                    name,
                    PropertyDescriptor::data_with_attrs(
                        Value::Undefined,
                        PropertyAttributes {
                            writable: true,
                            enumerable: true,
                            configurable: deletable,
                        },
                    ),
                );
                Ok(())
            }
        }
    }

    /// CreateImmutableBinding and InitializeImmutableBinding in one step
    ///
    /// Only declarative records hold immutable bindings.
    pub fn create_immutable_binding(&self, name: JsString, value: Value) -> VmResult<()> {
        match &self.0.record {
            EnvRecord::Declarative(map) => {
                map.write().insert(
                    name,
                    Binding {
                        value,
                        mutable: false,
                        deletable: false,
                    },
                );
                Ok(())
            }
            EnvRecord::Object { .. } => Err(VmError::internal(
                "immutable binding requested on an object environment",
            )),
        }
    }

    /// SetMutableBinding
    pub fn set_mutable_binding(
        &self,
        rt: &mut VmRuntime,
        name: &JsString,
        value: Value,
        strict: bool,
    ) -> VmResult<()> {
        match &self.0.record {
            EnvRecord::Declarative(map) => {
                let mut map = map.write();
                let binding = map
                    .get_mut(name)
                    .ok_or_else(|| VmError::internal(format!("missing binding '{name}'")))?;
                if binding.mutable {
                    binding.value = value;
                } else if strict {
                    return Err(VmError::type_error(format!(
                        "Assignment to constant binding '{name}'"
                    )));
                }
                Ok(())
            }
            EnvRecord::Object { bindings, .. } => {
                let bindings = bindings.clone();
                rt.put(&bindings, name.clone(), value, strict)
            }
        }
    }

    /// GetBindingValue
    pub fn get_binding_value(
        &self,
        rt: &mut VmRuntime,
        name: &JsString,
        strict: bool,
    ) -> VmResult<Value> {
        match &self.0.record {
            EnvRecord::Declarative(map) => map
                .read()
                .get(name)
                .map(|b| b.value.clone())
                .ok_or_else(|| VmError::internal(format!("missing binding '{name}'"))),
            EnvRecord::Object { bindings, .. } => {
                if !bindings.has_property(name) {
                    return if strict {
                        Err(VmError::reference_error(format!("{name} is not defined")))
                    } else {
                        Ok(Value::Undefined)
                    };
                }
                let bindings = bindings.clone();
                rt.get(&bindings, name)
            }
        }
    }

    /// DeleteBinding
    pub fn delete_binding(&self, name: &str) -> VmResult<bool> {
        match &self.0.record {
            EnvRecord::Declarative(map) => {
                let mut map = map.write();
                if map.get(name).is_some_and(|b| !b.deletable) {
                    return Ok(false);
                }
                map.shift_remove(name);
                Ok(true)
            }
            EnvRecord::Object { bindings, .. } => bindings.delete(name, false),
        }
    }

    /// ImplicitThisValue
    ///
    /// The call protocol lets this step throw and abort the call before
    /// invocation, so it returns a `VmResult`. The declarative and object
    /// records here always succeed.
    pub fn implicit_this_value(&self) -> VmResult<Value> {
        match &self.0.record {
            EnvRecord::Object {
                bindings,
                provide_this: true,
            } => Ok(Value::Object(bindings.clone())),
            _ => Ok(Value::Undefined),
        }
    }

    /// Do both handles refer to the same environment
    #[inline]
    pub fn ptr_eq(&self, other: &LexEnv) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for LexEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_declarative() {
            "declarative"
        } else {
            "object"
        };
        f.debug_struct("LexEnv")
            .field("record", &kind)
            .field("has_outer", &self.0.outer.is_some())
            .finish()
    }
}
