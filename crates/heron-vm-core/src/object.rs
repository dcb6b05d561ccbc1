//! JavaScript objects
//!
//! Objects are shared handles (`Arc`) over a property table kept in
//! insertion order. Only the structural internal methods live here; the
//! ones that may run script code ([[Get]] and [[Put]] through accessors,
//! [[DefaultValue]]) are on [`VmRuntime`](crate::runtime::VmRuntime).

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

use heron_vm_bytecode::CompiledCode;

use crate::collection::ArgList;
use crate::context::FrameContext;
use crate::env::LexEnv;
use crate::error::{VmError, VmResult};
use crate::runtime::VmRuntime;
use crate::string::JsString;
use crate::value::Value;

/// Property key; ES5 keys are always strings
pub type PropertyKey = JsString;

type PropertyMap = IndexMap<PropertyKey, PropertyDescriptor, FxBuildHasher>;

/// Property attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAttributes {
    /// Property is writable (ignored for accessors)
    pub writable: bool,
    /// Property is enumerable
    pub enumerable: bool,
    /// Property is configurable
    pub configurable: bool,
}

impl PropertyAttributes {
    /// Default data property attributes
    pub const fn data() -> Self {
        Self {
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable and configurable, but hidden from enumeration
    pub const fn hidden() -> Self {
        Self {
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Non-writable, non-enumerable, non-configurable
    pub const fn frozen() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }
}

/// Property descriptor
#[derive(Clone, Debug)]
pub enum PropertyDescriptor {
    /// Data property
    Data {
        /// The value
        value: Value,
        /// Attributes
        attributes: PropertyAttributes,
    },
    /// Accessor property
    Accessor {
        /// Getter function
        get: Option<JsObject>,
        /// Setter function
        set: Option<JsObject>,
        /// Attributes
        attributes: PropertyAttributes,
    },
}

impl PropertyDescriptor {
    /// Create a data property with default attributes
    pub fn data(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::data(),
        }
    }

    /// Create a data property with specific attributes
    pub fn data_with_attrs(value: Value, attributes: PropertyAttributes) -> Self {
        Self::Data { value, attributes }
    }

    /// Get the attributes
    pub fn attributes(&self) -> PropertyAttributes {
        match self {
            Self::Data { attributes, .. } | Self::Accessor { attributes, .. } => *attributes,
        }
    }

    /// Check if this is an accessor property
    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Check if configurable
    pub fn is_configurable(&self) -> bool {
        self.attributes().configurable
    }
}

/// Native function signature
///
/// `caller` is the frame that executed the call instruction, absent when
/// the embedder calls in directly.
pub type NativeFn = Arc<dyn Fn(&mut VmRuntime, NativeCall<'_>) -> VmResult<Value> + Send + Sync>;

/// Arguments handed to a native function
pub struct NativeCall<'a> {
    /// The this-value
    pub this: Value,
    /// Call arguments
    pub args: ArgList,
    /// Calling frame
    pub caller: Option<&'a FrameContext>,
    /// Invoked through [[Construct]]
    pub is_construct: bool,
}

/// Callable behaviour of a function object
#[derive(Clone)]
pub enum FunctionKind {
    /// Compiled script function closing over `scope`
    Script {
        /// Function body
        code: Arc<CompiledCode>,
        /// Environment the function was created in
        scope: LexEnv,
    },
    /// Host function
    Native {
        /// Implementation
        func: NativeFn,
        /// Has [[Construct]]
        constructor: bool,
    },
}

/// What kind of object this is
#[derive(Clone)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Function object
    Function(FunctionKind),
    /// `arguments` object
    Arguments,
    /// Error instance
    Error,
    /// Boolean, Number or String wrapper
    PrimitiveWrapper(Value),
}

struct ObjectState {
    properties: PropertyMap,
    prototype: Option<JsObject>,
    extensible: bool,
}

struct ObjectData {
    state: RwLock<ObjectState>,
    kind: ObjectKind,
}

/// A JavaScript object handle
#[derive(Clone)]
pub struct JsObject(Arc<ObjectData>);

impl JsObject {
    /// Create an ordinary object
    pub fn new(prototype: Option<JsObject>) -> Self {
        Self::with_kind(prototype, ObjectKind::Ordinary)
    }

    /// Create an object of the given kind
    pub fn with_kind(prototype: Option<JsObject>, kind: ObjectKind) -> Self {
        Self(Arc::new(ObjectData {
            state: RwLock::new(ObjectState {
                properties: PropertyMap::default(),
                prototype,
                extensible: true,
            }),
            kind,
        }))
    }

    /// Create a native function object
    pub fn native_function(
        prototype: Option<JsObject>,
        func: impl Fn(&mut VmRuntime, NativeCall<'_>) -> VmResult<Value> + Send + Sync + 'static,
        constructor: bool,
    ) -> Self {
        Self::with_kind(
            prototype,
            ObjectKind::Function(FunctionKind::Native {
                func: Arc::new(func),
                constructor,
            }),
        )
    }

    /// Object kind
    #[inline]
    pub fn kind(&self) -> &ObjectKind {
        &self.0.kind
    }

    /// Function behaviour, if this is a function object
    pub fn function_kind(&self) -> Option<&FunctionKind> {
        match &self.0.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Has [[Call]]
    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Function(_))
    }

    /// Has [[Construct]]
    pub fn is_constructor(&self) -> bool {
        match &self.0.kind {
            ObjectKind::Function(FunctionKind::Script { .. }) => true,
            ObjectKind::Function(FunctionKind::Native { constructor, .. }) => *constructor,
            _ => false,
        }
    }

    /// [[Prototype]]
    pub fn prototype(&self) -> Option<JsObject> {
        self.0.state.read().prototype.clone()
    }

    /// Replace [[Prototype]]
    pub fn set_prototype(&self, prototype: Option<JsObject>) {
        self.0.state.write().prototype = prototype;
    }

    /// [[Extensible]]
    pub fn is_extensible(&self) -> bool {
        self.0.state.read().extensible
    }

    /// Clear [[Extensible]]
    pub fn prevent_extensions(&self) {
        self.0.state.write().extensible = false;
    }

    /// [[GetOwnProperty]] (ES5 8.12.1)
    pub fn get_own_property(&self, key: &str) -> Option<PropertyDescriptor> {
        self.0.state.read().properties.get(key).cloned()
    }

    /// [[GetProperty]] (ES5 8.12.2), walking the prototype chain
    pub fn get_property(&self, key: &str) -> Option<PropertyDescriptor> {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            let state = obj.0.state.read();
            if let Some(prop) = state.properties.get(key) {
                return Some(prop.clone());
            }
            current = state.prototype.clone();
        }
        None
    }

    /// Check for an own property
    pub fn has_own_property(&self, key: &str) -> bool {
        self.0.state.read().properties.contains_key(key)
    }

    /// [[HasProperty]] (ES5 8.12.6)
    pub fn has_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }

    /// Install or replace an own property without any checks
    pub fn define_own_property(&self, key: PropertyKey, desc: PropertyDescriptor) {
        self.0.state.write().properties.insert(key, desc);
    }

    /// Install an own data property with default attributes
    pub fn create_data_property(&self, key: impl Into<PropertyKey>, value: Value) {
        self.define_own_property(key.into(), PropertyDescriptor::data(value));
    }

    /// Overwrite the value of an own data property
    ///
    /// Returns false when there is no such own data property.
    pub fn set_own_value(&self, key: &str, value: Value) -> bool {
        match self.0.state.write().properties.get_mut(key) {
            Some(PropertyDescriptor::Data { value: slot, .. }) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Remove an own property regardless of its attributes
    pub fn remove_own_property(&self, key: &str) -> Option<PropertyDescriptor> {
        self.0.state.write().properties.shift_remove(key)
    }

    /// [[Delete]] (ES5 8.12.7)
    pub fn delete(&self, key: &str, throw: bool) -> VmResult<bool> {
        let mut state = self.0.state.write();
        let configurable = match state.properties.get(key) {
            None => return Ok(true),
            Some(prop) => prop.is_configurable(),
        };
        if configurable {
            state.properties.shift_remove(key);
            Ok(true)
        } else if throw {
            Err(VmError::type_error(format!("Cannot delete property '{key}'")))
        } else {
            Ok(false)
        }
    }

    /// Define one side of an accessor property
    ///
    /// An existing accessor keeps its other side. Anything else under `key`
    /// is replaced by a fresh enumerable, configurable accessor.
    pub fn define_accessor(&self, key: PropertyKey, accessor: JsObject, is_getter: bool) {
        let mut state = self.0.state.write();
        if let Some(PropertyDescriptor::Accessor { get, set, .. }) = state.properties.get_mut(&key) {
            if is_getter {
                *get = Some(accessor);
            } else {
                *set = Some(accessor);
            }
            return;
        }

        state.properties.shift_remove(&key);
        let (get, set) = if is_getter {
            (Some(accessor), None)
        } else {
            (None, Some(accessor))
        };
        state.properties.insert(
            key,
            PropertyDescriptor::Accessor {
                get,
                set,
                attributes: PropertyAttributes {
                    writable: false,
                    enumerable: true,
                    configurable: true,
                },
            },
        );
    }

    /// Own property keys in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.0.state.read().properties.keys().cloned().collect()
    }

    /// Do both handles refer to the same object
    #[inline]
    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for JsObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.0.kind {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Function(FunctionKind::Script { code, .. }) => {
                return write!(f, "[function {}]", code.display_name());
            }
            ObjectKind::Function(FunctionKind::Native { .. }) => "native function",
            ObjectKind::Arguments => "Arguments",
            ObjectKind::Error => "Error",
            ObjectKind::PrimitiveWrapper(_) => "wrapper",
        };
        write!(f, "[object {kind}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> JsObject {
        JsObject::native_function(None, |_, _| Ok(Value::undefined()), false)
    }

    #[test]
    fn test_prototype_lookup() {
        let proto = JsObject::new(None);
        proto.create_data_property("inherited", Value::number(1.0));
        let obj = JsObject::new(Some(proto));

        assert!(obj.has_property("inherited"));
        assert!(!obj.has_own_property("inherited"));
        assert!(obj.get_own_property("inherited").is_none());
    }

    #[test]
    fn test_delete_non_configurable() {
        let obj = JsObject::new(None);
        obj.define_own_property(
            JsString::from("fixed"),
            PropertyDescriptor::data_with_attrs(Value::null(), PropertyAttributes::frozen()),
        );

        assert!(!obj.delete("fixed", false).unwrap());
        assert!(matches!(obj.delete("fixed", true), Err(VmError::TypeError(_))));
        assert!(obj.has_own_property("fixed"));
        assert!(obj.delete("missing", true).unwrap());
    }

    #[test]
    fn test_setter_keeps_getter() {
        let obj = JsObject::new(None);
        let getter = noop();
        let setter = noop();

        obj.define_accessor(JsString::from("p"), getter.clone(), true);
        obj.define_accessor(JsString::from("p"), setter.clone(), false);

        match obj.get_own_property("p") {
            Some(PropertyDescriptor::Accessor { get, set, attributes }) => {
                assert!(get.is_some_and(|g| g.ptr_eq(&getter)));
                assert!(set.is_some_and(|s| s.ptr_eq(&setter)));
                assert!(attributes.enumerable && attributes.configurable);
            }
            other => panic!("expected accessor, got {other:?}"),
        }
    }

    #[test]
    fn test_accessor_replaces_data() {
        let obj = JsObject::new(None);
        obj.create_data_property("p", Value::number(5.0));
        obj.define_accessor(JsString::from("p"), noop(), false);

        match obj.get_own_property("p") {
            Some(PropertyDescriptor::Accessor { get, set, .. }) => {
                assert!(get.is_none());
                assert!(set.is_some());
            }
            other => panic!("expected accessor, got {other:?}"),
        }
    }

    #[test]
    fn test_insertion_order() {
        let obj = JsObject::new(None);
        for key in ["b", "a", "c"] {
            obj.create_data_property(key, Value::undefined());
        }
        obj.remove_own_property("a");
        let keys: Vec<_> = obj.own_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "c"]);
    }

    #[test]
    fn test_callable_and_constructor() {
        let plain = JsObject::new(None);
        let native = noop();
        let ctor = JsObject::native_function(None, |_, _| Ok(Value::undefined()), true);

        assert!(!plain.is_callable());
        assert!(native.is_callable() && !native.is_constructor());
        assert!(ctor.is_constructor());
    }
}
