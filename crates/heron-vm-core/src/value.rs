//! JavaScript values
//!
//! `Value` is a tagged union over the six ES5 language types. Strings and
//! objects are reference counted: moving a `Value` transfers ownership,
//! `clone()` duplicates it.

use crate::convert::number_to_string;
use crate::object::{JsObject, PropertyDescriptor};
use crate::string::{JsString, Magic};

/// A JavaScript value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Boolean(bool),
    /// IEEE 754 double
    Number(f64),
    /// String
    String(JsString),
    /// Object (including functions)
    Object(JsObject),
}

impl Value {
    /// Create undefined value
    #[inline]
    pub const fn undefined() -> Self {
        Self::Undefined
    }

    /// Create null value
    #[inline]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Create boolean value
    #[inline]
    pub const fn boolean(b: bool) -> Self {
        Self::Boolean(b)
    }

    /// Create number value
    #[inline]
    pub const fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Create string value
    #[inline]
    pub fn string(s: impl Into<JsString>) -> Self {
        Self::String(s.into())
    }

    /// Create object value
    #[inline]
    pub fn object(obj: JsObject) -> Self {
        Self::Object(obj)
    }

    /// Check if undefined
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Check if null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if null or undefined
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Check if boolean
    #[inline]
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean(_))
    }

    /// Check if number
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Check if string
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Check if object
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Check if this is an object with [[Call]]
    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(JsObject::is_callable)
    }

    /// Check if this is an object with [[Construct]]
    pub fn is_constructor(&self) -> bool {
        self.as_object().is_some_and(JsObject::is_constructor)
    }

    /// Get as boolean
    #[inline]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as number
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string
    #[inline]
    pub fn as_string(&self) -> Option<&JsString> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as object
    #[inline]
    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// ToBoolean (ES5 9.2)
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => !(*n == 0.0 || n.is_nan()),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// Result of the `typeof` operator (ES5 11.4.3)
    ///
    /// Always one of the interned magic strings.
    pub fn type_of(&self) -> JsString {
        let id = match self {
            Self::Undefined => Magic::Undefined,
            Self::Null => Magic::Object,
            Self::Boolean(_) => Magic::Boolean,
            Self::Number(_) => Magic::Number,
            Self::String(_) => Magic::String,
            Self::Object(o) if o.is_callable() => Magic::Function,
            Self::Object(_) => Magic::Object,
        };
        JsString::magic(id)
    }

    /// Short rendering for diagnostics; never runs script code
    pub fn describe(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.to_string(),
            Self::Object(o) => {
                let field = |id: Magic| match o.get_property(&JsString::magic(id)) {
                    Some(PropertyDescriptor::Data { value: Value::String(s), .. }) => Some(s),
                    _ => None,
                };
                match (field(Magic::Name), field(Magic::Message)) {
                    (Some(name), Some(msg)) if !msg.is_empty() => format!("{name}: {msg}"),
                    (Some(name), _) => name.to_string(),
                    _ if o.is_callable() => "[function]".to_string(),
                    _ => "[object]".to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", number_to_string(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(o) => write!(f, "{o:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(JsString::from(s))
    }
}

impl From<JsString> for Value {
    fn from(s: JsString) -> Self {
        Self::String(s)
    }
}

impl From<JsObject> for Value {
    fn from(o: JsObject) -> Self {
        Self::Object(o)
    }
}
