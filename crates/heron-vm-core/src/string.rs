//! Immutable JavaScript strings
//!
//! A `JsString` is a shared `Arc<str>`: cloning bumps a reference count and
//! equality compares contents. Engine names that are produced over and over
//! (the `typeof` results, well-known property names) are *magic strings*:
//! one process-wide instance per name, handed out by [`JsString::magic`].

use std::borrow::Borrow;
use std::ops::Deref;
use std::sync::{Arc, LazyLock};

/// Engine-interned string constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Magic {
    /// `"undefined"`
    Undefined,
    /// `"null"`
    Null,
    /// `"object"`
    Object,
    /// `"boolean"`
    Boolean,
    /// `"number"`
    Number,
    /// `"string"`
    String,
    /// `"function"`
    Function,
    /// `"true"`
    True,
    /// `"false"`
    False,
    /// `"NaN"`
    NaN,
    /// `"Infinity"`
    Infinity,
    /// `"length"`
    Length,
    /// `"prototype"`
    Prototype,
    /// `"constructor"`
    Constructor,
    /// `"arguments"`
    Arguments,
    /// `"callee"`
    Callee,
    /// `"eval"`
    Eval,
    /// `"name"`
    Name,
    /// `"message"`
    Message,
    /// `"toString"`
    ToString,
    /// `"valueOf"`
    ValueOf,
    /// `""`
    Empty,
}

impl Magic {
    /// Every magic string, in discriminant order
    pub const ALL: [Magic; 22] = [
        Magic::Undefined,
        Magic::Null,
        Magic::Object,
        Magic::Boolean,
        Magic::Number,
        Magic::String,
        Magic::Function,
        Magic::True,
        Magic::False,
        Magic::NaN,
        Magic::Infinity,
        Magic::Length,
        Magic::Prototype,
        Magic::Constructor,
        Magic::Arguments,
        Magic::Callee,
        Magic::Eval,
        Magic::Name,
        Magic::Message,
        Magic::ToString,
        Magic::ValueOf,
        Magic::Empty,
    ];

    /// Text of the magic string
    pub const fn as_str(self) -> &'static str {
        match self {
            Magic::Undefined => "undefined",
            Magic::Null => "null",
            Magic::Object => "object",
            Magic::Boolean => "boolean",
            Magic::Number => "number",
            Magic::String => "string",
            Magic::Function => "function",
            Magic::True => "true",
            Magic::False => "false",
            Magic::NaN => "NaN",
            Magic::Infinity => "Infinity",
            Magic::Length => "length",
            Magic::Prototype => "prototype",
            Magic::Constructor => "constructor",
            Magic::Arguments => "arguments",
            Magic::Callee => "callee",
            Magic::Eval => "eval",
            Magic::Name => "name",
            Magic::Message => "message",
            Magic::ToString => "toString",
            Magic::ValueOf => "valueOf",
            Magic::Empty => "",
        }
    }
}

static MAGIC_TABLE: LazyLock<Vec<JsString>> = LazyLock::new(|| {
    Magic::ALL
        .iter()
        .map(|m| JsString::new(m.as_str()))
        .collect()
});

/// An immutable JavaScript string
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Arc<str>);

impl JsString {
    /// Create a string
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    /// The interned instance of a magic string
    #[inline]
    pub fn magic(id: Magic) -> Self {
        MAGIC_TABLE[id as usize].clone()
    }

    /// Get the string as a str slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in UTF-16 code units
    pub fn len_utf16(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// Concatenate two strings
    pub fn concat(&self, other: &JsString) -> JsString {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut s = String::with_capacity(self.len() + other.len());
        s.push_str(self.as_str());
        s.push_str(other.as_str());
        Self::new(s)
    }

    /// Do both handles point at the same allocation
    #[inline]
    pub fn ptr_eq(&self, other: &JsString) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Parse as an array index (ES5 15.4)
    pub fn as_array_index(&self) -> Option<u32> {
        let s = self.as_str();
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        s.parse::<u32>().ok().filter(|&i| i != u32::MAX)
    }
}

impl std::fmt::Debug for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Deref for JsString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Arc<str>> for JsString {
    fn from(s: Arc<str>) -> Self {
        Self(s)
    }
}

impl From<Magic> for JsString {
    fn from(id: Magic) -> Self {
        Self::magic(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_is_shared() {
        let a = JsString::magic(Magic::Function);
        let b = JsString::magic(Magic::Function);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.as_str(), "function");
    }

    #[test]
    fn test_magic_table_order() {
        for m in Magic::ALL {
            assert_eq!(JsString::magic(m).as_str(), m.as_str());
        }
    }

    #[test]
    fn test_content_equality() {
        assert_eq!(JsString::from("abc"), JsString::new(String::from("abc")));
        assert!(!JsString::from("abc").ptr_eq(&JsString::from("abc")));
    }

    #[test]
    fn test_concat() {
        let a = JsString::from("foo");
        let b = JsString::from("bar");
        assert_eq!(a.concat(&b).as_str(), "foobar");
        assert!(a.concat(&JsString::magic(Magic::Empty)).ptr_eq(&a));
    }

    #[test]
    fn test_array_index() {
        assert_eq!(JsString::from("0").as_array_index(), Some(0));
        assert_eq!(JsString::from("42").as_array_index(), Some(42));
        assert_eq!(JsString::from("042").as_array_index(), None);
        assert_eq!(JsString::from("4294967295").as_array_index(), None);
        assert_eq!(JsString::from("x").as_array_index(), None);
    }
}
