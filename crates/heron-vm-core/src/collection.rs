//! Ordered value collections
//!
//! `ArgList` holds call arguments in source order. Pushing a moved value
//! transfers ownership into the list; pushing through [`ArgList::push_cloned`]
//! duplicates it and leaves the caller's reference intact. Dropping the list
//! releases every entry once.

use smallvec::SmallVec;

use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Inline capacity before spilling to the heap
const INLINE_ARGS: usize = 6;

/// Ordered sequence of argument values
#[derive(Debug, Clone, Default)]
pub struct ArgList(SmallVec<[Value; INLINE_ARGS]>);

impl ArgList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list with room for `n` values
    pub fn with_capacity(n: usize) -> Self {
        Self(SmallVec::with_capacity(n))
    }

    /// Move the top `n` entries of `stack` into a new list
    ///
    /// The deepest entry becomes the first argument, so arguments pushed in
    /// source order come back in source order.
    pub fn pop_from_stack(stack: &mut Vec<Value>, n: usize) -> VmResult<Self> {
        let start = stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| VmError::internal("evaluation stack underflow"))?;
        Ok(Self(stack.drain(start..).collect()))
    }

    /// Append, transferring ownership
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// Append a duplicate of `value`
    #[inline]
    pub fn push_cloned(&mut self, value: &Value) {
        self.0.push(value.clone());
    }

    /// Number of values
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a value by position
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Get a duplicate of the value at `index`, or undefined when missing
    pub fn get_or_undefined(&self, index: usize) -> Value {
        self.0.get(index).cloned().unwrap_or_default()
    }

    /// Iterate in argument order
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// View as a slice
    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl FromIterator<Value> for ArgList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ArgList {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; INLINE_ARGS]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArgList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Value>> for ArgList {
    fn from(values: Vec<Value>) -> Self {
        Self(SmallVec::from_vec(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string::JsString;

    #[test]
    fn test_pop_from_stack_keeps_source_order() {
        let mut stack = vec![
            Value::string("callee"),
            Value::number(1.0),
            Value::number(2.0),
            Value::number(3.0),
        ];
        let args = ArgList::pop_from_stack(&mut stack, 3).unwrap();
        let nums: Vec<f64> = args.iter().filter_map(Value::as_number).collect();
        assert_eq!(nums, vec![1.0, 2.0, 3.0]);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_pop_from_stack_underflow() {
        let mut stack = vec![Value::undefined()];
        assert!(matches!(
            ArgList::pop_from_stack(&mut stack, 2),
            Err(VmError::Internal(_))
        ));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_transfer_vs_duplicate() {
        let s = JsString::from("shared");
        let value = Value::String(s.clone());

        let mut args = ArgList::new();
        args.push_cloned(&value);
        args.push(value);

        assert_eq!(args.len(), 2);
        for v in &args {
            assert!(v.as_string().is_some_and(|x| x.ptr_eq(&s)));
        }
    }

    #[test]
    fn test_missing_argument_is_undefined() {
        let args: ArgList = [Value::number(1.0)].into_iter().collect();
        assert!(args.get_or_undefined(3).is_undefined());
    }
}
