//! Literal table for compiled code

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::code::CompiledCode;
use crate::error::{BytecodeError, Result};
use crate::operand::LiteralIndex;

/// A literal referenced by `Literal` operands
#[derive(Debug, Clone)]
pub enum Literal {
    /// 64-bit floating point number
    Number(f64),
    /// String value, also used for identifier names
    String(Arc<str>),
    /// Nested function code
    Function(Arc<CompiledCode>),
}

impl Literal {
    /// Create a string literal
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Get as number if this is a number literal
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string if this is a string literal
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get nested code if this is a function literal
    #[inline]
    pub fn as_function(&self) -> Option<&Arc<CompiledCode>> {
        match self {
            Self::Function(code) => Some(code),
            _ => None,
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Function(code) => write!(f, "<function {}>", code.display_name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LiteralKey {
    Number(u64),
    String(Arc<str>),
}

/// Literal table with deduplication of numbers and strings
#[derive(Debug, Clone, Default)]
pub struct LiteralTable {
    literals: Vec<Literal>,
    index: FxHashMap<LiteralKey, u16>,
}

impl LiteralTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal, returning its index
    ///
    /// Numbers and strings are deduplicated; function literals never are.
    pub fn add(&mut self, literal: Literal) -> Result<LiteralIndex> {
        let key = match &literal {
            Literal::Number(n) => Some(LiteralKey::Number(n.to_bits())),
            Literal::String(s) => Some(LiteralKey::String(s.clone())),
            Literal::Function(_) => None,
        };
        if let Some(existing) = key.as_ref().and_then(|k| self.index.get(k)) {
            return Ok(LiteralIndex(*existing));
        }

        let idx = u16::try_from(self.literals.len()).map_err(|_| BytecodeError::TooManyLiterals)?;
        self.literals.push(literal);
        if let Some(key) = key {
            self.index.insert(key, idx);
        }
        Ok(LiteralIndex(idx))
    }

    /// Get a literal by index
    #[inline]
    pub fn get(&self, index: LiteralIndex) -> Option<&Literal> {
        self.literals.get(index.0 as usize)
    }

    /// Number of literals
    #[inline]
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    /// Check if the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Iterate over literals
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.literals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_dedup() {
        let mut table = LiteralTable::new();

        let a = table.add(Literal::string("x")).unwrap();
        let b = table.add(Literal::Number(1.5)).unwrap();
        let c = table.add(Literal::string("x")).unwrap();
        let d = table.add(Literal::Number(1.5)).unwrap();

        assert_eq!(a, c);
        assert_eq!(b, d);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_negative_zero_distinct() {
        let mut table = LiteralTable::new();
        let a = table.add(Literal::Number(0.0)).unwrap();
        let b = table.add(Literal::Number(-0.0)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_functions_not_deduplicated() {
        let mut table = LiteralTable::new();
        let code = Arc::new(CompiledCode::builder().build().unwrap());
        let a = table.add(Literal::Function(code.clone())).unwrap();
        let b = table.add(Literal::Function(code)).unwrap();
        assert_ne!(a, b);
        assert!(table.get(a).and_then(Literal::as_function).is_some());
    }
}
