//! Binary arithmetic operators (ES5 11.5, 11.6)

use crate::convert::{to_number, to_primitive, to_string};
use crate::error::VmResult;
use crate::runtime::VmRuntime;
use crate::value::Value;

/// Multiplicative and subtractive operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

/// The addition operator (ES5 11.6.1)
pub fn add(rt: &mut VmRuntime, left: &Value, right: &Value) -> VmResult<Value> {
    if let (Value::Number(a), Value::Number(b)) = (left, right) {
        return Ok(Value::Number(a + b));
    }
    let lprim = to_primitive(rt, left, None)?;
    let rprim = to_primitive(rt, right, None)?;
    if lprim.is_string() || rprim.is_string() {
        let l = to_string(rt, &lprim)?;
        let r = to_string(rt, &rprim)?;
        return Ok(Value::String(l.concat(&r)));
    }
    Ok(Value::Number(to_number(rt, &lprim)? + to_number(rt, &rprim)?))
}

/// `-`, `*`, `/` and `%`; both operands go through ToNumber left first
pub fn numeric(rt: &mut VmRuntime, op: NumericOp, left: &Value, right: &Value) -> VmResult<Value> {
    let a = to_number(rt, left)?;
    let b = to_number(rt, right)?;
    Ok(Value::Number(match op {
        NumericOp::Sub => a - b,
        NumericOp::Mul => a * b,
        NumericOp::Div => a / b,
        NumericOp::Mod => a % b,
    }))
}
