//! Type conversion and comparison operations (ES5 9, 11.9)

use crate::error::{VmError, VmResult};
use crate::object::{JsObject, ObjectKind, PropertyAttributes, PropertyDescriptor};
use crate::runtime::VmRuntime;
use crate::string::{JsString, Magic};
use crate::value::Value;

/// Hint for ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// Prefer `valueOf`
    Number,
    /// Prefer `toString`
    String,
}

/// CheckObjectCoercible (ES5 9.10)
pub fn check_object_coercible(value: &Value) -> VmResult<()> {
    match value {
        Value::Undefined | Value::Null => Err(VmError::type_error(format!(
            "Cannot convert {} to object",
            value.describe()
        ))),
        _ => Ok(()),
    }
}

/// ToPrimitive (ES5 9.1)
pub fn to_primitive(rt: &mut VmRuntime, value: &Value, hint: Option<PreferredType>) -> VmResult<Value> {
    match value {
        Value::Object(obj) => default_value(rt, obj, hint.unwrap_or(PreferredType::Number)),
        other => Ok(other.clone()),
    }
}

/// [[DefaultValue]] (ES5 8.12.8)
pub fn default_value(rt: &mut VmRuntime, obj: &JsObject, hint: PreferredType) -> VmResult<Value> {
    let order = match hint {
        PreferredType::String => [Magic::ToString, Magic::ValueOf],
        PreferredType::Number => [Magic::ValueOf, Magic::ToString],
    };
    for method in order {
        let func = rt.get(obj, &JsString::magic(method))?;
        if func.is_callable() {
            let result = rt.call_function(&func, Value::Object(obj.clone()), Default::default(), None)?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(VmError::type_error("Cannot convert object to primitive value"))
}

/// ToNumber (ES5 9.3)
pub fn to_number(rt: &mut VmRuntime, value: &Value) -> VmResult<f64> {
    Ok(match value {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Boolean(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::String(s) => string_to_number(s.as_str()),
        Value::Object(_) => {
            let prim = to_primitive(rt, value, Some(PreferredType::Number))?;
            return to_number(rt, &prim);
        }
    })
}

/// ToString (ES5 9.8)
pub fn to_string(rt: &mut VmRuntime, value: &Value) -> VmResult<JsString> {
    Ok(match value {
        Value::Undefined => JsString::magic(Magic::Undefined),
        Value::Null => JsString::magic(Magic::Null),
        Value::Boolean(true) => JsString::magic(Magic::True),
        Value::Boolean(false) => JsString::magic(Magic::False),
        Value::Number(n) => JsString::from(number_to_string(*n)),
        Value::String(s) => s.clone(),
        Value::Object(_) => {
            let prim = to_primitive(rt, value, Some(PreferredType::String))?;
            return to_string(rt, &prim);
        }
    })
}

/// ToObject (ES5 9.9)
pub fn to_object(rt: &VmRuntime, value: &Value) -> VmResult<JsObject> {
    let realm = rt.realm();
    let proto = match value {
        Value::Undefined | Value::Null => {
            return Err(VmError::type_error(format!(
                "Cannot convert {} to object",
                value.describe()
            )));
        }
        Value::Object(obj) => return Ok(obj.clone()),
        Value::Boolean(_) => realm.boolean_prototype.clone(),
        Value::Number(_) => realm.number_prototype.clone(),
        Value::String(_) => realm.string_prototype.clone(),
    };

    let wrapper = JsObject::with_kind(Some(proto), ObjectKind::PrimitiveWrapper(value.clone()));
    if let Value::String(s) = value {
        let readonly = PropertyAttributes {
            writable: false,
            enumerable: true,
            configurable: false,
        };
        for (i, unit) in s.as_str().encode_utf16().enumerate() {
            let ch = String::from_utf16_lossy(&[unit]);
            wrapper.define_own_property(
                JsString::from(i.to_string()),
                PropertyDescriptor::data_with_attrs(Value::string(ch), readonly),
            );
        }
        wrapper.define_own_property(
            JsString::magic(Magic::Length),
            PropertyDescriptor::data_with_attrs(
                Value::Number(s.len_utf16() as f64),
                PropertyAttributes::frozen(),
            ),
        );
    }
    Ok(wrapper)
}

/// Strict equality comparison (ES5 11.9.6)
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Abstract equality comparison (ES5 11.9.3)
pub fn abstract_equals(rt: &mut VmRuntime, a: &Value, b: &Value) -> VmResult<bool> {
    Ok(match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(x), Value::String(y)) => *x == string_to_number(y.as_str()),
        (Value::String(x), Value::Number(y)) => string_to_number(x.as_str()) == *y,
        (Value::Boolean(x), _) => {
            return abstract_equals(rt, &Value::Number(f64::from(u8::from(*x))), b);
        }
        (_, Value::Boolean(y)) => {
            return abstract_equals(rt, a, &Value::Number(f64::from(u8::from(*y))));
        }
        (Value::Number(_) | Value::String(_), Value::Object(_)) => {
            let prim = to_primitive(rt, b, None)?;
            return abstract_equals(rt, a, &prim);
        }
        (Value::Object(_), Value::Number(_) | Value::String(_)) => {
            let prim = to_primitive(rt, a, None)?;
            return abstract_equals(rt, &prim, b);
        }
        _ => strict_equals(a, b),
    })
}

/// StringToNumber (ES5 9.3.1)
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            return f64::NAN;
        }
        return hex.chars().try_fold(0.0f64, |acc, c| {
            c.to_digit(16).map(|d| acc * 16.0 + f64::from(d))
        })
        .unwrap_or(f64::NAN);
    }
    // Rust's float parser also accepts "inf" and "nan" spellings
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// Number to string conversion (ES5 9.8.1)
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // `{:e}` yields the shortest round-tripping digits, e.g. "1.2345e-7"
    let sci = format!("{n:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let point = exp.parse::<i32>().unwrap_or(0) + 1;

    if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let e = point - 1;
        let sign = if e < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{sign}{}", e.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", e.abs())
        }
    }
}
