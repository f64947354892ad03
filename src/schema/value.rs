//! Dynamic values stored in story variables and produced by expressions.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Variable name → current value. The context every expression runs against.
pub type Variables = FxHashMap<String, Value>;

/// A dynamic value that can be stored in a story variable.
///
/// Serialized untagged so story documents can write plain JSON/RON
/// scalars (`true`, `5`, `0.5`, `"text"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl Value {
    /// Name of the value's type as it appears in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
        }
    }

    /// Truthiness: `0`, `0.0`, `""` and `false` are false, everything
    /// else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    /// Numeric view of the value. Booleans count as `0`/`1`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    /// Best-effort integer conversion: floats truncate, strings parse,
    /// booleans map to `0`/`1`. Returns `None` when no integer exists.
    pub fn coerce_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => {
                let t = f.trunc();
                if t >= i64::MIN as f64 && t <= i64::MAX as f64 {
                    Some(t as i64)
                } else {
                    None
                }
            }
            Value::Float(_) => None,
            Value::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Loose equality across numeric types; mismatched kinds are unequal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Str(_), _) | (_, Value::Str(_)) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }

    /// Ordering for comparison operators and `min`/`max`. Numbers order
    /// numerically, strings lexically; anything else is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(Value::from("no").is_truthy());
    }

    #[test]
    fn coerce_int_best_effort() {
        assert_eq!(Value::Float(7.9).coerce_int(), Some(7));
        assert_eq!(Value::Float(-2.5).coerce_int(), Some(-2));
        assert_eq!(Value::from(" 42 ").coerce_int(), Some(42));
        assert_eq!(Value::Bool(true).coerce_int(), Some(1));
        assert_eq!(Value::from("forty").coerce_int(), None);
        assert_eq!(Value::Float(f64::NAN).coerce_int(), None);
    }

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert!(Value::Int(2).loose_eq(&Value::Float(2.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::Int(2).loose_eq(&Value::from("2")));
    }

    #[test]
    fn compare_rejects_mixed_strings() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(Value::from("a").compare(&Value::from("b")), Some(Ordering::Less));
        assert_eq!(Value::from("a").compare(&Value::Int(1)), None);
    }

    #[test]
    fn display_matches_expression_syntax() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Int(-4).to_string(), "-4");
    }

    #[test]
    fn untagged_json_scalars() {
        let v: Vec<Value> = serde_json::from_str(r#"[true, 5, 0.5, "gold"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                Value::Bool(true),
                Value::Int(5),
                Value::Float(0.5),
                Value::from("gold")
            ]
        );
    }
}
