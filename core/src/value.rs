//! Cell values and scalar casts.
//!
//! A [`Value`] is one cell of a [`Frame`](crate::Frame). Native rows only
//! ever hold scalars; the convenience format adds list-valued cells for
//! tags and note fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single table cell.
///
/// # Examples
///
/// ```
/// use ankiframe_core::{ScalarType, Value};
///
/// let v = Value::Text("42".into()).cast(ScalarType::Int).unwrap();
/// assert_eq!(v, Value::Int(42));
/// assert_eq!(Value::Null.cast(ScalarType::Text).unwrap(), Value::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    /// 64-bit integer (ids, timestamps, coded enumerations).
    Int(i64),
    /// Floating point number.
    Real(f64),
    /// Text.
    Text(String),
    /// Ordered list of strings (tags, note fields).
    List(Vec<String>),
}

impl Value {
    /// Returns the integer payload, if this is an [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text payload, if this is a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Python-style truthiness: empty text, empty lists, zero and null are
    /// false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(i) => *i != 0,
            Value::Real(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Casts the value to `target`.
    ///
    /// `Null` stays `Null`. Reals are truncated when cast to integers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCast`] for lists and for text that does not
    /// parse as the requested number.
    pub fn cast(self, target: ScalarType) -> Result<Value> {
        let fail = |value: &Value| Error::InvalidCast {
            value: format!("{value:?}"),
            target: target.as_str(),
        };
        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (v @ Value::List(_), _) => Err(fail(&v)),
            (Value::Int(i), ScalarType::Int) => Ok(Value::Int(i)),
            (Value::Int(i), ScalarType::Real) => Ok(Value::Real(i as f64)),
            (Value::Int(i), ScalarType::Text) => Ok(Value::Text(i.to_string())),
            (Value::Real(f), ScalarType::Int) => Ok(Value::Int(f as i64)),
            (Value::Real(f), ScalarType::Real) => Ok(Value::Real(f)),
            (Value::Real(f), ScalarType::Text) => Ok(Value::Text(f.to_string())),
            (Value::Text(s), ScalarType::Text) => Ok(Value::Text(s)),
            (Value::Text(s), ScalarType::Int) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::Int(i)),
                Err(_) => Err(fail(&Value::Text(s))),
            },
            (Value::Text(s), ScalarType::Real) => match s.trim().parse::<f64>() {
                Ok(f) => Ok(Value::Real(f)),
                Err(_) => Err(fail(&Value::Text(s))),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

/// Scalar storage types used by the per-table dtype casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Real,
    Text,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::Real => "real",
            ScalarType::Text => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_int_to_text_and_back() {
        let text = Value::Int(1_500_000_000_123).cast(ScalarType::Text).unwrap();
        assert_eq!(text, Value::Text("1500000000123".into()));
        assert_eq!(text.cast(ScalarType::Int).unwrap(), Value::Int(1_500_000_000_123));
    }

    #[test]
    fn test_cast_real_truncates() {
        assert_eq!(Value::Real(2.9).cast(ScalarType::Int).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_cast_rejects_lists_and_garbage() {
        assert!(matches!(
            Value::List(vec!["a".into()]).cast(ScalarType::Text),
            Err(Error::InvalidCast { .. })
        ));
        assert!(matches!(
            Value::Text("abc".into()).cast(ScalarType::Int),
            Err(Error::InvalidCast { target: "int", .. })
        ));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::Text("x".into()).is_truthy());
    }

    #[test]
    fn test_serialize_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Int(3),
            Value::Text("a".into()),
            Value::List(vec!["b".into()]),
            Value::Null,
        ])
        .unwrap();
        assert_eq!(json, r#"[3,"a",["b"],null]"#);
    }
}
