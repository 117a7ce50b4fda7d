//! Cell value type
//!
//! The `Value` enum represents every value a source can produce,
//! similar to JSON values but with all numbers widened to `f64`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (f64 for simplicity, handles both int and float)
    Number(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object (key-value map)
    Object(HashMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by comparisons: numbers, or strings that parse as numbers
    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Compare two values
    ///
    /// Numbers compare numerically (a numeric string is accepted on either side),
    /// strings compare lexicographically, booleans compare false < true.
    /// Anything else is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.numeric()?.partial_cmp(&other.numeric()?)
            }
            _ => None,
        }
    }

    /// Loose equality used by filters: `compare` equality, falling back to structural equality
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }

    /// Human readable rendering, used for grouping keys and text matching
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_numbers_and_numeric_strings() {
        assert_eq!(
            Value::Number(2.0).compare(&Value::Number(10.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("10".to_string()).compare(&Value::Number(10.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::String("abc".to_string()).compare(&Value::Number(1.0)), None);
    }

    #[test]
    fn test_loosely_equals() {
        assert!(Value::from("east").loosely_equals(&Value::from("east")));
        assert!(Value::Number(3.0).loosely_equals(&Value::from("3")));
        assert!(Value::Null.loosely_equals(&Value::Null));
        assert!(!Value::Null.loosely_equals(&Value::Number(0.0)));
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::Number(13.0).display_string(), "13");
        assert_eq!(Value::Number(1.5).display_string(), "1.5");
        assert_eq!(Value::Null.display_string(), "");
        assert_eq!(Value::Bool(true).display_string(), "true");
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"count": 42, "tags": ["a", null]});
        let value = Value::from(json);
        match value {
            Value::Object(map) => {
                assert_eq!(map.get("count"), Some(&Value::Number(42.0)));
                assert_eq!(
                    map.get("tags"),
                    Some(&Value::Array(vec![Value::from("a"), Value::Null]))
                );
            }
            _ => panic!("Expected Object"),
        }
    }

    #[test]
    fn test_value_serde_json() {
        let val = Value::Object({
            let mut map = HashMap::new();
            map.insert("count".to_string(), Value::Number(42.0));
            map.insert("active".to_string(), Value::Bool(true));
            map
        });

        let json = serde_json::to_string(&val).unwrap();
        assert!(json.contains("count"));

        let deserialized: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(val, deserialized);
    }
}
