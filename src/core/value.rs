use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell of a row.
///
/// Equality is structural; `Decimal` compares by numeric value so `1.0`
/// and `1.00` are the same balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Json(serde_json::Value),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Bytes(_) => "BYTES",
            Self::Decimal(_) => "DECIMAL",
            Self::Json(_) => "JSON",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(j) => Some(j),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            Self::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Self::Bytes(b) => {
                4u8.hash(state);
                b.hash(state);
            }
            Self::Decimal(d) => {
                5u8.hash(state);
                d.hash(state);
            }
            // serde_json::Value has no Hash; its canonical text is stable
            // for equal values because object keys are kept sorted.
            Self::Json(j) => {
                6u8.hash(state);
                j.to_string().hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Bytes(b) => write!(f, "\\x{}", hex::encode(b)),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Self::Json(j)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Text,
    Boolean,
    Bytes,
    Decimal,
    Json,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Integer, Value::Integer(_))
                | (Self::Text, Value::Text(_))
                | (Self::Boolean, Value::Boolean(_))
                | (Self::Bytes, Value::Bytes(_))
                | (Self::Decimal, Value::Decimal(_))
                | (Self::Json, Value::Json(_))
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Bytes => write!(f, "BYTES"),
            Self::Decimal => write!(f, "DECIMAL"),
            Self::Json => write!(f, "JSON"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_ne!(Value::Integer(1), Value::Integer(2));
        assert_ne!(Value::Text("1".into()), Value::Integer(1));
    }

    #[test]
    fn test_decimal_equality_ignores_scale() {
        let a = Value::Decimal(Decimal::new(10, 1));
        let b = Value::Decimal(Decimal::new(100, 2));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_bytes_display_is_hex() {
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "\\xdead");
    }

    #[test]
    fn test_type_compatibility() {
        let int_type = DataType::Integer;
        assert!(int_type.is_compatible(&Value::Integer(42)));
        assert!(int_type.is_compatible(&Value::Null));
        assert!(!int_type.is_compatible(&Value::Text("hello".into())));
        assert!(DataType::Json.is_compatible(&Value::Json(serde_json::json!({}))));
    }
}
