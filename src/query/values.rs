use super::types::ValueType;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A constant value appearing in a query or bound as a command parameter.
///
/// Equality is structural: floats compare by bit pattern, so a NaN constant
/// equals itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Char(char),
    String(String),
    DateTime(NaiveDateTime),
    /// Time span in milliseconds
    TimeSpan(i64),
    Guid(Uuid),
    Array(Vec<Value>),
    /// An entity instance, identified by its primary key
    Entity { entity: String, key: Box<Value> },
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::TimeSpan(a), Value::TimeSpan(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (
                Value::Entity { entity: a, key: ka },
                Value::Entity { entity: b, key: kb },
            ) => a == b && ka == kb,
            _ => false,
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The natural static type of this value, if it has one.
    pub fn natural_type(&self) -> Option<ValueType> {
        let ty = match self {
            Value::Null => return None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(n) if i32::try_from(*n).is_ok() => ValueType::Int32,
            Value::Int(_) => ValueType::Int64,
            Value::Float(_) => ValueType::Double,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Char(_) => ValueType::Char,
            Value::String(_) => ValueType::String,
            Value::DateTime(_) => ValueType::DateTime,
            Value::TimeSpan(_) => ValueType::TimeSpan,
            Value::Guid(_) => ValueType::Guid,
            Value::Array(items) => {
                let item = items
                    .iter()
                    .find_map(Value::natural_type)
                    .unwrap_or(ValueType::Object);
                ValueType::sequence_of(item)
            }
            Value::Entity { entity, .. } => ValueType::Entity(entity.clone()),
        };
        Some(ty)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            Value::TimeSpan(ms) => write!(f, "{}ms", ms),
            Value::Guid(u) => write!(f, "{}", u),
            Value::Array(arr) => {
                write!(f, "{{")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
            Value::Entity { entity, key } => write!(f, "{}#{}", entity, key),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
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

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Guid(u)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_type() {
        assert_eq!(Value::Int(3).natural_type(), Some(ValueType::Int32));
        assert_eq!(Value::Int(i64::MAX).natural_type(), Some(ValueType::Int64));
        assert_eq!(
            Value::Array(vec![Value::Null, Value::from("a")]).natural_type(),
            Some(ValueType::sequence_of(ValueType::String))
        );
        assert_eq!(Value::Null.natural_type(), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }
}
