use serde::{Deserialize, Serialize};

/// Static type carried by every query and SQL expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int32,
    Int64,
    Double,
    Decimal,
    Char,
    String,
    DateTime,
    TimeSpan,
    Guid,
    /// Untyped reference; the common representation for boxed comparisons.
    Object,
    /// A mapped entity, by entity name.
    Entity(String),
    /// Anonymous record produced by a `new { .. }` projection.
    Record(String),
    Nullable(Box<ValueType>),
    Sequence(Box<ValueType>),
    Grouping {
        key: Box<ValueType>,
        element: Box<ValueType>,
    },
}

impl ValueType {
    pub fn entity(name: impl Into<String>) -> Self {
        ValueType::Entity(name.into())
    }

    pub fn sequence_of(item: ValueType) -> Self {
        ValueType::Sequence(Box::new(item))
    }

    pub fn grouping(key: ValueType, element: ValueType) -> Self {
        ValueType::Grouping {
            key: Box::new(key),
            element: Box::new(element),
        }
    }

    /// Wraps value types in `Nullable`; reference types are returned as-is.
    pub fn nullable(self) -> Self {
        if self.is_nullable() {
            self
        } else {
            ValueType::Nullable(Box::new(self))
        }
    }

    /// Whether a value of this type can be null.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            ValueType::String
                | ValueType::Object
                | ValueType::Entity(_)
                | ValueType::Record(_)
                | ValueType::Nullable(_)
                | ValueType::Sequence(_)
                | ValueType::Grouping { .. }
        )
    }

    /// The type with a `Nullable` wrapper removed.
    pub fn underlying(&self) -> &ValueType {
        match self {
            ValueType::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.underlying(), ValueType::Entity(_))
    }

    pub fn entity_name(&self) -> Option<&str> {
        match self.underlying() {
            ValueType::Entity(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.underlying(), ValueType::Bool)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.underlying(), ValueType::String)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ValueType::Sequence(_))
    }

    pub fn is_grouping(&self) -> bool {
        matches!(self, ValueType::Grouping { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.underlying(),
            ValueType::Int32 | ValueType::Int64 | ValueType::Double | ValueType::Decimal
        )
    }

    /// Item type of a sequence, or element type of a grouping.
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::Sequence(item) => Some(item),
            ValueType::Grouping { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Whether a value of `other` can be stored where `self` is expected.
    pub fn is_assignable_from(&self, other: &ValueType) -> bool {
        self == other
            || *self == ValueType::Object
            || (matches!(self, ValueType::Nullable(_)) && self.underlying() == other)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Bool => write!(f, "Boolean"),
            ValueType::Int32 => write!(f, "Int32"),
            ValueType::Int64 => write!(f, "Int64"),
            ValueType::Double => write!(f, "Double"),
            ValueType::Decimal => write!(f, "Decimal"),
            ValueType::Char => write!(f, "Char"),
            ValueType::String => write!(f, "String"),
            ValueType::DateTime => write!(f, "DateTime"),
            ValueType::TimeSpan => write!(f, "TimeSpan"),
            ValueType::Guid => write!(f, "Guid"),
            ValueType::Object => write!(f, "Object"),
            ValueType::Entity(name) => write!(f, "{}", name),
            ValueType::Record(name) => write!(f, "{{{}}}", name),
            ValueType::Nullable(inner) => write!(f, "{}?", inner),
            ValueType::Sequence(item) => write!(f, "Sequence<{}>", item),
            ValueType::Grouping { key, element } => write!(f, "Grouping<{}, {}>", key, element),
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    /// Parses the schema spelling of scalar types (`int32`, `string?`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(inner) = trimmed.strip_suffix('?') {
            return inner.parse::<ValueType>().map(ValueType::nullable);
        }
        let ty = match trimmed.to_ascii_lowercase().as_str() {
            "bool" | "boolean" | "bit" => ValueType::Bool,
            "int" | "int32" | "integer" => ValueType::Int32,
            "long" | "int64" | "bigint" => ValueType::Int64,
            "double" | "float" => ValueType::Double,
            "decimal" | "money" => ValueType::Decimal,
            "char" => ValueType::Char,
            "string" | "text" => ValueType::String,
            "datetime" | "timestamp" => ValueType::DateTime,
            "timespan" | "interval" => ValueType::TimeSpan,
            "guid" | "uuid" => ValueType::Guid,
            "object" => ValueType::Object,
            other => return Err(format!("Unknown scalar type '{}'", other)),
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_wraps_value_types_only() {
        assert_eq!(
            ValueType::Int32.nullable(),
            ValueType::Nullable(Box::new(ValueType::Int32))
        );
        assert_eq!(ValueType::String.nullable(), ValueType::String);
        assert!(ValueType::Int32.nullable().is_nullable());
        assert!(!ValueType::Int32.is_nullable());
    }

    #[test]
    fn test_parse_schema_spelling() {
        assert_eq!("int32?".parse::<ValueType>().unwrap(), ValueType::Int32.nullable());
        assert_eq!("Text".parse::<ValueType>().unwrap(), ValueType::String);
        assert!("blob".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_assignability() {
        assert!(ValueType::Object.is_assignable_from(&ValueType::Int32));
        assert!(ValueType::Int32.nullable().is_assignable_from(&ValueType::Int32));
        assert!(!ValueType::entity("Customer").is_assignable_from(&ValueType::entity("Order")));
    }
}
