//! Member accesses that have a direct SQL equivalent.

use crate::error::{CompileError, CompileResult};
use crate::query::ValueType;
use crate::sql::{SqlExpr, TextPart};

fn date_part(member: &str) -> Option<&'static str> {
    Some(match member {
        "Year" => "year",
        "Month" => "month",
        "Day" => "day",
        "Hour" => "hour",
        "Minute" => "minute",
        "Second" => "second",
        "Millisecond" => "millisecond",
        "DayOfYear" => "dayofyear",
        _ => return None,
    })
}

/// Lowers `object.member`. Members of mapped entities stay unresolved until
/// mapping resolution.
pub fn transform_member(object: SqlExpr, member: &str, ty: &ValueType) -> CompileResult<SqlExpr> {
    let object_type = object.ty();

    if object_type.is_string() && member == "Length" {
        return Ok(SqlExpr::function("LEN", vec![object], ValueType::Int32));
    }

    if matches!(object_type.underlying(), ValueType::DateTime) {
        if let Some(part) = date_part(member) {
            return Ok(SqlExpr::CompositeText {
                parts: vec![
                    TextPart::Text(format!("DATEPART({}, ", part)),
                    TextPart::Expr(object),
                    TextPart::Text(")".to_string()),
                ],
                ty: ValueType::Int32,
            });
        }
    }

    if matches!(object_type, ValueType::Nullable(_)) {
        match member {
            "HasValue" => return Ok(SqlExpr::IsNotNull(Box::new(object))),
            "Value" => return Ok(object),
            _ => {}
        }
    }

    match object {
        SqlExpr::New { members, ty: record } => members
            .into_iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                CompileError::unsupported(
                    member,
                    format!("The record type '{}' has no member '{}'", record, member),
                )
            }),
        SqlExpr::GroupingSelect { key, .. } if member == "Key" => Ok(*key),
        object => Ok(SqlExpr::Member {
            object: Box::new(object),
            member: member.to_string(),
            ty: ty.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlColumn;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_length() {
        let name = SqlExpr::Column(SqlColumn::definition(ValueType::String, "t0", "Name", false));
        let result = transform_member(name.clone(), "Length", &ValueType::Int32).unwrap();
        assert_eq!(result, SqlExpr::function("LEN", vec![name], ValueType::Int32));
    }

    #[test]
    fn test_record_member_is_selected() {
        let record = SqlExpr::New {
            members: vec![("A".to_string(), SqlExpr::int_literal(1))],
            ty: ValueType::Record("R".to_string()),
        };
        assert_eq!(
            transform_member(record.clone(), "A", &ValueType::Int32).unwrap(),
            SqlExpr::int_literal(1)
        );
        assert!(transform_member(record, "B", &ValueType::Int32).is_err());
    }

    #[test]
    fn test_nullable_has_value() {
        let age = SqlExpr::Column(SqlColumn::definition(ValueType::Int32.nullable(), "t0", "Age", false));
        assert_eq!(
            transform_member(age.clone(), "HasValue", &ValueType::Bool).unwrap(),
            SqlExpr::IsNotNull(Box::new(age))
        );
    }
}
