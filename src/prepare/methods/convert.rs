use super::{MethodCall, MethodCallTransformer};
use crate::error::CompileResult;
use crate::query::ValueType;
use crate::sql::SqlExpr;

/// `Convert.ToInt32(x)` and friends: a conversion to the call's return type.
#[derive(Debug, Clone, Copy)]
pub struct ConvertTransformer;

impl MethodCallTransformer for ConvertTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_static()?;
        call.check_argument_count(1)?;
        let operand = call.take_argument(0)?;
        Ok(SqlExpr::convert(operand, call.ty.clone()))
    }
}

/// `x.ToString()` and `Convert.ToString(x)`.
#[derive(Debug, Clone, Copy)]
pub struct ToStringTransformer;

impl MethodCallTransformer for ToStringTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        let operand = match call.object.take() {
            Some(object) => {
                call.check_argument_count(0)?;
                object
            }
            None => {
                call.check_argument_count(1)?;
                call.take_argument(0)?
            }
        };
        if operand.ty() == ValueType::String {
            return Ok(operand);
        }
        Ok(SqlExpr::convert(operand, ValueType::String))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MethodSig;
    use crate::sql::SqlColumn;

    #[test]
    fn test_to_string_on_int_column() {
        let age = SqlExpr::Column(SqlColumn::definition(ValueType::Int32, "t0", "Age", false));
        let result = ToStringTransformer
            .transform(MethodCall {
                method: MethodSig::instance("Int32", "ToString", []),
                object: Some(age.clone()),
                arguments: vec![],
                ty: ValueType::String,
                expression: "[x].Age.ToString()".to_string(),
            })
            .unwrap();
        assert_eq!(result, SqlExpr::convert(age, ValueType::String));
    }

    #[test]
    fn test_convert_rejects_instance_calls() {
        let age = SqlExpr::Column(SqlColumn::definition(ValueType::Int32, "t0", "Age", false));
        let err = ConvertTransformer
            .transform(MethodCall {
                method: MethodSig::instance("Int32", "ToInt64", []),
                object: Some(age),
                arguments: vec![],
                ty: ValueType::Int64,
                expression: "[x].Age.ToInt64()".to_string(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("expected a static method"));
    }
}
