use super::{MethodCall, MethodCallTransformer};
use crate::error::CompileResult;
use crate::query::ValueType;
use crate::sql::SqlExpr;

/// Any `Equals` call: `a.Equals(b)` or `Object.Equals(a, b)`.
///
/// Operands of different static types are both converted to `Object` before
/// being compared.
#[derive(Debug, Clone, Copy)]
pub struct EqualsTransformer;

impl MethodCallTransformer for EqualsTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        let (left, right) = match call.object.take() {
            Some(object) => {
                call.check_argument_count(1)?;
                (object, call.take_argument(0)?)
            }
            None => {
                call.check_argument_count(2)?;
                (call.take_argument(0)?, call.take_argument(1)?)
            }
        };

        if left.ty().underlying() == right.ty().underlying() {
            Ok(SqlExpr::equal(left, right))
        } else {
            Ok(SqlExpr::equal(
                SqlExpr::convert(left, ValueType::Object),
                SqlExpr::convert(right, ValueType::Object),
            ))
        }
    }
}
