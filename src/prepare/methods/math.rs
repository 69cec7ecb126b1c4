use super::{MethodCall, MethodCallTransformer};
use crate::error::CompileResult;
use crate::sql::SqlExpr;

/// `Math.Abs`, `Math.Floor`, `Math.Ceiling`, `Math.Round`.
#[derive(Debug, Clone, Copy)]
pub struct MathTransformer;

impl MethodCallTransformer for MathTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_static()?;
        let function = match call.method.name.as_str() {
            "Abs" => "ABS",
            "Floor" => "FLOOR",
            "Ceiling" => "CEILING",
            "Round" => {
                call.check_argument_range(1, 2)?;
                let value = call.take_argument(0)?;
                let digits = if call.arguments.len() == 2 {
                    call.take_argument(1)?
                } else {
                    SqlExpr::int_literal(0)
                };
                return Ok(SqlExpr::function("ROUND", vec![value, digits], call.ty.clone()));
            }
            _ => return Err(call.unsupported("Abs, Floor, Ceiling or Round")),
        };
        call.check_argument_count(1)?;
        let value = call.take_argument(0)?;
        Ok(SqlExpr::function(function, vec![value], call.ty.clone()))
    }
}
