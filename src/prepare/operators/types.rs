use super::{mismatched, move_to_sub_statement, take_projection, ResultOperatorHandler};
use crate::error::CompileResult;
use crate::prepare::context::PreparationContext;
use crate::query::{ResultOperator, ValueType};
use crate::sql::{JoinSemantics, SqlExpr, SqlStatementBuilder};

fn convert_projection(builder: &mut SqlStatementBuilder, target: &ValueType) -> CompileResult<()> {
    let projection = take_projection(builder)?;
    let previous = projection.ty();
    builder.select_projection = Some(if &previous == target {
        projection
    } else {
        SqlExpr::convert(projection, target.clone())
    });
    builder.recalculate_data_info(&previous);
    Ok(())
}

/// `Cast<T>()`: converts every item.
pub struct CastHandler;

impl ResultOperatorHandler for CastHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let ResultOperator::Cast(target) = operator else {
            return Err(mismatched(operator, "CastHandler"));
        };
        if !builder.set_operations.is_empty() {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }
        convert_projection(builder, target)
    }
}

/// `OfType<T>()`: keeps the items of type `T`, typed as `T`.
pub struct OfTypeHandler;

impl ResultOperatorHandler for OfTypeHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let ResultOperator::OfType(target) = operator else {
            return Err(mismatched(operator, "OfTypeHandler"));
        };
        if builder.top.is_some() || !builder.set_operations.is_empty() {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }
        let projection = take_projection(builder)?;
        builder.add_where_condition(SqlExpr::TypeCheck {
            operand: Box::new(projection.clone()),
            target: target.clone(),
        });
        builder.select_projection = Some(projection);
        convert_projection(builder, target)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::prepare;
    use super::*;
    use crate::query::builders::*;
    use crate::sql::DataInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_of_type_filters_and_converts() {
        let model = from_entity("x", "Person").with(ResultOperator::OfType(entity("Employee")));
        let statement = prepare(&model).0.unwrap();
        assert!(matches!(statement.where_condition, Some(SqlExpr::TypeCheck { .. })));
        assert_eq!(statement.data_info, DataInfo::sequence(entity("Employee")));
    }

    #[test]
    fn test_cast_to_same_type_is_noop() {
        let model = from_entity("x", "Person").with(ResultOperator::Cast(entity("Person")));
        let statement = prepare(&model).0.unwrap();
        assert!(matches!(statement.select_projection, SqlExpr::TableRef { .. }));
    }
}
