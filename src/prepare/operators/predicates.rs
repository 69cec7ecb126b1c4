use super::{mismatched, ResultOperatorHandler};
use crate::error::CompileResult;
use crate::prepare::context::PreparationContext;
use crate::query::{ResultOperator, ValueType};
use crate::sql::{DataInfo, SqlExpr, SqlStatement, SqlStatementBuilder};

/// Takes the statement out of the builder for use inside a predicate.
fn take_statement(builder: &mut SqlStatementBuilder) -> CompileResult<SqlStatement> {
    if builder.top.is_none() {
        builder.orderings.clear();
    }
    builder.get_statement_and_reset()
}

fn select_predicate(builder: &mut SqlStatementBuilder, predicate: SqlExpr) {
    builder.select_projection = Some(SqlExpr::PredicateAsValue(Box::new(predicate)));
    builder.data_info = Some(DataInfo::Scalar { ty: ValueType::Bool });
}

/// `Any()`: `EXISTS (<statement>)`.
pub struct AnyHandler;

impl ResultOperatorHandler for AnyHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        _ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        if !matches!(operator, ResultOperator::Any) {
            return Err(mismatched(operator, "AnyHandler"));
        }
        let statement = take_statement(builder)?;
        select_predicate(builder, SqlExpr::Exists(Box::new(statement)));
        Ok(())
    }
}

/// `All(p)`: `NOT EXISTS (<statement> WHERE NOT p)`.
pub struct AllHandler;

impl ResultOperatorHandler for AllHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let ResultOperator::All(predicate) = operator else {
            return Err(mismatched(operator, "AllHandler"));
        };
        let predicate = ctx.prepare_expr(predicate)?;
        builder.add_where_condition(SqlExpr::Not(Box::new(predicate)));
        let statement = take_statement(builder)?;
        select_predicate(
            builder,
            SqlExpr::Not(Box::new(SqlExpr::Exists(Box::new(statement)))),
        );
        Ok(())
    }
}

/// `Contains(item)`: `item IN (<statement>)`.
pub struct ContainsHandler;

impl ResultOperatorHandler for ContainsHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let ResultOperator::Contains(item) = operator else {
            return Err(mismatched(operator, "ContainsHandler"));
        };
        let item = ctx.prepare_expr(item)?;
        let statement = take_statement(builder)?;
        select_predicate(
            builder,
            SqlExpr::In {
                item: Box::new(item),
                collection: Box::new(SqlExpr::SubStatement(Box::new(statement))),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::prepare;
    use super::*;
    use crate::query::builders::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_negates_predicate_inside_exists() {
        let x = source("x", entity("Customer"));
        let model = from_entity("x", "Customer").with(ResultOperator::All(
            x.member("Age", ValueType::Int32).greater_than(int(18)),
        ));
        let statement = prepare(&model).0.unwrap();
        let SqlExpr::PredicateAsValue(predicate) = statement.select_projection else {
            panic!("expected a predicate projection");
        };
        let SqlExpr::Not(exists) = *predicate else {
            panic!("expected NOT EXISTS");
        };
        let SqlExpr::Exists(inner) = *exists else {
            panic!("expected EXISTS");
        };
        assert!(matches!(inner.where_condition, Some(SqlExpr::Not(_))));
    }

    #[test]
    fn test_contains_is_scalar_bool() {
        let x = source("x", entity("Customer"));
        let model = from_entity("x", "Customer")
            .select(x.member("Age", ValueType::Int32))
            .with(ResultOperator::Contains(int(42)));
        let statement = prepare(&model).0.unwrap();
        assert_eq!(statement.data_info, DataInfo::Scalar { ty: ValueType::Bool });
        assert!(statement.tables.is_empty());
    }
}
