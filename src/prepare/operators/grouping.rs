use super::{mismatched, move_to_sub_statement, ResultOperatorHandler};
use crate::error::CompileResult;
use crate::prepare::context::PreparationContext;
use crate::query::{ResultOperator, ValueType};
use crate::sql::{DataInfo, JoinSemantics, SqlExpr, SqlStatementBuilder};

/// `GroupBy(key, element)`.
///
/// The statement selects the key; the element shape is kept in the
/// projection for tables that later read the members of a group.
pub struct GroupByHandler;

impl ResultOperatorHandler for GroupByHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let ResultOperator::GroupBy { key, element } = operator else {
            return Err(mismatched(operator, "GroupByHandler"));
        };
        if builder.top.is_some()
            || builder.is_distinct
            || !builder.set_operations.is_empty()
            || builder.group_by.is_some()
            || builder.row_number_selector.is_some()
        {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }

        let key = ctx.prepare_expr(key)?;
        let element = ctx.prepare_expr(element)?;
        let ty = ValueType::grouping(key.ty(), element.ty());

        builder.group_by = Some(key.clone());
        builder.select_projection = Some(SqlExpr::GroupingSelect {
            key: Box::new(key),
            element: Box::new(element),
            ty: ty.clone(),
        });
        builder.orderings.clear();
        builder.data_info = Some(DataInfo::sequence(ty));
        Ok(())
    }
}

/// `DefaultIfEmpty()`: the statement becomes an outer-applied derived table.
pub struct DefaultIfEmptyHandler;

impl ResultOperatorHandler for DefaultIfEmptyHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        if !matches!(operator, ResultOperator::DefaultIfEmpty) {
            return Err(mismatched(operator, "DefaultIfEmptyHandler"));
        }
        move_to_sub_statement(builder, ctx, JoinSemantics::Left)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::prepare;
    use super::*;
    use crate::query::builders::*;
    use crate::sql::TableInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_if_empty_is_left_applied() {
        let model = from_entity("x", "Order").with(ResultOperator::DefaultIfEmpty);
        let (statement, tables) = prepare(&model);
        let statement = statement.unwrap();
        assert_eq!(statement.tables[0].semantics, JoinSemantics::Left);
        assert!(matches!(
            tables.table_info(statement.tables[0].table),
            Some(TableInfo::SubStatement(_))
        ));
    }

    #[test]
    fn test_group_by_twice_wraps() {
        let o = source("o", entity("Order"));
        let model = from_entity("o", "Order")
            .with(ResultOperator::GroupBy {
                key: o.clone().member("CustomerID", ValueType::Int32),
                element: o.clone(),
            })
            .with(ResultOperator::Count);
        let (statement, tables) = prepare(&model);
        let statement = statement.unwrap();
        assert!(statement.group_by.is_none());
        assert_eq!(tables.table_count(), 2);
    }
}
