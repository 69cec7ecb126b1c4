use super::{mismatched, move_to_sub_statement, ResultOperatorHandler};
use crate::error::CompileResult;
use crate::prepare::context::PreparationContext;
use crate::query::ResultOperator;
use crate::sql::{JoinSemantics, SetOperation, SetOperationCombinedStatement, SqlStatementBuilder};

pub struct DistinctHandler;

impl ResultOperatorHandler for DistinctHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        if !matches!(operator, ResultOperator::Distinct) {
            return Err(mismatched(operator, "DistinctHandler"));
        }
        if builder.top.is_some() || builder.row_number_selector.is_some() || !builder.set_operations.is_empty() {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }
        builder.is_distinct = true;
        Ok(())
    }
}

/// `Union` (`UNION`) and `Concat` (`UNION ALL`).
pub struct SetOperationHandler {
    operation: SetOperation,
}

impl SetOperationHandler {
    pub fn new(operation: SetOperation) -> Self {
        Self { operation }
    }
}

impl ResultOperatorHandler for SetOperationHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let other = match operator {
            ResultOperator::Union(other) | ResultOperator::Concat(other) => other,
            _ => return Err(mismatched(operator, "SetOperationHandler")),
        };

        // ORDER BY and TOP would bind to the first operand only.
        if builder.top.is_some() || !builder.orderings.is_empty() || builder.row_number_selector.is_some() {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }

        let mut statement = ctx.prepare_query_model(other)?;
        if statement.top.is_none() {
            statement.orderings.clear();
        }
        builder.set_operations.push(SetOperationCombinedStatement {
            statement,
            operation: self.operation,
        });
        Ok(())
    }
}
