use super::{mismatched, move_to_sub_statement, take_projection, ResultOperatorHandler};
use crate::error::CompileResult;
use crate::prepare::context::PreparationContext;
use crate::prepare::members::transform_member;
use crate::query::{OrderDirection, ResultOperator, ValueType};
use crate::sql::{DataInfo, JoinSemantics, SqlBinaryOp, SqlExpr, SqlOrdering, SqlStatementBuilder};

/// `Take(n)`: TOP n, or a bound on the row number after `Skip`.
pub struct TakeHandler;

impl ResultOperatorHandler for TakeHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let ResultOperator::Take(count) = operator else {
            return Err(mismatched(operator, "TakeHandler"));
        };
        let count = ctx.prepare_expr(count)?;

        if let (Some(selector), Some(offset)) = (&builder.row_number_selector, &builder.row_number_offset) {
            let upper = SqlExpr::add(offset.clone(), count);
            let condition = SqlExpr::binary(SqlBinaryOp::LessThanOrEqual, selector.clone(), upper);
            builder.add_where_condition(condition);
            return Ok(());
        }

        if builder.top.is_some() || !builder.set_operations.is_empty() {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }
        builder.top = Some(count);
        Ok(())
    }
}

/// `Skip(n)`: numbers the rows in a derived table and keeps those past `n`.
pub struct SkipHandler;

impl ResultOperatorHandler for SkipHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let ResultOperator::Skip(count) = operator else {
            return Err(mismatched(operator, "SkipHandler"));
        };
        let count = ctx.prepare_expr(count)?;

        if builder.top.is_some() || !builder.set_operations.is_empty() || builder.is_distinct {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }

        let data_info = builder.data_info.clone();
        let projection = take_projection(builder)?;
        let item_type = projection.ty();

        let mut orderings = std::mem::take(&mut builder.orderings);
        if orderings.is_empty() {
            // ROW_NUMBER needs an ORDER BY; order by a constant.
            orderings.push(SqlOrdering {
                expr: SqlExpr::int_literal(1),
                direction: OrderDirection::Asc,
            });
        }
        let record_type = ValueType::Record("KeyValuePair".to_string());
        builder.select_projection = Some(SqlExpr::New {
            members: vec![
                ("Key".to_string(), projection.clone()),
                ("Value".to_string(), SqlExpr::RowNumber { orderings }),
            ],
            ty: record_type.clone(),
        });
        builder.data_info = Some(DataInfo::sequence(record_type));

        let reference = move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        let key = transform_member(reference.clone(), "Key", &item_type)?;
        let row_number = transform_member(reference, "Value", &ValueType::Int64)?;

        builder.select_projection = Some(key.clone());
        builder.data_info = data_info;
        builder.add_where_condition(SqlExpr::binary(
            SqlBinaryOp::GreaterThan,
            row_number.clone(),
            count.clone(),
        ));
        builder.orderings = vec![SqlOrdering {
            expr: row_number.clone(),
            direction: OrderDirection::Asc,
        }];
        builder.row_number_selector = Some(row_number);
        builder.row_number_offset = Some(count);

        ctx.replace_mapping(&projection, &key);
        Ok(())
    }
}

/// `First` and `Single`: TOP 1 and a single-value result.
pub struct SingleRowHandler;

impl ResultOperatorHandler for SingleRowHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        let or_default = match operator {
            ResultOperator::First { or_default } | ResultOperator::Single { or_default } => *or_default,
            _ => return Err(mismatched(operator, "SingleRowHandler")),
        };

        if builder.top.is_some() || !builder.set_operations.is_empty() {
            move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
        }

        let projection = take_projection(builder)?;
        let item_type = projection.ty();
        builder.select_projection = Some(projection);
        builder.top = Some(SqlExpr::int_literal(1));
        builder.data_info = Some(DataInfo::SingleValue {
            item_type,
            return_default_when_empty: or_default,
        });
        Ok(())
    }
}
