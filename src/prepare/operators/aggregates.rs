use super::{mismatched, move_to_sub_statement, take_projection, ResultOperatorHandler};
use crate::error::CompileResult;
use crate::prepare::context::PreparationContext;
use crate::query::{ResultOperator, ValueType};
use crate::sql::{AggregationKind, DataInfo, JoinSemantics, SqlExpr, SqlStatementBuilder};

/// Aggregates must see the rows a TOP, DISTINCT, GROUP BY or paging produced.
fn needs_sub_statement(builder: &SqlStatementBuilder) -> bool {
    builder.top.is_some()
        || builder.is_distinct
        || !builder.set_operations.is_empty()
        || builder.group_by.is_some()
        || builder.row_number_selector.is_some()
}

fn aggregate(
    builder: &mut SqlStatementBuilder,
    ctx: &mut PreparationContext<'_>,
    kind: AggregationKind,
    with_operand: bool,
    result_type: impl FnOnce(&ValueType) -> ValueType,
) -> CompileResult<()> {
    if needs_sub_statement(builder) {
        move_to_sub_statement(builder, ctx, JoinSemantics::Inner)?;
    }

    let projection = take_projection(builder)?;
    let ty = result_type(&projection.ty());
    let operand = with_operand.then(|| Box::new(projection));
    builder.select_projection = Some(SqlExpr::Aggregation {
        kind,
        operand,
        ty: ty.clone(),
    });
    builder.orderings.clear();
    builder.data_info = Some(DataInfo::Scalar { ty });
    Ok(())
}

/// `Count` and `LongCount`.
pub struct CountHandler {
    kind: AggregationKind,
}

impl CountHandler {
    pub fn new(kind: AggregationKind) -> Self {
        Self { kind }
    }
}

impl ResultOperatorHandler for CountHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        if !matches!(operator, ResultOperator::Count | ResultOperator::LongCount) {
            return Err(mismatched(operator, "CountHandler"));
        }
        let ty = match self.kind {
            AggregationKind::LongCount => ValueType::Int64,
            _ => ValueType::Int32,
        };
        aggregate(builder, ctx, self.kind, false, |_| ty)
    }
}

/// `Sum`, `Min`, `Max` and `Average` over the projection.
pub struct AggregateHandler {
    kind: AggregationKind,
}

impl AggregateHandler {
    pub fn new(kind: AggregationKind) -> Self {
        Self { kind }
    }
}

impl ResultOperatorHandler for AggregateHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()> {
        if !matches!(
            operator,
            ResultOperator::Sum | ResultOperator::Min | ResultOperator::Max | ResultOperator::Average
        ) {
            return Err(mismatched(operator, "AggregateHandler"));
        }
        let kind = self.kind;
        aggregate(builder, ctx, kind, true, |operand| match kind {
            AggregationKind::Average => match operand.underlying() {
                ValueType::Decimal => operand.clone(),
                _ if operand.is_nullable() => ValueType::Double.nullable(),
                _ => ValueType::Double,
            },
            _ => operand.clone(),
        })
    }
}
