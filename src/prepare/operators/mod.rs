//! Result-operator handlers: apply `Take`, `Count`, `Union`, ... to the
//! statement being built.

mod aggregates;
mod grouping;
mod paging;
mod predicates;
mod sets;
mod types;

pub use aggregates::{AggregateHandler, CountHandler};
pub use grouping::{DefaultIfEmptyHandler, GroupByHandler};
pub use paging::{SingleRowHandler, SkipHandler, TakeHandler};
pub use predicates::{AllHandler, AnyHandler, ContainsHandler};
pub use sets::{DistinctHandler, SetOperationHandler};
pub use types::{CastHandler, OfTypeHandler};

use super::context::PreparationContext;
use crate::error::{CompileError, CompileResult};
use crate::query::{ResultOperator, ResultOperatorKind};
use crate::sql::{
    AggregationKind, DataInfo, JoinSemantics, SetOperation, SqlExpr, SqlStatementBuilder,
    SubStatementTableInfo, TableInfo,
};
use std::collections::HashMap;
use std::sync::Arc;

pub trait ResultOperatorHandler: Send + Sync {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        ctx: &mut PreparationContext<'_>,
    ) -> CompileResult<()>;
}

#[derive(Default, Clone)]
pub struct ResultOperatorHandlerRegistry {
    handlers: HashMap<ResultOperatorKind, Arc<dyn ResultOperatorHandler>>,
}

impl std::fmt::Debug for ResultOperatorHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.handlers.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("ResultOperatorHandlerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl ResultOperatorHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ResultOperatorKind, handler: Arc<dyn ResultOperatorHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: ResultOperatorKind) -> Option<&Arc<dyn ResultOperatorHandler>> {
        self.handlers.get(&kind)
    }

    /// Registry with every built-in handler. `Last` and `Reverse` have none.
    pub fn build_default_registry() -> Self {
        use ResultOperatorKind as K;
        let mut registry = Self::new();
        registry.register(K::Take, Arc::new(TakeHandler));
        registry.register(K::Skip, Arc::new(SkipHandler));
        registry.register(K::First, Arc::new(SingleRowHandler));
        registry.register(K::Single, Arc::new(SingleRowHandler));
        registry.register(K::Count, Arc::new(CountHandler::new(AggregationKind::Count)));
        registry.register(K::LongCount, Arc::new(CountHandler::new(AggregationKind::LongCount)));
        registry.register(K::Sum, Arc::new(AggregateHandler::new(AggregationKind::Sum)));
        registry.register(K::Min, Arc::new(AggregateHandler::new(AggregationKind::Min)));
        registry.register(K::Max, Arc::new(AggregateHandler::new(AggregationKind::Max)));
        registry.register(K::Average, Arc::new(AggregateHandler::new(AggregationKind::Average)));
        registry.register(K::Distinct, Arc::new(DistinctHandler));
        registry.register(K::Union, Arc::new(SetOperationHandler::new(SetOperation::Union)));
        registry.register(K::Concat, Arc::new(SetOperationHandler::new(SetOperation::UnionAll)));
        registry.register(K::Cast, Arc::new(CastHandler));
        registry.register(K::OfType, Arc::new(OfTypeHandler));
        registry.register(K::Any, Arc::new(AnyHandler));
        registry.register(K::All, Arc::new(AllHandler));
        registry.register(K::Contains, Arc::new(ContainsHandler));
        registry.register(K::GroupBy, Arc::new(GroupByHandler));
        registry.register(K::DefaultIfEmpty, Arc::new(DefaultIfEmptyHandler));
        registry
    }
}

/// Moves everything built so far into a derived table and makes `builder`
/// select that table's items. Returns the reference to the new table's item.
///
/// Names that referred to the old projection now refer to the derived table.
pub(crate) fn move_to_sub_statement(
    builder: &mut SqlStatementBuilder,
    ctx: &mut PreparationContext<'_>,
    semantics: JoinSemantics,
) -> CompileResult<SqlExpr> {
    let old_projection = builder.select_projection.clone();
    let mut statement = builder.get_statement_and_reset()?;
    if statement.top.is_none() {
        statement.orderings.clear();
    }

    let item_type = statement.data_info.item_type();
    let alias = ctx.generator.sub_statement_alias();
    let table = ctx.tables.add_table(
        TableInfo::SubStatement(SubStatementTableInfo {
            alias,
            statement: Box::new(statement),
        }),
        semantics,
    );

    let reference = SqlExpr::TableRef {
        table,
        ty: item_type.clone(),
    };
    builder.add_table(table, semantics);
    builder.data_info = Some(DataInfo::sequence(item_type));
    builder.select_projection = Some(reference.clone());
    if let Some(old) = old_projection {
        ctx.replace_mapping(&old, &reference);
    }
    Ok(reference)
}

pub(crate) fn take_projection(builder: &mut SqlStatementBuilder) -> CompileResult<SqlExpr> {
    builder
        .select_projection
        .take()
        .ok_or_else(|| CompileError::invalid("A result operator was applied before the select clause"))
}

pub(crate) fn mismatched(operator: &ResultOperator, handler: &str) -> CompileError {
    CompileError::invalid(format!("{} cannot handle the result operator '{}'", handler, operator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::methods::MethodCallTransformerRegistry;
    use crate::query::builders::*;
    use crate::query::{QueryModel, ValueType};
    use crate::resolve::UniqueIdentifierGenerator;
    use crate::sql::{SqlStatement, TableArena};

    pub(super) fn prepare(model: &QueryModel) -> (CompileResult<SqlStatement>, TableArena) {
        let mut tables = TableArena::new();
        let mut generator = UniqueIdentifierGenerator::default();
        let methods = MethodCallTransformerRegistry::build_default_registry();
        let operators = ResultOperatorHandlerRegistry::build_default_registry();
        let result = {
            let mut ctx = PreparationContext::new(&mut tables, &mut generator, &methods, &operators);
            ctx.prepare_query_model(model)
        };
        (result, tables)
    }

    #[test]
    fn test_take_sets_top() {
        let model = from_entity("x", "Customer").with(ResultOperator::Take(int(3)));
        let statement = prepare(&model).0.unwrap();
        assert_eq!(statement.top, Some(SqlExpr::constant(3, ValueType::Int32)));
    }

    #[test]
    fn test_first_and_first_or_default() {
        let first = prepare(&from_entity("x", "Customer").with(ResultOperator::First { or_default: false }))
            .0
            .unwrap();
        assert_eq!(first.top, Some(SqlExpr::int_literal(1)));
        assert_eq!(
            first.data_info,
            DataInfo::SingleValue {
                item_type: entity("Customer"),
                return_default_when_empty: false,
            }
        );

        let or_default = prepare(&from_entity("x", "Customer").with(ResultOperator::First { or_default: true }))
            .0
            .unwrap();
        assert_eq!(
            or_default.data_info,
            DataInfo::SingleValue {
                item_type: entity("Customer"),
                return_default_when_empty: true,
            }
        );
    }

    #[test]
    fn test_take_after_take_wraps() {
        let model = from_entity("x", "Customer")
            .with(ResultOperator::Take(int(10)))
            .with(ResultOperator::Take(int(3)));
        let (statement, tables) = prepare(&model);
        let statement = statement.unwrap();
        assert_eq!(statement.top, Some(SqlExpr::constant(3, ValueType::Int32)));
        let Some(TableInfo::SubStatement(inner)) = tables.table_info(statement.tables[0].table) else {
            panic!("expected a derived table");
        };
        assert_eq!(inner.statement.top, Some(SqlExpr::constant(10, ValueType::Int32)));
    }

    #[test]
    fn test_count_is_scalar() {
        let model = from_entity("x", "Customer").with(ResultOperator::Count);
        let statement = prepare(&model).0.unwrap();
        assert_eq!(statement.data_info, DataInfo::Scalar { ty: ValueType::Int32 });
        assert!(matches!(
            statement.select_projection,
            SqlExpr::Aggregation {
                kind: AggregationKind::Count,
                operand: None,
                ..
            }
        ));
    }

    #[test]
    fn test_count_after_distinct_wraps() {
        let model = from_entity("x", "Customer")
            .with(ResultOperator::Distinct)
            .with(ResultOperator::Count);
        let (statement, tables) = prepare(&model);
        let statement = statement.unwrap();
        assert!(!statement.is_distinct);
        let Some(TableInfo::SubStatement(inner)) = tables.table_info(statement.tables[0].table) else {
            panic!("expected a derived table");
        };
        assert!(inner.statement.is_distinct);
    }

    #[test]
    fn test_any_becomes_exists() {
        let model = from_entity("x", "Customer").with(ResultOperator::Any);
        let statement = prepare(&model).0.unwrap();
        assert!(statement.tables.is_empty());
        assert!(matches!(
            statement.select_projection,
            SqlExpr::PredicateAsValue(ref inner) if matches!(**inner, SqlExpr::Exists(_))
        ));
    }

    #[test]
    fn test_union_appends_set_operation() {
        let model = from_entity("x", "Customer")
            .with(ResultOperator::Union(Box::new(from_entity("y", "Customer"))));
        let statement = prepare(&model).0.unwrap();
        assert_eq!(statement.set_operations.len(), 1);
        assert_eq!(statement.set_operations[0].operation, SetOperation::Union);
    }

    #[test]
    fn test_skip_uses_row_number() {
        let x = source("x", entity("Customer"));
        let model = from_entity("x", "Customer")
            .order_by(x.member("Name", ValueType::String), crate::query::OrderDirection::Asc)
            .with(ResultOperator::Skip(int(5)))
            .with(ResultOperator::Take(int(10)));
        let (statement, tables) = prepare(&model);
        let statement = statement.unwrap();
        assert!(statement.row_number_selector.is_some());
        assert!(statement.top.is_none());
        assert_eq!(statement.orderings.len(), 1);
        let Some(TableInfo::SubStatement(inner)) = tables.table_info(statement.tables[0].table) else {
            panic!("expected a derived table");
        };
        assert!(inner.statement.orderings.is_empty());
        assert!(matches!(inner.statement.select_projection, SqlExpr::New { .. }));
    }

    #[test]
    fn test_group_by_sets_grouping_projection() {
        let o = source("o", entity("Order"));
        let model = from_entity("o", "Order").with(ResultOperator::GroupBy {
            key: o.clone().member("CustomerID", ValueType::Int32),
            element: o,
        });
        let statement = prepare(&model).0.unwrap();
        assert!(statement.group_by.is_some());
        assert_eq!(
            statement.data_info,
            DataInfo::sequence(ValueType::grouping(ValueType::Int32, entity("Order")))
        );
    }
}
