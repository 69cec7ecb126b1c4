//! Lowering of query models into unresolved SQL statements.

use super::context::PreparationContext;
use crate::error::{CompileError, CompileResult};
use crate::query::{BodyClause, Expr, FromClause, QueryModel, ValueType};
use crate::sql::{
    DataInfo, JoinInfo, JoinSemantics, SqlExpr, SqlOrdering, SqlStatement, SqlStatementBuilder,
    SubStatementTableInfo, TableId, TableInfo, UnresolvedTableInfo,
};
use tracing::trace;

impl PreparationContext<'_> {
    /// Lowers `model` in a fresh scope nested in the current one.
    pub fn prepare_query_model(&mut self, model: &QueryModel) -> CompileResult<SqlStatement> {
        self.push_scope();
        let result = self.prepare_query_model_in_scope(model);
        self.pop_scope();
        result
    }

    fn prepare_query_model_in_scope(&mut self, model: &QueryModel) -> CompileResult<SqlStatement> {
        let mut builder = SqlStatementBuilder::new();
        self.add_from_clause(&model.main_from, &mut builder)?;

        for clause in &model.body {
            match clause {
                BodyClause::From(from) => self.add_from_clause(from, &mut builder)?,
                BodyClause::Join(join) => {
                    let (table, semantics) = self.prepare_from_source(&join.source, &join.item_type)?;
                    builder.add_table(table, semantics);
                    self.add_mapping(
                        &join.name,
                        SqlExpr::TableRef {
                            table,
                            ty: join.item_type.clone(),
                        },
                    );
                    let outer = self.prepare_expr(&join.outer_key)?;
                    let inner = self.prepare_expr(&join.inner_key)?;
                    builder.add_where_condition(SqlExpr::equal(outer, inner));
                }
                BodyClause::Where(predicate) => {
                    let condition = self.prepare_expr(predicate)?;
                    builder.add_where_condition(condition);
                }
                BodyClause::OrderBy(orderings) => {
                    // A later orderby clause takes precedence over earlier ones.
                    let mut prepared = Vec::with_capacity(orderings.len() + builder.orderings.len());
                    for ordering in orderings {
                        prepared.push(SqlOrdering {
                            expr: self.prepare_expr(&ordering.expr)?,
                            direction: ordering.direction,
                        });
                    }
                    prepared.append(&mut builder.orderings);
                    builder.orderings = prepared;
                }
            }
        }

        let projection = self.prepare_expr(&model.select)?;
        builder.data_info = Some(DataInfo::sequence(projection.ty()));
        builder.select_projection = Some(projection);

        let operators = self.operators;
        for operator in &model.result_operators {
            let kind = operator.kind();
            let handler = operators
                .get(kind)
                .ok_or_else(|| CompileError::unsupported_operator(&kind.to_string()))?;
            trace!(operator = %operator, "Handling result operator");
            handler.handle(operator, &mut builder, self)?;
        }

        builder.get_statement_and_reset()
    }

    fn add_from_clause(&mut self, from: &FromClause, builder: &mut SqlStatementBuilder) -> CompileResult<()> {
        let (table, semantics) = self.prepare_from_source(&from.source, &from.item_type)?;
        builder.add_table(table, semantics);
        self.add_mapping(
            &from.name,
            SqlExpr::TableRef {
                table,
                ty: from.item_type.clone(),
            },
        );
        Ok(())
    }

    /// Creates the table a from or join clause reads from.
    fn prepare_from_source(&mut self, source: &Expr, item_type: &ValueType) -> CompileResult<(TableId, JoinSemantics)> {
        match source {
            Expr::EntitySet { item_type } => Ok((
                self.tables.add_table(
                    TableInfo::Unresolved(UnresolvedTableInfo {
                        item_type: item_type.clone(),
                    }),
                    JoinSemantics::Inner,
                ),
                JoinSemantics::Inner,
            )),
            Expr::SubQuery { query, .. } => {
                let statement = self.prepare_query_model(query)?;
                Ok(self.add_sub_statement_table(statement))
            }
            other => match self.prepare_expr(other)? {
                SqlExpr::TableRef { table, ty } if ty.is_grouping() => Ok((
                    self.tables.add_table(
                        TableInfo::UnresolvedGroupReference {
                            item_type: item_type.clone(),
                            group_source: table,
                        },
                        JoinSemantics::Inner,
                    ),
                    JoinSemantics::Inner,
                )),
                SqlExpr::Member { object, member, ty } if ty.is_sequence() => Ok((
                    self.tables.add_table(
                        TableInfo::UnresolvedJoin {
                            item_type: item_type.clone(),
                            join: Box::new(JoinInfo::UnresolvedCollection {
                                source: *object,
                                member,
                                item_type: item_type.clone(),
                            }),
                        },
                        JoinSemantics::Inner,
                    ),
                    JoinSemantics::Inner,
                )),
                SqlExpr::SubStatement(statement) => Ok(self.add_sub_statement_table(*statement)),
                _ => Err(CompileError::unsupported(
                    "from clause",
                    format!("Cannot use '{}' as a query source", other),
                )),
            },
        }
    }

    /// Adds a derived table for `statement`, or reuses its only table when
    /// the statement merely selects that table's items.
    pub(crate) fn add_sub_statement_table(&mut self, mut statement: SqlStatement) -> (TableId, JoinSemantics) {
        if let [single] = statement.tables.as_slice() {
            let selects_table_item = matches!(
                &statement.select_projection,
                SqlExpr::TableRef { table, .. } if *table == single.table
            );
            if selects_table_item
                && statement.data_info.is_sequence()
                && statement.where_condition.is_none()
                && statement.group_by.is_none()
                && statement.orderings.is_empty()
                && statement.top.is_none()
                && !statement.is_distinct
                && statement.row_number_selector.is_none()
                && statement.set_operations.is_empty()
            {
                return (single.table, single.semantics);
            }
        }

        // A derived table cannot be ordered without TOP.
        if statement.top.is_none() {
            statement.orderings.clear();
        }
        let alias = self.generator.sub_statement_alias();
        let table = self.tables.add_table(
            TableInfo::SubStatement(SubStatementTableInfo {
                alias,
                statement: Box::new(statement),
            }),
            JoinSemantics::Inner,
        );
        (table, JoinSemantics::Inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::methods::MethodCallTransformerRegistry;
    use crate::prepare::operators::ResultOperatorHandlerRegistry;
    use crate::query::builders::*;
    use crate::query::{OrderDirection, ResultOperator};
    use crate::resolve::UniqueIdentifierGenerator;
    use crate::sql::TableArena;
    use pretty_assertions::assert_eq;

    fn prepare(model: &QueryModel) -> (CompileResult<SqlStatement>, TableArena) {
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
    fn test_where_clauses_are_anded() {
        let x = source("x", entity("Customer"));
        let model = from_entity("x", "Customer")
            .filter(x.clone().member("Name", ValueType::String).equal(null()))
            .filter(x.member("Age", ValueType::Int32).greater_than(int(3)));
        let (statement, _) = prepare(&model);
        let statement = statement.unwrap();
        assert!(matches!(
            statement.where_condition,
            Some(SqlExpr::Binary {
                op: crate::sql::SqlBinaryOp::And,
                ..
            })
        ));
        assert_eq!(statement.tables.len(), 1);
    }

    #[test]
    fn test_later_orderby_is_primary() {
        let x = source("x", entity("Customer"));
        let model = from_entity("x", "Customer")
            .order_by(x.clone().member("Name", ValueType::String), OrderDirection::Asc)
            .order_by(x.member("Age", ValueType::Int32), OrderDirection::Desc);
        let (statement, _) = prepare(&model);
        let orderings = statement.unwrap().orderings;
        assert_eq!(orderings.len(), 2);
        assert_eq!(orderings[0].direction, OrderDirection::Desc);
    }

    #[test]
    fn test_trivial_sub_query_is_flattened() {
        let inner = from_entity("c", "Customer");
        let model = from_source("x", entity("Customer"), sub_query(inner, ValueType::sequence_of(entity("Customer"))));
        let (statement, tables) = prepare(&model);
        let statement = statement.unwrap();
        assert_eq!(tables.table_count(), 1);
        assert!(matches!(
            tables.table_info(statement.tables[0].table),
            Some(TableInfo::Unresolved(_))
        ));
    }

    #[test]
    fn test_unsupported_operator_is_named() {
        let model = from_entity("x", "Customer").with(ResultOperator::Last { or_default: false });
        let (statement, _) = prepare(&model);
        let err = statement.unwrap_err();
        assert_eq!(err.construct(), Some("Last"));
        assert!(err.to_string().contains("'Last'"));
    }

    #[test]
    fn test_collection_member_becomes_join_table() {
        let c = source("c", entity("Customer"));
        let model = from_entity("c", "Customer").from_also(
            "o",
            entity("Order"),
            c.member("Orders", ValueType::sequence_of(entity("Order"))),
        );
        let (statement, tables) = prepare(&model);
        let statement = statement.unwrap();
        assert!(matches!(
            tables.table_info(statement.tables[1].table),
            Some(TableInfo::UnresolvedJoin { .. })
        ));
    }
}
