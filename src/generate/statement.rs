use super::SqlTextGenerator;
use crate::error::{CompileError, CompileResult};
use crate::sql::expr::projected_name;
use crate::sql::{AppendedTable, JoinInfo, JoinSemantics, SqlExpr, SqlStatement, TableId, TableInfo};

impl<'a> SqlTextGenerator<'a> {
    pub(super) fn statement(&mut self, statement: &SqlStatement) -> CompileResult<()> {
        self.command.append("SELECT ");
        if statement.is_distinct {
            self.command.append("DISTINCT ");
        }
        if let Some(top) = &statement.top {
            if !self.dialect.uses_limit() {
                self.command.append("TOP (");
                self.value(top)?;
                self.command.append(") ");
            }
        }

        self.projection(&statement.select_projection)?;
        self.from_tables(&statement.tables)?;

        if let Some(condition) = &statement.where_condition {
            self.command.append(" WHERE ");
            self.predicate(condition)?;
        }
        if let Some(group_by) = &statement.group_by {
            self.command.append(" GROUP BY ");
            let mut first = true;
            self.grouping_columns(group_by, &mut first)?;
        }
        if !statement.orderings.is_empty() {
            self.command.append(" ORDER BY ");
            self.orderings(&statement.orderings)?;
        }
        if let Some(top) = &statement.top {
            if self.dialect.uses_limit() {
                self.command.append(" LIMIT ");
                self.value(top)?;
            }
        }

        for combined in &statement.set_operations {
            self.command.append(" ");
            self.command.append(&combined.operation.to_string());
            self.command.append(" (");
            self.statement(&combined.statement)?;
            self.command.append(")");
        }
        Ok(())
    }

    fn projection(&mut self, projection: &SqlExpr) -> CompileResult<()> {
        let mut count = 0;
        self.projection_columns(projection, None, &mut count)?;
        if count == 0 {
            return Err(CompileError::InvalidStatement(format!(
                "Projection {} has no columns",
                projection.ty()
            )));
        }
        Ok(())
    }

    /// Column naming here must agree with `reference_of`, which reads the
    /// columns back from outside a sub-statement.
    fn projection_columns(
        &mut self,
        expr: &SqlExpr,
        name: Option<&str>,
        count: &mut usize,
    ) -> CompileResult<()> {
        match expr {
            SqlExpr::Entity(entity) => {
                for column in &entity.columns {
                    self.separator(count);
                    self.column(column);
                    let projected = projected_name(name, &column.name);
                    if projected != column.name {
                        self.command.append(" AS ");
                        self.command.append_identifier(&projected);
                    }
                }
            }
            SqlExpr::New { members, .. } => {
                for (member, value) in members {
                    let nested = projected_name(name, member);
                    self.projection_columns(value, Some(&nested), count)?;
                }
            }
            SqlExpr::GroupingSelect { key, .. } => {
                let nested = projected_name(name, "key");
                self.projection_columns(key, Some(&nested), count)?;
            }
            other => {
                self.separator(count);
                self.value(other)?;
                self.command.append(" AS ");
                self.command.append_identifier(name.unwrap_or("value"));
            }
        }
        Ok(())
    }

    fn separator(&mut self, count: &mut usize) {
        if *count > 0 {
            self.command.append(", ");
        }
        *count += 1;
    }

    fn grouping_columns(&mut self, expr: &SqlExpr, first: &mut bool) -> CompileResult<()> {
        let add = |generator: &mut Self, first: &mut bool| {
            if !*first {
                generator.command.append(", ");
            }
            *first = false;
        };
        match expr {
            SqlExpr::Entity(entity) => {
                for column in &entity.columns {
                    add(self, first);
                    self.column(column);
                }
            }
            SqlExpr::New { members, .. } => {
                for (_, value) in members {
                    self.grouping_columns(value, first)?;
                }
            }
            SqlExpr::GroupingSelect { key, .. } => self.grouping_columns(key, first)?,
            other => {
                add(self, first);
                self.value(other)?;
            }
        }
        Ok(())
    }

    fn from_tables(&mut self, tables: &[AppendedTable]) -> CompileResult<()> {
        for (i, appended) in tables.iter().enumerate() {
            let info = self.resolved_info(appended.table)?;
            if i == 0 {
                self.command.append(" FROM ");
                self.table_source(info)?;
            } else {
                match (appended.semantics, info) {
                    (JoinSemantics::Inner, TableInfo::Simple(_)) => {
                        self.command.append(" CROSS JOIN ");
                        self.table_source(info)?;
                    }
                    (semantics, _) => {
                        let dialect = self.dialect;
                        let keyword = dialect.apply_keyword(semantics);
                        let suffix = dialect.apply_suffix(semantics);
                        self.command.append(" ");
                        self.command.append(keyword);
                        self.command.append(" ");
                        self.table_source(info)?;
                        self.command.append(suffix);
                    }
                }
            }
            self.joins(appended.table)?;
        }
        Ok(())
    }

    /// Joins hanging off `table`, depth-first in insertion order.
    fn joins(&mut self, table: TableId) -> CompileResult<()> {
        let tables = self.tables;
        for &join_id in tables.table(table).joins() {
            let join = tables.join(join_id);
            let JoinInfo::Resolved(resolved) = &join.info else {
                return Err(CompileError::InvalidStatement(format!(
                    "Join of {} was not resolved",
                    table
                )));
            };
            let Some(condition) = &join.condition else {
                return Err(CompileError::InvalidStatement(format!(
                    "Join of {} has no condition",
                    table
                )));
            };
            self.command.append(match join.semantics {
                JoinSemantics::Left => " LEFT OUTER JOIN ",
                JoinSemantics::Inner => " INNER JOIN ",
            });
            self.table_source(&resolved.foreign)?;
            self.command.append(" ON ");
            self.predicate(condition)?;
            self.joins(join.joined_table)?;
        }
        Ok(())
    }

    fn table_source(&mut self, info: &TableInfo) -> CompileResult<()> {
        match info {
            TableInfo::Simple(simple) => {
                self.command.append_identifier(&simple.table_name);
                self.command.append(" AS ");
                self.command.append_identifier(&simple.alias);
            }
            TableInfo::SubStatement(sub) => {
                self.command.append("(");
                self.statement(&sub.statement)?;
                self.command.append(") AS ");
                self.command.append_identifier(&sub.alias);
            }
            TableInfo::JoinedGrouping(grouping) => {
                self.command.append("(");
                self.statement(&grouping.statement)?;
                self.command.append(") AS ");
                self.command.append_identifier(&grouping.alias);
            }
            other => {
                return Err(CompileError::InvalidStatement(format!(
                    "Table reached SQL generation unresolved: {}",
                    other.describe()
                )));
            }
        }
        Ok(())
    }

    fn resolved_info(&self, table: TableId) -> CompileResult<&'a TableInfo> {
        let tables: &'a _ = self.tables;
        tables.table_info(table).ok_or_else(|| {
            CompileError::InvalidStatement(format!("{} has an unresolved join", table))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CompileError;
    use crate::generate::{generate, PostgresGenerator, SqlServerGenerator};
    use crate::query::{OrderDirection, ValueType};
    use crate::sql::{
        AppendedTable, DataInfo, JoinInfo, JoinSemantics, ResolvedJoinInfo, SimpleTableInfo,
        SqlColumn, SqlEntity, SqlExpr, SqlOrdering, SqlStatement, SubStatementTableInfo,
        TableArena, TableId, TableInfo,
    };
    use pretty_assertions::assert_eq;

    fn customer(alias: &str) -> SqlEntity {
        let id = SqlColumn::definition(ValueType::Int32, alias, "ID", true);
        let name = SqlColumn::definition(ValueType::String, alias, "Name", false);
        SqlEntity::definition(ValueType::entity("Customer"), alias, id.clone(), vec![id, name])
    }

    fn simple(arena: &mut TableArena, table: &str, alias: &str, entity: &str) -> TableId {
        arena.add_table(
            TableInfo::Simple(SimpleTableInfo {
                item_type: ValueType::entity(entity),
                table_name: table.to_string(),
                alias: alias.to_string(),
            }),
            JoinSemantics::Inner,
        )
    }

    fn select(projection: SqlExpr, tables: Vec<AppendedTable>) -> SqlStatement {
        SqlStatement {
            data_info: DataInfo::sequence(projection.ty()),
            select_projection: projection,
            tables,
            where_condition: None,
            group_by: None,
            orderings: vec![],
            top: None,
            is_distinct: false,
            row_number_selector: None,
            row_number_offset: None,
            set_operations: vec![],
        }
    }

    fn appended(table: TableId, semantics: JoinSemantics) -> AppendedTable {
        AppendedTable { table, semantics }
    }

    #[test]
    fn test_plain_select() {
        let mut arena = TableArena::new();
        let t0 = simple(&mut arena, "Customers", "t0", "Customer");
        let statement = select(SqlExpr::Entity(customer("t0")), vec![appended(t0, JoinSemantics::Inner)]);
        let command = generate(&statement, &arena, &SqlServerGenerator).unwrap();
        assert_eq!(command.command_text, "SELECT [t0].[ID], [t0].[Name] FROM [Customers] AS [t0]");
        assert!(command.parameters.is_empty());
    }

    #[test]
    fn test_top_distinct_and_order() {
        let mut arena = TableArena::new();
        let t0 = simple(&mut arena, "Customers", "t0", "Customer");
        let name = SqlExpr::Column(SqlColumn::definition(ValueType::String, "t0", "Name", false));
        let mut statement = select(name.clone(), vec![appended(t0, JoinSemantics::Inner)]);
        statement.is_distinct = true;
        statement.top = Some(SqlExpr::constant(5, ValueType::Int32));
        statement.orderings = vec![SqlOrdering {
            expr: name,
            direction: OrderDirection::Desc,
        }];

        let command = generate(&statement, &arena, &SqlServerGenerator).unwrap();
        assert_eq!(
            command.command_text,
            "SELECT DISTINCT TOP (@1) [t0].[Name] AS [value] FROM [Customers] AS [t0] ORDER BY [t0].[Name] DESC"
        );

        let command = generate(&statement, &arena, &PostgresGenerator).unwrap();
        assert_eq!(
            command.command_text,
            "SELECT DISTINCT \"t0\".\"Name\" AS \"value\" FROM \"Customers\" AS \"t0\" ORDER BY \"t0\".\"Name\" DESC LIMIT $1"
        );
    }

    #[test]
    fn test_record_members_are_prefixed() {
        let mut arena = TableArena::new();
        let t0 = simple(&mut arena, "Customers", "t0", "Customer");
        let projection = SqlExpr::New {
            members: vec![
                ("C".to_string(), SqlExpr::Entity(customer("t0"))),
                ("Flag".to_string(), SqlExpr::bool_literal(true)),
            ],
            ty: ValueType::Record("CFlag".to_string()),
        };
        let statement = select(projection, vec![appended(t0, JoinSemantics::Inner)]);
        let command = generate(&statement, &arena, &SqlServerGenerator).unwrap();
        assert_eq!(
            command.command_text,
            "SELECT [t0].[ID] AS [C_ID], [t0].[Name] AS [C_Name], 1 AS [Flag] FROM [Customers] AS [t0]"
        );
    }

    #[test]
    fn test_empty_projection_is_invalid() {
        let mut arena = TableArena::new();
        let t0 = simple(&mut arena, "Customers", "t0", "Customer");
        let projection = SqlExpr::New {
            members: vec![],
            ty: ValueType::Record("Empty".to_string()),
        };
        let statement = select(projection, vec![appended(t0, JoinSemantics::Inner)]);
        let result = generate(&statement, &arena, &SqlServerGenerator);
        assert!(matches!(result, Err(CompileError::InvalidStatement(_))));
    }

    #[test]
    fn test_table_separators_follow_semantics() {
        let mut arena = TableArena::new();
        let t0 = simple(&mut arena, "Customers", "t0", "Customer");
        let t1 = simple(&mut arena, "Customers", "t1", "Customer");
        let inner = select(SqlExpr::Entity(customer("t1")), vec![appended(t1, JoinSemantics::Inner)]);
        let q0 = arena.add_table(
            TableInfo::SubStatement(SubStatementTableInfo {
                alias: "q0".to_string(),
                statement: Box::new(inner),
            }),
            JoinSemantics::Left,
        );
        let t2 = simple(&mut arena, "Customers", "t2", "Customer");

        let id = SqlExpr::Column(SqlColumn::definition(ValueType::Int32, "t0", "ID", true));
        let statement = select(
            id,
            vec![
                appended(t0, JoinSemantics::Inner),
                appended(q0, JoinSemantics::Left),
                appended(t2, JoinSemantics::Inner),
            ],
        );
        let command = generate(&statement, &arena, &SqlServerGenerator).unwrap();
        assert_eq!(
            command.command_text,
            "SELECT [t0].[ID] AS [value] FROM [Customers] AS [t0] \
             OUTER APPLY (SELECT [t1].[ID], [t1].[Name] FROM [Customers] AS [t1]) AS [q0] \
             CROSS JOIN [Customers] AS [t2]"
        );

        let command = generate(&statement, &arena, &PostgresGenerator).unwrap();
        assert!(command.command_text.contains("LEFT JOIN LATERAL (SELECT"));
        assert!(command.command_text.contains(") AS \"q0\" ON TRUE CROSS JOIN"));
    }

    #[test]
    fn test_joins_render_after_their_table() {
        let mut arena = TableArena::new();
        let t0 = simple(&mut arena, "Orders", "t0", "Order");
        let foreign = TableInfo::Simple(SimpleTableInfo {
            item_type: ValueType::entity("Customer"),
            table_name: "Customers".to_string(),
            alias: "t1".to_string(),
        });
        let left_key = SqlExpr::Column(SqlColumn::definition(ValueType::Int32.nullable(), "t0", "CustomerID", false));
        let right_key = SqlExpr::Column(SqlColumn::definition(ValueType::Int32, "t1", "ID", true));
        let join = arena.get_or_add_join(
            t0,
            "Customer",
            JoinInfo::Resolved(ResolvedJoinInfo {
                foreign: Box::new(foreign),
                left_key: left_key.clone(),
                right_key: right_key.clone(),
            }),
            JoinSemantics::Left,
        );
        arena.set_join_condition(join, SqlExpr::equal(left_key, right_key));

        let name = SqlExpr::Column(SqlColumn::definition(ValueType::String, "t1", "Name", false));
        let statement = select(name, vec![appended(t0, JoinSemantics::Inner)]);
        let command = generate(&statement, &arena, &SqlServerGenerator).unwrap();
        assert_eq!(
            command.command_text,
            "SELECT [t1].[Name] AS [value] FROM [Orders] AS [t0] \
             LEFT OUTER JOIN [Customers] AS [t1] ON [t0].[CustomerID] = [t1].[ID]"
        );
    }

    #[test]
    fn test_unresolved_table_is_invalid() {
        let mut arena = TableArena::new();
        let t0 = arena.add_table(
            TableInfo::Unresolved(crate::sql::UnresolvedTableInfo {
                item_type: ValueType::entity("Customer"),
            }),
            JoinSemantics::Inner,
        );
        let statement = select(SqlExpr::int_literal(1), vec![appended(t0, JoinSemantics::Inner)]);
        let result = generate(&statement, &arena, &SqlServerGenerator);
        assert!(matches!(result, Err(CompileError::InvalidStatement(_))));
    }
}
