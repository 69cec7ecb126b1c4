//! SQL statements and their builder.

use super::expr::{SqlBinaryOp, SqlExpr};
use super::table::{JoinSemantics, TableArena, TableId};
use crate::error::{CompileError, CompileResult};
use crate::query::{OrderDirection, ValueType};

/// Result shape of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum DataInfo {
    Sequence {
        item_type: ValueType,
    },
    /// At most one row (`First`, `Single`).
    SingleValue {
        item_type: ValueType,
        return_default_when_empty: bool,
    },
    /// Exactly one value (`Count`, `Sum`, `Any`).
    Scalar { ty: ValueType },
}

impl DataInfo {
    pub fn sequence(item_type: ValueType) -> Self {
        DataInfo::Sequence { item_type }
    }

    /// Type of the statement when used as an expression.
    pub fn data_type(&self) -> ValueType {
        match self {
            DataInfo::Sequence { item_type } => ValueType::sequence_of(item_type.clone()),
            DataInfo::SingleValue { item_type, .. } => item_type.clone(),
            DataInfo::Scalar { ty } => ty.clone(),
        }
    }

    /// Type of one row.
    pub fn item_type(&self) -> ValueType {
        match self {
            DataInfo::Sequence { item_type } | DataInfo::SingleValue { item_type, .. } => {
                item_type.clone()
            }
            DataInfo::Scalar { ty } => ty.clone(),
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, DataInfo::Sequence { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    Union,
    UnionAll,
}

impl std::fmt::Display for SetOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetOperation::Union => write!(f, "UNION"),
            SetOperation::UnionAll => write!(f, "UNION ALL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOperationCombinedStatement {
    pub statement: SqlStatement,
    pub operation: SetOperation,
}

/// A table in a statement's FROM list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendedTable {
    pub table: TableId,
    pub semantics: JoinSemantics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlOrdering {
    pub expr: SqlExpr,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub data_info: DataInfo,
    pub select_projection: SqlExpr,
    pub tables: Vec<AppendedTable>,
    pub where_condition: Option<SqlExpr>,
    pub group_by: Option<SqlExpr>,
    pub orderings: Vec<SqlOrdering>,
    pub top: Option<SqlExpr>,
    pub is_distinct: bool,
    pub row_number_selector: Option<SqlExpr>,
    pub row_number_offset: Option<SqlExpr>,
    pub set_operations: Vec<SetOperationCombinedStatement>,
}

impl SqlStatement {
    pub fn table_ids(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.iter().map(|t| t.table)
    }
}

/// A compiled query: the outermost statement plus the arena owning every
/// table and join referenced from it (and from its nested statements).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub tables: TableArena,
    pub statement: SqlStatement,
}

/// Mutable counterpart of [`SqlStatement`] used while a statement is being
/// assembled.
#[derive(Debug, Clone, Default)]
pub struct SqlStatementBuilder {
    pub data_info: Option<DataInfo>,
    pub select_projection: Option<SqlExpr>,
    pub tables: Vec<AppendedTable>,
    pub where_condition: Option<SqlExpr>,
    pub group_by: Option<SqlExpr>,
    pub orderings: Vec<SqlOrdering>,
    pub top: Option<SqlExpr>,
    pub is_distinct: bool,
    pub row_number_selector: Option<SqlExpr>,
    pub row_number_offset: Option<SqlExpr>,
    pub set_operations: Vec<SetOperationCombinedStatement>,
}

impl SqlStatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-filled with the fields of `statement`.
    pub fn from_statement(statement: SqlStatement) -> Self {
        Self {
            data_info: Some(statement.data_info),
            select_projection: Some(statement.select_projection),
            tables: statement.tables,
            where_condition: statement.where_condition,
            group_by: statement.group_by,
            orderings: statement.orderings,
            top: statement.top,
            is_distinct: statement.is_distinct,
            row_number_selector: statement.row_number_selector,
            row_number_offset: statement.row_number_offset,
            set_operations: statement.set_operations,
        }
    }

    /// ANDs `condition` into the where condition.
    pub fn add_where_condition(&mut self, condition: SqlExpr) {
        self.where_condition = Some(match self.where_condition.take() {
            Some(existing) => SqlExpr::binary(SqlBinaryOp::And, existing, condition),
            None => condition,
        });
    }

    pub fn add_table(&mut self, table: TableId, semantics: JoinSemantics) {
        self.tables.push(AppendedTable { table, semantics });
    }

    pub fn projection_type(&self) -> Option<ValueType> {
        self.select_projection.as_ref().map(SqlExpr::ty)
    }

    /// Regenerates a sequence or single-value data info after the projection
    /// changed from `previous_projection_type`. Scalar results are kept.
    pub fn recalculate_data_info(&mut self, previous_projection_type: &ValueType) {
        let Some(current) = self.projection_type() else {
            return;
        };
        if &current == previous_projection_type {
            return;
        }
        self.data_info = match self.data_info.take() {
            Some(DataInfo::Sequence { .. }) => Some(DataInfo::Sequence { item_type: current }),
            Some(DataInfo::SingleValue {
                return_default_when_empty,
                ..
            }) => Some(DataInfo::SingleValue {
                item_type: current,
                return_default_when_empty,
            }),
            other => other,
        };
    }

    /// Snapshot of the current state.
    pub fn build(&self) -> CompileResult<SqlStatement> {
        self.clone().into_statement()
    }

    /// Returns the built statement and leaves the builder empty.
    pub fn get_statement_and_reset(&mut self) -> CompileResult<SqlStatement> {
        std::mem::take(self).into_statement()
    }

    fn into_statement(self) -> CompileResult<SqlStatement> {
        let data_info = self
            .data_info
            .ok_or_else(|| CompileError::invalid("A DataInfo must be set before the statement is built"))?;
        let select_projection = self.select_projection.ok_or_else(|| {
            CompileError::invalid("A SelectProjection must be set before the statement is built")
        })?;
        if let Some(condition) = &self.where_condition {
            if !condition.ty().is_bool() {
                return Err(CompileError::invalid(format!(
                    "The where condition must be boolean, got '{}'",
                    condition.ty()
                )));
            }
        }

        Ok(SqlStatement {
            data_info,
            select_projection,
            tables: self.tables,
            where_condition: self.where_condition,
            group_by: self.group_by,
            orderings: self.orderings,
            top: self.top,
            is_distinct: self.is_distinct,
            row_number_selector: self.row_number_selector,
            row_number_offset: self.row_number_offset,
            set_operations: self.set_operations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::SqlColumn;
    use pretty_assertions::assert_eq;

    fn name_column() -> SqlExpr {
        SqlExpr::Column(SqlColumn::definition(ValueType::String, "t0", "Name", false))
    }

    #[test]
    fn test_add_where_condition_ands_conditions() {
        let mut builder = SqlStatementBuilder::new();
        builder.add_where_condition(SqlExpr::bool_literal(true));
        builder.add_where_condition(SqlExpr::bool_literal(false));
        assert_eq!(
            builder.where_condition,
            Some(SqlExpr::and(SqlExpr::bool_literal(true), SqlExpr::bool_literal(false)))
        );
    }

    #[test]
    fn test_build_requires_data_info_and_projection() {
        let mut builder = SqlStatementBuilder::new();
        assert!(builder.build().is_err());
        builder.select_projection = Some(name_column());
        assert!(builder.build().is_err());
        builder.data_info = Some(DataInfo::sequence(ValueType::String));
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_build_rejects_non_boolean_where() {
        let mut builder = SqlStatementBuilder::new();
        builder.select_projection = Some(name_column());
        builder.data_info = Some(DataInfo::sequence(ValueType::String));
        builder.where_condition = Some(name_column());
        assert!(matches!(builder.build(), Err(CompileError::InvalidStatement(_))));
    }

    #[test]
    fn test_get_statement_and_reset() {
        let mut builder = SqlStatementBuilder::new();
        builder.select_projection = Some(name_column());
        builder.data_info = Some(DataInfo::sequence(ValueType::String));
        builder.is_distinct = true;

        let statement = builder.get_statement_and_reset().unwrap();
        assert!(statement.is_distinct);
        assert!(builder.select_projection.is_none());
        assert!(!builder.is_distinct);
    }

    #[test]
    fn test_recalculate_data_info() {
        let mut builder = SqlStatementBuilder::new();
        builder.data_info = Some(DataInfo::SingleValue {
            item_type: ValueType::entity("Customer"),
            return_default_when_empty: true,
        });
        builder.select_projection = Some(name_column());
        builder.recalculate_data_info(&ValueType::entity("Customer"));
        assert_eq!(
            builder.data_info,
            Some(DataInfo::SingleValue {
                item_type: ValueType::String,
                return_default_when_empty: true,
            })
        );

        builder.data_info = Some(DataInfo::Scalar { ty: ValueType::Int32 });
        builder.recalculate_data_info(&ValueType::Int64);
        assert_eq!(builder.data_info, Some(DataInfo::Scalar { ty: ValueType::Int32 }));
    }
}
