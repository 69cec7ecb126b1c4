//! Tables and joins of the SQL statement model.
//!
//! Tables and joins live in a [`TableArena`] shared by all statements of one
//! compiled query; statements and expressions refer to them by id. Refining a
//! table or join (during mapping resolution) replaces the slot's content,
//! which keeps every reference pointing at the refined version.

use super::expr::{SqlEntity, SqlExpr};
use super::statement::SqlStatement;
use crate::error::{CompileError, CompileResult};
use crate::query::ValueType;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinId(pub(crate) usize);

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// Whether unmatched rows are dropped (`Inner`) or null-padded (`Left`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinSemantics {
    #[default]
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedTableInfo {
    pub item_type: ValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTableInfo {
    pub item_type: ValueType,
    pub table_name: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubStatementTableInfo {
    pub alias: String,
    pub statement: Box<SqlStatement>,
}

/// The rows of one group of a grouped sub-statement, re-selected as a
/// correlated derived table.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedGroupingTableInfo {
    pub alias: String,
    pub statement: Box<SqlStatement>,
    pub group_source_alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableInfo {
    Unresolved(UnresolvedTableInfo),
    /// `from x in g` where `g` is the item of a grouping table.
    UnresolvedGroupReference {
        item_type: ValueType,
        group_source: TableId,
    },
    /// `from o in c.Orders`: a table reached through a collection member.
    UnresolvedJoin {
        item_type: ValueType,
        join: Box<JoinInfo>,
    },
    Simple(SimpleTableInfo),
    SubStatement(SubStatementTableInfo),
    JoinedGrouping(JoinedGroupingTableInfo),
}

impl TableInfo {
    pub fn item_type(&self) -> ValueType {
        match self {
            TableInfo::Unresolved(info) => info.item_type.clone(),
            TableInfo::UnresolvedGroupReference { item_type, .. }
            | TableInfo::UnresolvedJoin { item_type, .. } => item_type.clone(),
            TableInfo::Simple(info) => info.item_type.clone(),
            TableInfo::SubStatement(info) => info.statement.data_info.item_type(),
            TableInfo::JoinedGrouping(info) => info.statement.data_info.item_type(),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            TableInfo::Simple(info) => Some(&info.alias),
            TableInfo::SubStatement(info) => Some(&info.alias),
            TableInfo::JoinedGrouping(info) => Some(&info.alias),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            TableInfo::Simple(_) | TableInfo::SubStatement(_) | TableInfo::JoinedGrouping(_)
        )
    }

    pub fn describe(&self) -> String {
        match self {
            TableInfo::Unresolved(info) => format!("unresolved table of {}", info.item_type),
            TableInfo::UnresolvedGroupReference { item_type, .. } => {
                format!("unresolved group reference of {}", item_type)
            }
            TableInfo::UnresolvedJoin { item_type, .. } => {
                format!("unresolved collection join of {}", item_type)
            }
            TableInfo::Simple(info) => format!("[{}] AS [{}]", info.table_name, info.alias),
            TableInfo::SubStatement(info) => format!("sub-statement [{}]", info.alias),
            TableInfo::JoinedGrouping(info) => format!("joined grouping [{}]", info.alias),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    One,
    Many,
}

/// Navigation from an entity over a relation member, not yet mapped.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedJoinInfo {
    pub originating: SqlEntity,
    pub member: String,
    pub cardinality: Cardinality,
    pub item_type: ValueType,
}

/// A mapped join: the foreign table plus the key columns to equate.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJoinInfo {
    pub foreign: Box<TableInfo>,
    pub left_key: SqlExpr,
    pub right_key: SqlExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinInfo {
    Unresolved(UnresolvedJoinInfo),
    /// Collection member of an expression that has not been resolved to an
    /// entity yet.
    UnresolvedCollection {
        source: SqlExpr,
        member: String,
        item_type: ValueType,
    },
    Resolved(ResolvedJoinInfo),
}

impl JoinInfo {
    pub fn item_type(&self) -> ValueType {
        match self {
            JoinInfo::Unresolved(info) => info.item_type.clone(),
            JoinInfo::UnresolvedCollection { item_type, .. } => item_type.clone(),
            JoinInfo::Resolved(info) => info.foreign.item_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableKind {
    /// A table with its own table info.
    Plain(TableInfo),
    /// A table reached through a join; its table info is the join's foreign
    /// table once the join is resolved.
    Joined(JoinId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlTable {
    pub kind: TableKind,
    pub semantics: JoinSemantics,
    joins: Vec<JoinId>,
    joins_by_member: HashMap<String, JoinId>,
}

impl SqlTable {
    fn new(kind: TableKind, semantics: JoinSemantics) -> Self {
        Self {
            kind,
            semantics,
            joins: Vec::new(),
            joins_by_member: HashMap::new(),
        }
    }

    /// Joins in insertion order.
    pub fn joins(&self) -> &[JoinId] {
        &self.joins
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlJoin {
    pub joined_table: TableId,
    pub semantics: JoinSemantics,
    pub info: JoinInfo,
    /// Filled during mapping resolution.
    pub condition: Option<SqlExpr>,
}

/// Owner of all tables and joins of one compiled query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableArena {
    tables: Vec<SqlTable>,
    joins: Vec<SqlJoin>,
}

impl TableArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, info: TableInfo, semantics: JoinSemantics) -> TableId {
        self.tables.push(SqlTable::new(TableKind::Plain(info), semantics));
        TableId(self.tables.len() - 1)
    }

    pub fn table(&self, id: TableId) -> &SqlTable {
        &self.tables[id.0]
    }

    pub fn join(&self, id: JoinId) -> &SqlJoin {
        &self.joins[id.0]
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Table info of a table; `None` for a joined table whose join is not
    /// resolved yet.
    pub fn table_info(&self, id: TableId) -> Option<&TableInfo> {
        match &self.table(id).kind {
            TableKind::Plain(info) => Some(info),
            TableKind::Joined(join) => match &self.join(*join).info {
                JoinInfo::Resolved(resolved) => Some(&resolved.foreign),
                _ => None,
            },
        }
    }

    pub fn item_type(&self, id: TableId) -> ValueType {
        match &self.table(id).kind {
            TableKind::Plain(info) => info.item_type(),
            TableKind::Joined(join) => self.join(*join).info.item_type(),
        }
    }

    /// Refines a plain table's info. The item type must not change.
    pub fn set_table_info(&mut self, id: TableId, info: TableInfo) -> CompileResult<()> {
        let table = &mut self.tables[id.0];
        match &mut table.kind {
            TableKind::Plain(current) => {
                check_item_type(&current.item_type(), &info.item_type(), &current.describe())?;
                *current = info;
                Ok(())
            }
            TableKind::Joined(_) => Err(CompileError::invalid(format!(
                "{} is a joined table; its table info comes from its join",
                id
            ))),
        }
    }

    /// Returns the join of `table` over `member`, creating it (and the joined
    /// table) on first use. Repeated calls with the same member return the
    /// same join.
    pub fn get_or_add_join(
        &mut self,
        table: TableId,
        member: &str,
        info: JoinInfo,
        semantics: JoinSemantics,
    ) -> JoinId {
        if let Some(existing) = self.tables[table.0].joins_by_member.get(member) {
            return *existing;
        }

        let join_id = JoinId(self.joins.len());
        self.tables.push(SqlTable::new(TableKind::Joined(join_id), semantics));
        let joined_table = TableId(self.tables.len() - 1);
        self.joins.push(SqlJoin {
            joined_table,
            semantics,
            info,
            condition: None,
        });

        let owner = &mut self.tables[table.0];
        owner.joins.push(join_id);
        owner.joins_by_member.insert(member.to_string(), join_id);
        join_id
    }

    /// Refines a join's info. The item type must not change.
    pub fn set_join_info(&mut self, id: JoinId, info: JoinInfo) -> CompileResult<()> {
        let join = &mut self.joins[id.0];
        check_item_type(&join.info.item_type(), &info.item_type(), "join")?;
        join.info = info;
        Ok(())
    }

    pub fn set_join_condition(&mut self, id: JoinId, condition: SqlExpr) {
        self.joins[id.0].condition = Some(condition);
    }

    /// The table owning `alias`, searching resolved table infos.
    pub fn find_by_alias(&self, alias: &str) -> Option<TableId> {
        (0..self.tables.len())
            .map(TableId)
            .find(|id| self.table_info(*id).and_then(TableInfo::alias) == Some(alias))
    }
}

fn check_item_type(expected: &ValueType, actual: &ValueType, context: &str) -> CompileResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CompileError::ArgumentTypeMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}
