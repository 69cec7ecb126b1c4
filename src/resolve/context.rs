use crate::sql::{JoinId, SqlExpr, TableId};
use std::collections::{HashMap, HashSet};

/// Bookkeeping of one resolution run: which tables and joins are already
/// resolved, and join conditions waiting for the statement that owns a
/// collection-join table.
#[derive(Debug, Default)]
pub struct MappingResolutionContext {
    resolved_tables: HashSet<TableId>,
    resolved_joins: HashSet<JoinId>,
    pending_conditions: HashMap<TableId, SqlExpr>,
}

impl MappingResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_table_resolved(&self, table: TableId) -> bool {
        self.resolved_tables.contains(&table)
    }

    pub fn mark_table_resolved(&mut self, table: TableId) {
        self.resolved_tables.insert(table);
    }

    pub fn is_join_resolved(&self, join: JoinId) -> bool {
        self.resolved_joins.contains(&join)
    }

    pub fn mark_join_resolved(&mut self, join: JoinId) {
        self.resolved_joins.insert(join);
    }

    pub fn add_pending_condition(&mut self, table: TableId, condition: SqlExpr) {
        self.pending_conditions.insert(table, condition);
    }

    pub fn take_pending_condition(&mut self, table: TableId) -> Option<SqlExpr> {
        self.pending_conditions.remove(&table)
    }
}
