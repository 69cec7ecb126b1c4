//! SQL statement model: the intermediate representation shared by the
//! preparation, resolution and generation stages.

pub mod expr;
pub mod statement;
pub mod table;

pub use expr::{
    reference_of, AggregationKind, SqlBinaryOp, SqlCaseWhen, SqlColumn, SqlEntity, SqlExpr, TextPart,
};
pub use statement::{
    AppendedTable, DataInfo, SetOperation, SetOperationCombinedStatement, SqlOrdering, SqlQuery,
    SqlStatement, SqlStatementBuilder,
};
pub use table::{
    Cardinality, JoinId, JoinInfo, JoinSemantics, JoinedGroupingTableInfo, ResolvedJoinInfo,
    SimpleTableInfo, SqlJoin, SqlTable, SubStatementTableInfo, TableArena, TableId, TableInfo,
    TableKind, UnresolvedJoinInfo, UnresolvedTableInfo,
};
