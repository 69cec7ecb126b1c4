use super::identifiers::UniqueIdentifierGenerator;
use crate::error::CompileResult;
use crate::query::{Value, ValueType};
use crate::sql::{JoinInfo, SimpleTableInfo, SqlEntity, SqlExpr, TableInfo, UnresolvedJoinInfo, UnresolvedTableInfo};

/// Maps item types and members of the query model onto a database schema.
///
/// The resolution stage calls these repeatedly until their results stop
/// changing, so an implementation may return intermediate shapes (an
/// unresolved table info, say) that are themselves resolved again.
pub trait MappingResolver: Send + Sync {
    /// Concrete table and fresh alias for the items of `info`.
    fn resolve_table_info(
        &self,
        info: &UnresolvedTableInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> CompileResult<TableInfo>;

    /// The entity (every mapped column) that a reference to a simple table
    /// stands for.
    fn resolve_simple_table(&self, info: &SimpleTableInfo) -> CompileResult<SqlEntity>;

    /// Foreign table and key columns of a navigation member.
    fn resolve_join_info(
        &self,
        info: &UnresolvedJoinInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> CompileResult<JoinInfo>;

    /// A column, or an [`SqlExpr::EntityRefMember`] for a to-one relation.
    fn resolve_member(&self, entity: &SqlEntity, member: &str) -> CompileResult<SqlExpr>;

    /// The constant itself, or an entity constant boxing its primary key.
    fn resolve_constant(&self, value: &Value, ty: &ValueType) -> CompileResult<SqlExpr>;

    /// A literal boolean when the check is decided statically, otherwise a
    /// discriminator comparison.
    fn resolve_type_check(&self, operand: &SqlExpr, target: &ValueType) -> CompileResult<SqlExpr>;
}
