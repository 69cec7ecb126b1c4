//! Mapping resolution: rewrites unresolved tables, joins and member
//! accesses into concrete tables and columns.
//!
//! Every rewrite is repeated until its result stops changing, so a resolver
//! may hand back shapes that need resolving themselves. A configurable pass
//! limit turns a resolver that never settles into [`CompileError::NonConvergent`].

use super::context::MappingResolutionContext;
use super::identifiers::UniqueIdentifierGenerator;
use super::resolver::MappingResolver;
use crate::error::{CompileError, CompileResult};
use crate::prepare::transform_member;
use crate::query::ValueType;
use crate::sql::{
    reference_of, AppendedTable, Cardinality, DataInfo, JoinId, JoinInfo, JoinSemantics,
    JoinedGroupingTableInfo, ResolvedJoinInfo, SetOperationCombinedStatement, SqlBinaryOp, SqlExpr,
    SqlOrdering, SqlStatement, SqlStatementBuilder, SubStatementTableInfo, TableArena, TableId,
    TableInfo, TableKind, UnresolvedJoinInfo,
};
use tracing::trace;

pub struct ResolutionStage<'a> {
    resolver: &'a dyn MappingResolver,
    generator: &'a mut UniqueIdentifierGenerator,
    tables: &'a mut TableArena,
    context: MappingResolutionContext,
    max_passes: usize,
}

impl<'a> ResolutionStage<'a> {
    pub fn new(
        resolver: &'a dyn MappingResolver,
        generator: &'a mut UniqueIdentifierGenerator,
        tables: &'a mut TableArena,
        max_passes: usize,
    ) -> Self {
        Self {
            resolver,
            generator,
            tables,
            context: MappingResolutionContext::new(),
            max_passes: max_passes.max(1),
        }
    }

    fn non_convergent(&self, what: &str) -> CompileError {
        CompileError::NonConvergent {
            what: what.to_string(),
            passes: self.max_passes,
        }
    }

    pub fn resolve_statement(&mut self, statement: SqlStatement) -> CompileResult<SqlStatement> {
        let SqlStatement {
            data_info,
            select_projection,
            mut tables,
            mut where_condition,
            group_by,
            orderings,
            top,
            is_distinct,
            row_number_selector,
            row_number_offset,
            set_operations,
        } = statement;

        for appended in &tables {
            self.resolve_table(appended.table)?;
            if let Some(condition) = self.context.take_pending_condition(appended.table) {
                where_condition = Some(match where_condition {
                    Some(existing) => SqlExpr::and(existing, condition),
                    None => condition,
                });
            }
        }

        let projection = self.resolve_expr(select_projection)?;
        let select_projection = self.pull_up_single_values(projection, &mut tables)?;

        let where_condition = self.resolve_optional(where_condition)?;
        let group_by = self.resolve_optional(group_by)?;
        let orderings = orderings
            .into_iter()
            .map(|o| {
                Ok(SqlOrdering {
                    expr: self.resolve_expr(o.expr)?,
                    direction: o.direction,
                })
            })
            .collect::<CompileResult<Vec<_>>>()?;
        let top = self.resolve_optional(top)?;
        let row_number_selector = self.resolve_optional(row_number_selector)?;
        let row_number_offset = self.resolve_optional(row_number_offset)?;
        let set_operations = set_operations
            .into_iter()
            .map(|s| {
                Ok(SetOperationCombinedStatement {
                    statement: self.resolve_statement(s.statement)?,
                    operation: s.operation,
                })
            })
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(SqlStatement {
            data_info,
            select_projection,
            tables,
            where_condition,
            group_by,
            orderings,
            top,
            is_distinct,
            row_number_selector,
            row_number_offset,
            set_operations,
        })
    }

    fn resolve_optional(&mut self, expr: Option<SqlExpr>) -> CompileResult<Option<SqlExpr>> {
        expr.map(|e| self.resolve_expr(e)).transpose()
    }

    /// Resolves `expr` bottom-up, re-applying the rules until the result no
    /// longer changes.
    pub fn resolve_expr(&mut self, expr: SqlExpr) -> CompileResult<SqlExpr> {
        let mut current = expr;
        for pass in 0..self.max_passes {
            let children_resolved = match current.clone() {
                SqlExpr::SubStatement(statement) => {
                    SqlExpr::SubStatement(Box::new(self.resolve_statement(*statement)?))
                }
                SqlExpr::Exists(statement) => SqlExpr::Exists(Box::new(self.resolve_statement(*statement)?)),
                other => other.map_children(&mut |child| self.resolve_expr(child), &mut |statement| Ok(statement))?,
            };
            let next = self.apply_rule(children_resolved)?;
            if next == current {
                if pass > 1 {
                    trace!(passes = pass + 1, "Expression reached a fixed point");
                }
                return Ok(next);
            }
            current = next;
        }
        Err(self.non_convergent("expression"))
    }

    fn apply_rule(&mut self, expr: SqlExpr) -> CompileResult<SqlExpr> {
        match expr {
            SqlExpr::TableRef { table, ty } => self.resolve_table_reference(table, ty),
            SqlExpr::Member { object, member, ty } => self.resolve_member_access(*object, member, ty),
            SqlExpr::EntityRefMember { entity, member, ty } => {
                let table = self.tables.find_by_alias(&entity.table_alias).ok_or_else(|| {
                    CompileError::invalid(format!(
                        "No table is aliased [{}]; cannot navigate to '{}'",
                        entity.table_alias, member
                    ))
                })?;
                let join = self.tables.get_or_add_join(
                    table,
                    &member,
                    JoinInfo::Unresolved(UnresolvedJoinInfo {
                        originating: *entity,
                        member: member.clone(),
                        cardinality: Cardinality::One,
                        item_type: ty.clone(),
                    }),
                    JoinSemantics::Left,
                );
                self.resolve_join(join)?;
                Ok(SqlExpr::TableRef {
                    table: self.tables.join(join).joined_table,
                    ty,
                })
            }
            SqlExpr::Constant { value, ty } if ty.is_entity() => {
                let resolved = self.resolver.resolve_constant(&value, &ty)?;
                trace!(value = %value, "Resolved entity constant");
                Ok(resolved)
            }
            SqlExpr::TypeCheck { operand, target } if !operand.is_unresolved() => {
                let check = self.resolver.resolve_type_check(&operand, &target)?;
                trace!(target = %target, "Resolved type check");
                Ok(check)
            }
            SqlExpr::Binary {
                op: op @ (SqlBinaryOp::Equal | SqlBinaryOp::NotEqual),
                left,
                right,
                ty,
            } if is_entity_node(&left) || is_entity_node(&right) => Ok(SqlExpr::Binary {
                op,
                left: Box::new(identity_of(*left)),
                right: Box::new(identity_of(*right)),
                ty,
            }),
            SqlExpr::Convert { operand, ty } if ty.is_entity() && matches!(*operand, SqlExpr::Entity(_)) => {
                match *operand {
                    SqlExpr::Entity(entity) => Ok(SqlExpr::Entity(entity.with_type(ty))),
                    other => Ok(SqlExpr::convert(other, ty)),
                }
            }
            SqlExpr::In { item, collection } if is_entity_node(&item) => Ok(SqlExpr::In {
                item: Box::new(identity_of(*item)),
                collection: Box::new(identities_of(*collection)),
            }),
            other => Ok(other),
        }
    }

    fn resolve_table_reference(&mut self, table: TableId, ty: ValueType) -> CompileResult<SqlExpr> {
        self.resolve_table(table)?;
        match self.tables.table_info(table) {
            Some(TableInfo::Simple(info)) => {
                let entity = self.resolver.resolve_simple_table(info)?;
                trace!(table = %info.table_name, alias = %info.alias, "Resolved table reference");
                Ok(SqlExpr::Entity(entity))
            }
            Some(TableInfo::SubStatement(SubStatementTableInfo { alias, statement }))
            | Some(TableInfo::JoinedGrouping(JoinedGroupingTableInfo { alias, statement, .. })) => {
                Ok(reference_of(&statement.select_projection, alias, None))
            }
            Some(other) => Err(CompileError::invalid(format!(
                "A reference of type '{}' points at the {}",
                ty,
                other.describe()
            ))),
            None => Err(CompileError::invalid(format!("The join producing {} is not resolved", table))),
        }
    }

    fn resolve_member_access(&mut self, object: SqlExpr, member: String, ty: ValueType) -> CompileResult<SqlExpr> {
        match object {
            SqlExpr::Entity(entity) => {
                let resolved = self.resolver.resolve_member(&entity, &member)?;
                trace!(entity = %entity.ty, member = %member, "Resolved member");
                Ok(resolved)
            }
            object if object.is_unresolved() => Ok(SqlExpr::Member {
                object: Box::new(object),
                member,
                ty,
            }),
            object => match transform_member(object, &member, &ty)? {
                SqlExpr::Member { object, member, .. } => Err(CompileError::unsupported(
                    member.clone(),
                    format!("The member '{}' of type '{}' cannot be translated to SQL", member, object.ty()),
                )),
                resolved => Ok(resolved),
            },
        }
    }

    /// Resolves the info of `id` once per run.
    fn resolve_table(&mut self, id: TableId) -> CompileResult<()> {
        if self.context.is_table_resolved(id) {
            return Ok(());
        }
        match self.tables.table(id).kind.clone() {
            TableKind::Joined(join) => self.resolve_join(join)?,
            TableKind::Plain(info) => {
                let (resolved, condition) = self.resolve_table_info(info)?;
                self.tables.set_table_info(id, resolved)?;
                if let Some(condition) = condition {
                    self.context.add_pending_condition(id, condition);
                }
            }
        }
        self.context.mark_table_resolved(id);
        Ok(())
    }

    /// Resolves a table info to a fixed point. Collection joins also yield the
    /// key equality the owning statement must filter on.
    fn resolve_table_info(&mut self, info: TableInfo) -> CompileResult<(TableInfo, Option<SqlExpr>)> {
        let mut current = info;
        let mut condition = None;
        for _ in 0..self.max_passes {
            current = match current {
                TableInfo::Unresolved(unresolved) => {
                    let resolved = self.resolver.resolve_table_info(&unresolved, self.generator)?;
                    trace!(item_type = %unresolved.item_type, resolved = %resolved.describe(), "Resolved table info");
                    if matches!(&resolved, TableInfo::Unresolved(again) if *again == unresolved) {
                        return Ok((resolved, condition));
                    }
                    resolved
                }
                TableInfo::UnresolvedJoin { join, .. } => {
                    let resolved = self.resolve_join_info(*join)?;
                    condition = Some(SqlExpr::equal(resolved.left_key, resolved.right_key));
                    *resolved.foreign
                }
                TableInfo::UnresolvedGroupReference { item_type, group_source } => {
                    self.resolve_group_reference(item_type, group_source)?
                }
                TableInfo::SubStatement(info) => {
                    let statement = self.resolve_statement(*info.statement)?;
                    return Ok((
                        TableInfo::SubStatement(SubStatementTableInfo {
                            alias: info.alias,
                            statement: Box::new(statement),
                        }),
                        condition,
                    ));
                }
                resolved @ (TableInfo::Simple(_) | TableInfo::JoinedGrouping(_)) => {
                    return Ok((resolved, condition));
                }
            };
        }
        Err(self.non_convergent("table info"))
    }

    /// Resolves a join info to a fixed point.
    fn resolve_join_info(&mut self, info: JoinInfo) -> CompileResult<ResolvedJoinInfo> {
        let mut current = info;
        for _ in 0..self.max_passes {
            current = match current {
                JoinInfo::Unresolved(unresolved) => {
                    let resolved = self.resolver.resolve_join_info(&unresolved, self.generator)?;
                    trace!(member = %unresolved.member, "Resolved join info");
                    if matches!(&resolved, JoinInfo::Unresolved(again) if *again == unresolved) {
                        return Err(CompileError::UnmappedItem(format!(
                            "The member '{}.{}' could not be mapped to a join",
                            unresolved.originating.ty, unresolved.member
                        )));
                    }
                    resolved
                }
                JoinInfo::UnresolvedCollection {
                    source,
                    member,
                    item_type,
                } => match self.resolve_expr(source)? {
                    SqlExpr::Entity(entity) => JoinInfo::Unresolved(UnresolvedJoinInfo {
                        originating: entity,
                        member,
                        cardinality: Cardinality::Many,
                        item_type,
                    }),
                    other => {
                        let message = format!(
                            "The collection member '{}' of type '{}' cannot be used as a query source",
                            member,
                            other.ty()
                        );
                        return Err(CompileError::unsupported(member, message));
                    }
                },
                JoinInfo::Resolved(mut resolved) => {
                    let (foreign, _) = self.resolve_table_info(*resolved.foreign)?;
                    resolved.foreign = Box::new(foreign);
                    return Ok(resolved);
                }
            };
        }
        Err(self.non_convergent("join info"))
    }

    /// Resolves a join once per run and fills in its condition.
    fn resolve_join(&mut self, id: JoinId) -> CompileResult<()> {
        if self.context.is_join_resolved(id) {
            return Ok(());
        }
        let info = self.tables.join(id).info.clone();
        let resolved = self.resolve_join_info(info)?;
        let condition = SqlExpr::equal(resolved.left_key.clone(), resolved.right_key.clone());
        self.tables.set_join_info(id, JoinInfo::Resolved(resolved))?;
        self.tables.set_join_condition(id, condition);
        self.context.mark_join_resolved(id);
        let joined = self.tables.join(id).joined_table;
        self.context.mark_table_resolved(joined);
        Ok(())
    }

    /// `from x in g`: re-selects the elements of the current group of `g`.
    fn resolve_group_reference(&mut self, item_type: ValueType, group_source: TableId) -> CompileResult<TableInfo> {
        self.resolve_table(group_source)?;
        let Some(TableInfo::SubStatement(source)) = self.tables.table_info(group_source).cloned() else {
            return Err(CompileError::invalid(format!(
                "The group reference of type '{}' does not point at a grouped sub-statement",
                item_type
            )));
        };
        let SqlExpr::GroupingSelect { key, element, .. } = source.statement.select_projection.clone() else {
            return Err(CompileError::invalid(format!(
                "The sub-statement [{}] is not grouped",
                source.alias
            )));
        };

        let mut builder = SqlStatementBuilder::from_statement(*source.statement);
        builder.data_info = Some(DataInfo::sequence(element.ty()));
        builder.select_projection = Some(*element);
        builder.group_by = None;
        builder.top = None;
        builder.is_distinct = false;
        builder.orderings.clear();
        let outer_key = reference_of(&key, &source.alias, Some("key"));
        builder.add_where_condition(key_equality(*key, outer_key));
        let statement = builder.get_statement_and_reset()?;

        Ok(TableInfo::JoinedGrouping(JoinedGroupingTableInfo {
            alias: self.generator.sub_statement_alias(),
            statement: Box::new(statement),
            group_source_alias: source.alias,
        }))
    }

    /// Moves single-value sub-statements of a projection into the FROM list.
    fn pull_up_single_values(&mut self, expr: SqlExpr, tables: &mut Vec<AppendedTable>) -> CompileResult<SqlExpr> {
        match expr {
            SqlExpr::SubStatement(statement) if matches!(statement.data_info, DataInfo::SingleValue { .. }) => {
                let semantics = match statement.data_info {
                    DataInfo::SingleValue {
                        return_default_when_empty: true,
                        ..
                    } => JoinSemantics::Left,
                    _ => JoinSemantics::Inner,
                };
                let alias = self.generator.sub_statement_alias();
                let reference = reference_of(&statement.select_projection, &alias, None);
                let table = self.tables.add_table(TableInfo::SubStatement(SubStatementTableInfo { alias, statement }), semantics);
                self.context.mark_table_resolved(table);
                tables.push(AppendedTable { table, semantics });
                Ok(reference)
            }
            SqlExpr::SubStatement(_) | SqlExpr::Exists(_) => Ok(expr),
            other => other.map_children(&mut |child| self.pull_up_single_values(child, tables), &mut |statement| Ok(statement)),
        }
    }
}

fn is_entity_node(expr: &SqlExpr) -> bool {
    matches!(expr, SqlExpr::Entity(_) | SqlExpr::EntityConstant { .. })
}

/// Entities compare through their primary keys.
fn identity_of(expr: SqlExpr) -> SqlExpr {
    match expr {
        SqlExpr::Entity(entity) => SqlExpr::Column(entity.primary_key),
        SqlExpr::EntityConstant { primary_key, .. } => *primary_key,
        other => other,
    }
}

fn identities_of(collection: SqlExpr) -> SqlExpr {
    match collection {
        SqlExpr::Collection { items, ty } => SqlExpr::Collection {
            items: items.into_iter().map(identity_of).collect(),
            ty,
        },
        SqlExpr::SubStatement(mut statement) => {
            let projection = std::mem::replace(&mut statement.select_projection, SqlExpr::bool_literal(false));
            statement.select_projection = identity_of(projection);
            SqlExpr::SubStatement(statement)
        }
        other => other,
    }
}

/// Equality of a grouping key with its projected counterpart.
fn key_equality(key: SqlExpr, outer: SqlExpr) -> SqlExpr {
    match (key, outer) {
        (SqlExpr::New { members, .. }, SqlExpr::New { members: outer_members, .. }) => members
            .into_iter()
            .zip(outer_members)
            .map(|((_, k), (_, o))| key_equality(k, o))
            .reduce(SqlExpr::and)
            .unwrap_or_else(|| SqlExpr::bool_literal(true)),
        (key, outer) => SqlExpr::equal(identity_of(key), identity_of(outer)),
    }
}

/// Resolves every table, join and member access of `statement`.
pub fn resolve(
    statement: SqlStatement,
    tables: &mut TableArena,
    resolver: &dyn MappingResolver,
    generator: &mut UniqueIdentifierGenerator,
    max_passes: usize,
) -> CompileResult<SqlStatement> {
    let mut stage = ResolutionStage::new(resolver, generator, tables, max_passes);
    stage.resolve_statement(statement)
}
