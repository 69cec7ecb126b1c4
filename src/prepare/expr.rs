//! Lowering of query-model expressions into SQL expressions.

use super::context::PreparationContext;
use super::members::transform_member;
use super::methods::MethodCall;
use crate::error::{CompileError, CompileResult};
use crate::query::{BinaryOp, Expr, QueryModel, Value, ValueType};
use crate::sql::{
    DataInfo, JoinSemantics, SqlBinaryOp, SqlExpr, SqlStatementBuilder, TableInfo, UnresolvedTableInfo,
};

impl PreparationContext<'_> {
    pub fn prepare_expr(&mut self, expr: &Expr) -> CompileResult<SqlExpr> {
        match expr {
            Expr::Constant { value, ty } => Ok(prepare_constant(value, ty)),
            Expr::EntitySet { item_type } => {
                let table = self.tables.add_table(
                    TableInfo::Unresolved(UnresolvedTableInfo {
                        item_type: item_type.clone(),
                    }),
                    JoinSemantics::Inner,
                );
                let mut builder = SqlStatementBuilder::new();
                builder.add_table(table, JoinSemantics::Inner);
                builder.select_projection = Some(SqlExpr::TableRef {
                    table,
                    ty: item_type.clone(),
                });
                builder.data_info = Some(DataInfo::sequence(item_type.clone()));
                Ok(SqlExpr::SubStatement(Box::new(builder.get_statement_and_reset()?)))
            }
            Expr::Source { name, .. } => self.lookup(name).cloned().ok_or_else(|| {
                CompileError::invalid(format!("The query source '{}' is not in scope", name))
            }),
            Expr::Member { object, member, ty } => {
                let object = self.prepare_expr(object)?;
                transform_member(object, member, ty)
            }
            Expr::Binary { op, left, right, ty } => {
                let left = self.prepare_expr(left)?;
                let right = self.prepare_expr(right)?;
                Ok(prepare_binary(*op, left, right, ty))
            }
            Expr::Not(operand) => Ok(SqlExpr::Not(Box::new(self.prepare_expr(operand)?))),
            Expr::Negate(operand) => Ok(SqlExpr::Negate(Box::new(self.prepare_expr(operand)?))),
            Expr::Convert { operand, ty } => {
                let operand = self.prepare_expr(operand)?;
                // Lifting to a nullable type changes nothing in SQL.
                if !ty.is_entity() && operand.ty().underlying() == ty.underlying() {
                    Ok(operand)
                } else {
                    Ok(SqlExpr::convert(operand, ty.clone()))
                }
            }
            Expr::Call {
                method,
                object,
                arguments,
                ty,
            } => {
                let object = match object {
                    Some(object) => Some(self.prepare_expr(object)?),
                    None => None,
                };
                let mut prepared = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    prepared.push(self.prepare_expr(argument)?);
                }
                let methods = self.methods;
                methods.transform(MethodCall {
                    method: method.clone(),
                    object,
                    arguments: prepared,
                    ty: ty.clone(),
                    expression: expr.to_string(),
                })
            }
            Expr::NewArray { elements, ty } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.prepare_expr(element)?);
                }
                Ok(SqlExpr::Collection { items, ty: ty.clone() })
            }
            Expr::New { members, ty } => {
                let mut prepared = Vec::with_capacity(members.len());
                for (name, value) in members {
                    prepared.push((name.clone(), self.prepare_expr(value)?));
                }
                Ok(SqlExpr::New {
                    members: prepared,
                    ty: ty.clone(),
                })
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => {
                let test = self.prepare_expr(test)?;
                let if_true = self.prepare_expr(if_true)?;
                let if_false = self.prepare_expr(if_false)?;
                Ok(SqlExpr::case(test, if_true, if_false))
            }
            Expr::TypeIs { operand, target } => Ok(SqlExpr::TypeCheck {
                operand: Box::new(self.prepare_expr(operand)?),
                target: target.clone(),
            }),
            Expr::SubQuery { query, .. } => self.prepare_sub_query(query),
        }
    }

    /// A sub-query in expression position.
    ///
    /// Statements reduced to a bare projection by their result operators
    /// (`Any`, `All`, `Contains`) are inlined.
    fn prepare_sub_query(&mut self, query: &QueryModel) -> CompileResult<SqlExpr> {
        let statement = self.prepare_query_model(query)?;
        if statement.tables.is_empty()
            && statement.where_condition.is_none()
            && statement.group_by.is_none()
            && statement.set_operations.is_empty()
        {
            return Ok(statement.select_projection);
        }
        Ok(SqlExpr::SubStatement(Box::new(statement)))
    }
}

fn prepare_constant(value: &Value, ty: &ValueType) -> SqlExpr {
    match value {
        Value::Array(items) => {
            let item_type = ty.element_type().cloned().unwrap_or(ValueType::Object);
            SqlExpr::Collection {
                items: items
                    .iter()
                    .map(|v| SqlExpr::constant(v.clone(), item_type.clone()))
                    .collect(),
                ty: ty.clone(),
            }
        }
        other => SqlExpr::constant(other.clone(), ty.clone()),
    }
}

fn prepare_binary(op: BinaryOp, left: SqlExpr, right: SqlExpr, ty: &ValueType) -> SqlExpr {
    match op {
        BinaryOp::Add if left.ty().is_string() || right.ty().is_string() => {
            let as_string = |e: SqlExpr| {
                if e.ty().is_string() {
                    e
                } else {
                    SqlExpr::convert(e, ValueType::String)
                }
            };
            SqlExpr::concat(as_string(left), as_string(right))
        }
        BinaryOp::Coalesce => SqlExpr::function("COALESCE", vec![left, right], ty.clone()),
        other => SqlExpr::Binary {
            op: SqlBinaryOp::from(other),
            left: Box::new(left),
            right: Box::new(right),
            ty: ty.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::methods::MethodCallTransformerRegistry;
    use crate::prepare::operators::ResultOperatorHandlerRegistry;
    use crate::query::builders::*;
    use crate::query::MethodSig;
    use crate::resolve::UniqueIdentifierGenerator;
    use crate::sql::TableArena;
    use pretty_assertions::assert_eq;

    fn with_context<R>(f: impl FnOnce(&mut PreparationContext<'_>) -> R) -> R {
        let mut tables = TableArena::new();
        let mut generator = UniqueIdentifierGenerator::default();
        let methods = MethodCallTransformerRegistry::build_default_registry();
        let operators = ResultOperatorHandlerRegistry::build_default_registry();
        let mut ctx = PreparationContext::new(&mut tables, &mut generator, &methods, &operators);
        f(&mut ctx)
    }

    #[test]
    fn test_string_addition_becomes_concat() {
        with_context(|ctx| {
            let expr = string("a").binary(BinaryOp::Add, int(1));
            let result = ctx.prepare_expr(&expr).unwrap();
            assert_eq!(
                result,
                SqlExpr::concat(
                    SqlExpr::constant("a", ValueType::String),
                    SqlExpr::convert(SqlExpr::constant(1, ValueType::Int32), ValueType::String)
                )
            );
        });
    }

    #[test]
    fn test_unknown_source_is_invalid() {
        with_context(|ctx| {
            let err = ctx.prepare_expr(&source("y", entity("Customer"))).unwrap_err();
            assert!(matches!(err, CompileError::InvalidStatement(_)));
        });
    }

    #[test]
    fn test_unregistered_method_reports_expression() {
        with_context(|ctx| {
            let table = SqlExpr::TableRef {
                table: ctx.tables.add_table(
                    TableInfo::Unresolved(UnresolvedTableInfo {
                        item_type: entity("Customer"),
                    }),
                    JoinSemantics::Inner,
                ),
                ty: entity("Customer"),
            };
            ctx.add_mapping("x", table);
            let call = source("x", entity("Customer")).call(
                MethodSig::instance("Customer", "Frobnicate", [ValueType::Int32]),
                vec![int(3)],
                ValueType::Bool,
            );
            let err = ctx.prepare_expr(&call).unwrap_err();
            assert_eq!(err.construct(), Some("Customer.Frobnicate"));
            assert!(err.to_string().ends_with("Expression: '[x].Frobnicate(3)'"));
        });
    }

    #[test]
    fn test_nullable_lift_is_dropped() {
        with_context(|ctx| {
            let lifted = int(3).convert(ValueType::Int32.nullable());
            assert_eq!(
                ctx.prepare_expr(&lifted).unwrap(),
                SqlExpr::constant(3, ValueType::Int32)
            );
        });
    }
}
