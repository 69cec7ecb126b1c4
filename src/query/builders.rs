//! Builders for query models and expressions.
//!
//! ```ignore
//! use relsql::query::builders::*;
//! let x = source("x", entity("Customer"));
//! let q = from_entity("x", "Customer")
//!     .filter(x.clone().member("Name", ValueType::String).equal(null()))
//!     .select(x);
//! ```

use super::expr::{BinaryOp, Expr, MethodSig};
use super::model::{BodyClause, FromClause, JoinClause, OrderDirection, Ordering, QueryModel, ResultOperator};
use super::types::ValueType;
use super::values::Value;

pub fn entity(name: &str) -> ValueType {
    ValueType::entity(name)
}

/// Reference to a from/join clause item.
pub fn source(name: &str, ty: ValueType) -> Expr {
    Expr::Source {
        name: name.to_string(),
        ty,
    }
}

pub fn constant(value: impl Into<Value>, ty: ValueType) -> Expr {
    Expr::Constant {
        value: value.into(),
        ty,
    }
}

pub fn string(s: &str) -> Expr {
    constant(s, ValueType::String)
}

pub fn int(n: i32) -> Expr {
    constant(n, ValueType::Int32)
}

pub fn boolean(b: bool) -> Expr {
    constant(b, ValueType::Bool)
}

/// A typed null constant (`null` of type `String` unless overridden).
pub fn null_of(ty: ValueType) -> Expr {
    constant(Value::Null, ty)
}

pub fn null() -> Expr {
    null_of(ValueType::String)
}

pub fn entity_set(name: &str) -> Expr {
    Expr::EntitySet {
        item_type: entity(name),
    }
}

/// Static method call.
pub fn call_static(method: MethodSig, arguments: Vec<Expr>, ty: ValueType) -> Expr {
    Expr::Call {
        method,
        object: None,
        arguments,
        ty,
    }
}

pub fn new_array(elements: Vec<Expr>, item: ValueType) -> Expr {
    Expr::NewArray {
        elements,
        ty: ValueType::sequence_of(item),
    }
}

pub fn record(name: &str, members: Vec<(&str, Expr)>) -> Expr {
    Expr::New {
        members: members.into_iter().map(|(n, e)| (n.to_string(), e)).collect(),
        ty: ValueType::Record(name.to_string()),
    }
}

pub fn sub_query(query: QueryModel, ty: ValueType) -> Expr {
    Expr::SubQuery {
        query: Box::new(query),
        ty,
    }
}

/// Fluent methods on source expressions.
pub trait ExprExt: Sized {
    fn member(self, member: &str, ty: ValueType) -> Expr;
    fn call(self, method: MethodSig, arguments: Vec<Expr>, ty: ValueType) -> Expr;
    fn binary(self, op: BinaryOp, right: Expr) -> Expr;

    fn equal(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Equal, right)
    }

    fn not_equal(self, right: Expr) -> Expr {
        self.binary(BinaryOp::NotEqual, right)
    }

    fn less_than(self, right: Expr) -> Expr {
        self.binary(BinaryOp::LessThan, right)
    }

    fn greater_than(self, right: Expr) -> Expr {
        self.binary(BinaryOp::GreaterThan, right)
    }

    fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::AndAlso, right)
    }

    fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::OrElse, right)
    }

    fn is_type(self, target: ValueType) -> Expr;
    fn convert(self, ty: ValueType) -> Expr;
}

impl ExprExt for Expr {
    fn member(self, member: &str, ty: ValueType) -> Expr {
        Expr::Member {
            object: Box::new(self),
            member: member.to_string(),
            ty,
        }
    }

    fn call(self, method: MethodSig, arguments: Vec<Expr>, ty: ValueType) -> Expr {
        Expr::Call {
            method,
            object: Some(Box::new(self)),
            arguments,
            ty,
        }
    }

    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        let ty = if op.is_comparison() || op.is_logical() {
            ValueType::Bool
        } else {
            self.ty()
        };
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
            ty,
        }
    }

    fn is_type(self, target: ValueType) -> Expr {
        Expr::TypeIs {
            operand: Box::new(self),
            target,
        }
    }

    fn convert(self, ty: ValueType) -> Expr {
        Expr::Convert {
            operand: Box::new(self),
            ty,
        }
    }
}

/// `from <name> in Table<entity>`
pub fn from_entity(name: &str, entity_name: &str) -> QueryModel {
    from_source(name, entity(entity_name), entity_set(entity_name))
}

pub fn from_source(name: &str, item_type: ValueType, source_expr: Expr) -> QueryModel {
    let item = source(name, item_type.clone());
    QueryModel {
        main_from: FromClause {
            name: name.to_string(),
            item_type,
            source: source_expr,
        },
        body: Vec::new(),
        select: item,
        result_operators: Vec::new(),
    }
}

impl QueryModel {
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.body.push(BodyClause::Where(predicate));
        self
    }

    pub fn from_also(mut self, name: &str, item_type: ValueType, source_expr: Expr) -> Self {
        self.body.push(BodyClause::From(FromClause {
            name: name.to_string(),
            item_type,
            source: source_expr,
        }));
        self
    }

    pub fn join(
        mut self,
        name: &str,
        item_type: ValueType,
        source_expr: Expr,
        outer_key: Expr,
        inner_key: Expr,
    ) -> Self {
        self.body.push(BodyClause::Join(JoinClause {
            name: name.to_string(),
            item_type,
            source: source_expr,
            outer_key,
            inner_key,
        }));
        self
    }

    pub fn order_by(mut self, expr: Expr, direction: OrderDirection) -> Self {
        self.body.push(BodyClause::OrderBy(vec![Ordering { expr, direction }]));
        self
    }

    pub fn select(mut self, projection: Expr) -> Self {
        self.select = projection;
        self
    }

    pub fn with(mut self, op: ResultOperator) -> Self {
        self.result_operators.push(op);
        self
    }
}
