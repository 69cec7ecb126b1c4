//! Generic query model: the input of the compiler.
//!
//! Produced by an upstream parser of fluent query expressions and consumed
//! as-is by the preparation stage.

pub mod builders;
pub mod expr;
pub mod model;
pub mod types;
pub mod values;

pub use expr::{BinaryOp, Expr, MethodSig};
pub use model::{
    BodyClause, FromClause, JoinClause, OrderDirection, Ordering, QueryModel, ResultOperator,
    ResultOperatorKind,
};
pub use types::ValueType;
pub use values::Value;
