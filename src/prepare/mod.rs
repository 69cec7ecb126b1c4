//! Preparation: lowers a query model into an unresolved SQL statement.
//!
//! Method calls go through a [`MethodCallTransformerRegistry`] and result
//! operators through a [`ResultOperatorHandlerRegistry`]; both can be
//! extended with custom entries before compiling.

mod context;
mod expr;
mod members;
pub mod methods;
pub mod operators;
mod query;

pub use context::PreparationContext;
pub use members::transform_member;
pub use methods::{MethodCall, MethodCallTransformer, MethodCallTransformerRegistry};
pub use operators::{ResultOperatorHandler, ResultOperatorHandlerRegistry};

use crate::error::CompileResult;
use crate::query::QueryModel;
use crate::sql::SqlStatement;
use tracing::debug;

/// Lowers `model` into a statement whose tables are registered in
/// `ctx.tables`.
pub fn prepare(model: &QueryModel, ctx: &mut PreparationContext<'_>) -> CompileResult<SqlStatement> {
    debug!(query = %model, "Preparing query model");
    let statement = ctx.prepare_query_model(model)?;
    debug!(tables = ctx.tables.table_count(), "Prepared statement");
    Ok(statement)
}
