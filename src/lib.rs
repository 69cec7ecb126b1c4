//! # relsql: query models to parameterized SQL
//!
//! relsql compiles a LINQ-style query model (from clauses, body clauses,
//! a selector and result operators) into one SQL command in three stages:
//!
//! | Stage     | Module      | Output                                  |
//! |-----------|-------------|-----------------------------------------|
//! | Prepare   | [`prepare`] | statement over unresolved tables        |
//! | Resolve   | [`resolve`] | statement over mapped tables and columns |
//! | Generate  | [`generate`]| SQL text plus bound parameters          |
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use relsql::prelude::*;
//!
//! let schema = MappingSchema::load("schema.toml")?;
//! let compiler = QueryCompiler::new(SchemaResolver::new(schema));
//!
//! let c = source("c", entity("Customer"));
//! let model = from_entity("c", "Customer")
//!     .filter(c.member("Name", ValueType::String).equal(null()));
//! let command = compiler.compile(&model)?;
//! // => SELECT [t0].[ID], [t0].[Name] FROM [Customers] AS [t0] WHERE [t0].[Name] IS NULL
//! ```

pub mod config;
pub mod error;
pub mod generate;
pub mod prepare;
pub mod query;
pub mod resolve;
pub mod sql;

use std::sync::Arc;

use config::CompilerConfig;
use error::CompileResult;
use generate::SqlCommand;
use prepare::{MethodCallTransformerRegistry, PreparationContext, ResultOperatorHandlerRegistry};
use query::QueryModel;
use resolve::{MappingResolver, UniqueIdentifierGenerator};
use sql::TableArena;
use tracing::info;

pub mod prelude {
    pub use crate::config::CompilerConfig;
    pub use crate::error::*;
    pub use crate::generate::{Dialect, SqlCommand};
    pub use crate::query::builders::*;
    pub use crate::query::{OrderDirection, QueryModel, ResultOperator, Value, ValueType};
    pub use crate::resolve::{MappingResolver, MappingSchema, SchemaResolver};
    pub use crate::QueryCompiler;
}

/// Entry point: owns the registries, configuration and mapping resolver,
/// and compiles query models one at a time.
///
/// The registries are shared read-only; every call to
/// [`compile`](Self::compile) works on its own table arena and alias
/// generator.
pub struct QueryCompiler {
    methods: Arc<MethodCallTransformerRegistry>,
    operators: Arc<ResultOperatorHandlerRegistry>,
    resolver: Box<dyn MappingResolver>,
    config: CompilerConfig,
}

impl QueryCompiler {
    pub fn new(resolver: impl MappingResolver + 'static) -> Self {
        Self::with_config(resolver, CompilerConfig::default())
    }

    pub fn with_config(resolver: impl MappingResolver + 'static, config: CompilerConfig) -> Self {
        Self {
            methods: Arc::new(MethodCallTransformerRegistry::build_default_registry()),
            operators: Arc::new(ResultOperatorHandlerRegistry::build_default_registry()),
            resolver: Box::new(resolver),
            config,
        }
    }

    /// Replaces the method-call transformers, e.g. with a default registry
    /// extended by custom transformers.
    pub fn with_methods(mut self, methods: Arc<MethodCallTransformerRegistry>) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_operators(mut self, operators: Arc<ResultOperatorHandlerRegistry>) -> Self {
        self.operators = operators;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile(&self, model: &QueryModel) -> CompileResult<SqlCommand> {
        let mut tables = TableArena::new();
        let mut generator = UniqueIdentifierGenerator::new(
            self.config.table_alias_prefix.as_str(),
            self.config.sub_statement_alias_prefix.as_str(),
        );

        let statement = {
            let mut ctx =
                PreparationContext::new(&mut tables, &mut generator, &self.methods, &self.operators);
            prepare::prepare(model, &mut ctx)?
        };

        let statement = resolve::resolve(
            statement,
            &mut tables,
            self.resolver.as_ref(),
            &mut generator,
            self.config.max_resolution_passes,
        )?;

        let dialect = self.config.dialect.generator();
        let command = generate::generate(&statement, &tables, dialect.as_ref())?;
        info!(
            dialect = %self.config.dialect,
            tables = tables.table_count(),
            parameters = command.parameters.len(),
            "Compiled query"
        );
        Ok(command)
    }
}
