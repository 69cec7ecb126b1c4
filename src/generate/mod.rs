//! SQL generation: renders a fully resolved statement as command text plus
//! bound parameters.

pub mod command;
pub mod dialect;
mod expr;
mod statement;

pub use command::{CommandBuilder, CommandParameter, SqlCommand};
pub use dialect::{Dialect, PostgresGenerator, SqlGenerator, SqlServerGenerator};

use crate::error::CompileResult;
use crate::sql::{SqlStatement, TableArena};
use tracing::debug;

/// Walks a resolved statement and writes its SQL into a [`CommandBuilder`].
pub struct SqlTextGenerator<'a> {
    dialect: &'a dyn SqlGenerator,
    tables: &'a TableArena,
    command: CommandBuilder<'a>,
}

impl<'a> SqlTextGenerator<'a> {
    pub fn new(dialect: &'a dyn SqlGenerator, tables: &'a TableArena) -> Self {
        Self {
            dialect,
            tables,
            command: CommandBuilder::new(dialect),
        }
    }

    pub fn finish(self) -> SqlCommand {
        self.command.into_command()
    }
}

/// Renders `statement` in the given dialect.
pub fn generate(
    statement: &SqlStatement,
    tables: &TableArena,
    dialect: &dyn SqlGenerator,
) -> CompileResult<SqlCommand> {
    let mut generator = SqlTextGenerator::new(dialect, tables);
    generator.statement(statement)?;
    let command = generator.finish();
    debug!(
        parameters = command.parameters.len(),
        "Generated SQL: {}", command.command_text
    );
    Ok(command)
}
