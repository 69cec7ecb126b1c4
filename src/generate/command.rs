use super::dialect::SqlGenerator;
use crate::query::Value;
use serde::{Deserialize, Serialize};

/// A bound parameter of a generated command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandParameter {
    pub name: String,
    pub value: Value,
}

/// Generated SQL text plus its parameters in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCommand {
    pub command_text: String,
    pub parameters: Vec<CommandParameter>,
}

impl std::fmt::Display for SqlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command_text)?;
        for parameter in &self.parameters {
            write!(f, "\n  {} = {}", parameter.name, parameter.value)?;
        }
        Ok(())
    }
}

/// Text buffer that hands out a fresh placeholder for every bound value.
pub struct CommandBuilder<'a> {
    dialect: &'a dyn SqlGenerator,
    text: String,
    parameters: Vec<CommandParameter>,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(dialect: &'a dyn SqlGenerator) -> Self {
        Self {
            dialect,
            text: String::new(),
            parameters: Vec::new(),
        }
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn append_identifier(&mut self, name: &str) {
        let quoted = self.dialect.quote_identifier(name);
        self.text.push_str(&quoted);
    }

    /// Binds `value` and appends its placeholder. Equal values are not
    /// shared: each call allocates a new parameter.
    pub fn append_parameter(&mut self, value: Value) {
        let name = self.dialect.placeholder(self.parameters.len() + 1);
        self.text.push_str(&name);
        self.parameters.push(CommandParameter { name, value });
    }

    pub fn into_command(self) -> SqlCommand {
        SqlCommand {
            command_text: self.text,
            parameters: self.parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::dialect::{PostgresGenerator, SqlServerGenerator};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_each_value_gets_its_own_parameter() {
        let dialect = SqlServerGenerator;
        let mut builder = CommandBuilder::new(&dialect);
        builder.append_parameter(Value::Int(1));
        builder.append(", ");
        builder.append_parameter(Value::Int(1));
        let command = builder.into_command();
        assert_eq!(command.command_text, "@1, @2");
        assert_eq!(command.parameters.len(), 2);
        assert_eq!(command.parameters[1].name, "@2");
    }

    #[test]
    fn test_postgres_placeholders() {
        let dialect = PostgresGenerator;
        let mut builder = CommandBuilder::new(&dialect);
        builder.append_identifier("Name");
        builder.append(" = ");
        builder.append_parameter(Value::String("x".to_string()));
        assert_eq!(builder.into_command().command_text, "\"Name\" = $1");
    }
}
