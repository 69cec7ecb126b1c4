//! SQL dialects: the spelling differences between target databases.

use crate::query::ValueType;
use crate::sql::JoinSemantics;
use serde::{Deserialize, Serialize};

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    /// Quote an identifier (table, alias or column name).
    fn quote_identifier(&self, name: &str) -> String;
    /// Generate the parameter placeholder (e.g. @1, $1) for a 1-based index.
    fn placeholder(&self, index: usize) -> String;
    /// Get the boolean literal (1/0 vs TRUE/FALSE).
    fn bool_literal(&self, val: bool) -> String;
    /// Operator joining two strings.
    fn concat_operator(&self) -> &str;
    /// Whether row limits are written as a trailing `LIMIT` instead of `TOP`.
    fn uses_limit(&self) -> bool;
    /// Keyword introducing a correlated derived table.
    fn apply_keyword(&self, semantics: JoinSemantics) -> &str;
    /// Text following a correlated derived table.
    fn apply_suffix(&self, _semantics: JoinSemantics) -> &str {
        ""
    }
    /// Database type name used in conversions.
    fn type_name(&self, ty: &ValueType) -> String;
    /// Text written before the operand of a conversion to `ty`.
    fn convert_prefix(&self, ty: &ValueType) -> String {
        let _ = ty;
        "CAST(".to_string()
    }
    /// Text written after the operand of a conversion to `ty`.
    fn convert_suffix(&self, ty: &ValueType) -> String {
        format!(" AS {})", self.type_name(ty))
    }
    /// Name of a scalar function in this dialect.
    fn function_name<'a>(&self, name: &'a str) -> &'a str {
        name
    }
    /// Aggregate function counting rows into a 64-bit integer.
    fn long_count_function(&self) -> &str {
        "COUNT"
    }
    /// Quote a string literal.
    fn string_literal(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }
}

/// Microsoft SQL Server.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerGenerator;

impl SqlServerGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for SqlServerGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@{}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn concat_operator(&self) -> &str {
        "+"
    }

    fn uses_limit(&self) -> bool {
        false
    }

    fn apply_keyword(&self, semantics: JoinSemantics) -> &str {
        match semantics {
            JoinSemantics::Inner => "CROSS APPLY",
            JoinSemantics::Left => "OUTER APPLY",
        }
    }

    fn type_name(&self, ty: &ValueType) -> String {
        match ty.underlying() {
            ValueType::Bool => "BIT",
            ValueType::Int32 => "INT",
            ValueType::Int64 | ValueType::TimeSpan => "BIGINT",
            ValueType::Double => "FLOAT",
            ValueType::Decimal => "DECIMAL(38, 18)",
            ValueType::Char => "NCHAR(1)",
            ValueType::String => "NVARCHAR(MAX)",
            ValueType::DateTime => "DATETIME",
            ValueType::Guid => "UNIQUEIDENTIFIER",
            _ => "SQL_VARIANT",
        }
        .to_string()
    }

    fn convert_prefix(&self, ty: &ValueType) -> String {
        format!("CONVERT({}, ", self.type_name(ty))
    }

    fn convert_suffix(&self, _ty: &ValueType) -> String {
        ")".to_string()
    }

    fn long_count_function(&self) -> &str {
        "COUNT_BIG"
    }
}

/// PostgreSQL.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresGenerator;

impl PostgresGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for PostgresGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "TRUE".to_string() } else { "FALSE".to_string() }
    }

    fn concat_operator(&self) -> &str {
        "||"
    }

    fn uses_limit(&self) -> bool {
        true
    }

    fn apply_keyword(&self, semantics: JoinSemantics) -> &str {
        match semantics {
            JoinSemantics::Inner => "CROSS JOIN LATERAL",
            JoinSemantics::Left => "LEFT JOIN LATERAL",
        }
    }

    fn apply_suffix(&self, semantics: JoinSemantics) -> &str {
        match semantics {
            JoinSemantics::Inner => "",
            JoinSemantics::Left => " ON TRUE",
        }
    }

    fn type_name(&self, ty: &ValueType) -> String {
        match ty.underlying() {
            ValueType::Bool => "BOOLEAN",
            ValueType::Int32 => "INTEGER",
            ValueType::Int64 | ValueType::TimeSpan => "BIGINT",
            ValueType::Double => "DOUBLE PRECISION",
            ValueType::Decimal => "NUMERIC",
            ValueType::Char => "CHAR(1)",
            ValueType::DateTime => "TIMESTAMP",
            ValueType::Guid => "UUID",
            _ => "TEXT",
        }
        .to_string()
    }

    fn function_name<'a>(&self, name: &'a str) -> &'a str {
        match name {
            "LEN" => "LENGTH",
            "CEILING" => "CEIL",
            other => other,
        }
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    SqlServer,
    Postgres,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::SqlServer => Box::new(SqlServerGenerator),
            Dialect::Postgres => Box::new(PostgresGenerator),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" | "tsql" => Ok(Dialect::SqlServer),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            other => Err(format!("Unknown dialect '{}'", other)),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::SqlServer => write!(f, "sqlserver"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}
