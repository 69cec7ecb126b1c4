//! relsql: compile query models to SQL from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Compile a JSON query model against a TOML mapping schema
//! relsql compile --schema schema.toml --query model.json
//! relsql compile --schema schema.toml --query model.json --dialect postgres --json
//!
//! # Validate a mapping schema
//! relsql check schema.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use relsql::prelude::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relsql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile relational query models into parameterized SQL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDialect {
    Sqlserver,
    Postgres,
}

impl From<CliDialect> for Dialect {
    fn from(val: CliDialect) -> Self {
        match val {
            CliDialect::Sqlserver => Dialect::SqlServer,
            CliDialect::Postgres => Dialect::Postgres,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query model into a SQL command
    Compile {
        /// Mapping schema (TOML)
        #[arg(short, long)]
        schema: PathBuf,
        /// Query model (JSON)
        #[arg(short, long)]
        query: PathBuf,
        /// Target SQL dialect (overrides the config file)
        #[arg(short, long, value_enum)]
        dialect: Option<CliDialect>,
        /// Compiler config (TOML); defaults to the user config file if present
        #[arg(short, long, env = "RELSQL_CONFIG")]
        config: Option<PathBuf>,
        /// Print the command as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a mapping schema
    Check {
        /// Mapping schema (TOML)
        schema: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("relsql=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            schema,
            query,
            dialect,
            config,
            json,
        } => compile(&schema, &query, dialect, config.as_deref(), json),
        Commands::Check { schema } => check(&schema),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<CompilerConfig> {
    let config = match path {
        Some(path) => CompilerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CompilerConfig::load_default()?,
    };
    Ok(config)
}

fn compile(
    schema_path: &std::path::Path,
    query_path: &std::path::Path,
    dialect: Option<CliDialect>,
    config_path: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dialect) = dialect {
        config.dialect = dialect.into();
    }

    let schema = MappingSchema::load(schema_path)
        .with_context(|| format!("Failed to load schema {}", schema_path.display()))?;
    let content = std::fs::read_to_string(query_path)
        .with_context(|| format!("Failed to read {}", query_path.display()))?;
    let model: QueryModel = serde_json::from_str(&content)
        .with_context(|| format!("Invalid query model in {}", query_path.display()))?;

    let compiler = QueryCompiler::with_config(SchemaResolver::new(schema), config);
    let command = match compiler.compile(&model) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{} {}", "Compile Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&command)?);
        return Ok(());
    }

    println!("{}", "Generated SQL:".green().bold());
    println!("{}", command.command_text.white().bold());
    if !command.parameters.is_empty() {
        println!();
        println!("{}", "Parameters:".cyan().bold());
        for parameter in &command.parameters {
            println!("  {} = {}", parameter.name.yellow(), parameter.value);
        }
    }
    Ok(())
}

fn check(schema_path: &std::path::Path) -> Result<()> {
    match MappingSchema::load(schema_path) {
        Ok(schema) => {
            println!(
                "{} {} ({} entities)",
                "✓".green().bold(),
                schema_path.display(),
                schema.entities.len()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Schema Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
