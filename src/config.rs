//! Compiler configuration, loaded from TOML.
//!
//! ```toml
//! dialect = "postgres"
//! max_resolution_passes = 32
//! ```

use crate::error::{CompileError, CompileResult};
use crate::generate::Dialect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_RESOLUTION_PASSES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub dialect: Dialect,
    /// Upper bound on the passes of every fixpoint rewrite during mapping
    /// resolution.
    pub max_resolution_passes: usize,
    pub table_alias_prefix: String,
    pub sub_statement_alias_prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            max_resolution_passes: DEFAULT_MAX_RESOLUTION_PASSES,
            table_alias_prefix: "t".to_string(),
            sub_statement_alias_prefix: "q".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }

    pub fn from_toml_str(content: &str) -> CompileResult<Self> {
        let config: CompilerConfig =
            toml::from_str(content).map_err(|e| CompileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> CompileResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// `<config dir>/relsql/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relsql").join("config.toml"))
    }

    /// Loads the file at [`default_path`](Self::default_path), falling back
    /// to defaults when it does not exist.
    pub fn load_default() -> CompileResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> CompileResult<()> {
        if self.max_resolution_passes == 0 {
            return Err(CompileError::Config(
                "max_resolution_passes must be at least 1".to_string(),
            ));
        }
        if self.table_alias_prefix.is_empty() || self.sub_statement_alias_prefix.is_empty() {
            return Err(CompileError::Config("Alias prefixes must not be empty".to_string()));
        }
        let (table, sub) = (&self.table_alias_prefix, &self.sub_statement_alias_prefix);
        if aliases_overlap(table, sub) || aliases_overlap(sub, table) {
            return Err(CompileError::Config(format!(
                "The alias prefixes '{}' and '{}' can generate the same alias",
                table, sub
            )));
        }
        Ok(())
    }
}

/// Whether `prefix` followed by a counter can spell `other` followed by a
/// counter, e.g. `t` + `10` and `t1` + `0`.
fn aliases_overlap(prefix: &str, other: &str) -> bool {
    other
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

/// Fluent builder for [`CompilerConfig`].
#[derive(Debug, Clone, Default)]
pub struct CompilerConfigBuilder {
    config: CompilerConfig,
}

impl CompilerConfigBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn max_resolution_passes(mut self, passes: usize) -> Self {
        self.config.max_resolution_passes = passes;
        self
    }

    pub fn table_alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.table_alias_prefix = prefix.into();
        self
    }

    pub fn sub_statement_alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.sub_statement_alias_prefix = prefix.into();
        self
    }

    pub fn build(self) -> CompileResult<CompilerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
