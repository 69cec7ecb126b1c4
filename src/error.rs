//! Error types for relsql.

use thiserror::Error;

/// The main error type for query compilation.
///
/// Every failure aborts the compilation of the current query; nothing is
/// retried or recovered inside the pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A construct (method, member, result operator, node kind) has no
    /// registered handler.
    #[error("{message}")]
    Unsupported { construct: String, message: String },

    /// The mapping resolver cannot map a type, member or table.
    #[error("{0}")]
    UnmappedItem(String),

    /// An internally inconsistent statement reached a later stage.
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// A table or join info was refined with an incompatible item type.
    #[error("Item type mismatch in {context}: expected '{expected}', got '{actual}'")]
    ArgumentTypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// A fixpoint rewrite did not settle within the configured number of passes.
    #[error("Resolution of {what} did not reach a fixed point after {passes} passes")]
    NonConvergent { what: String, passes: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Generic unsupported construct.
    pub fn unsupported(construct: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            message: message.into(),
        }
    }

    /// A method call whose shape does not match what its transformer expects.
    ///
    /// All method-call transformers report through this so the message format
    /// stays the same everywhere.
    pub fn unsupported_method(method: &str, expected: &str, expression: impl std::fmt::Display) -> Self {
        Self::Unsupported {
            construct: method.to_string(),
            message: format!(
                "{} is not supported: expected {}. Expression: '{}'",
                method, expected, expression
            ),
        }
    }

    /// A method call nobody registered a transformer for.
    pub fn unregistered_method(method: &str, expression: impl std::fmt::Display) -> Self {
        Self::Unsupported {
            construct: method.to_string(),
            message: format!(
                "The method '{}' is not supported by this code generator, and no custom transformer has been registered. Expression: '{}'",
                method, expression
            ),
        }
    }

    /// A result operator without a handler.
    pub fn unsupported_operator(operator: &str) -> Self {
        Self::Unsupported {
            construct: operator.to_string(),
            message: format!(
                "The result operator '{}' is not supported and no custom handler has been registered.",
                operator
            ),
        }
    }

    /// An unresolved or malformed node found where only resolved ones may appear.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidStatement(message.into())
    }

    /// Name of the construct for `Unsupported` errors.
    pub fn construct(&self) -> Option<&str> {
        match self {
            Self::Unsupported { construct, .. } => Some(construct),
            _ => None,
        }
    }
}

/// Result type alias for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::unsupported_method("String.Insert", "2 arguments", "x.Name.Insert(1)");
        assert_eq!(
            err.to_string(),
            "String.Insert is not supported: expected 2 arguments. Expression: 'x.Name.Insert(1)'"
        );
        assert_eq!(err.construct(), Some("String.Insert"));
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = CompileError::ArgumentTypeMismatch {
            context: "table t0".to_string(),
            expected: "Customer".to_string(),
            actual: "Order".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Item type mismatch in table t0: expected 'Customer', got 'Order'"
        );
    }
}
