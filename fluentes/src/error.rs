use thiserror::Error;

#[derive(Error, Debug)]
pub enum FluentError {
    #[error("Invalid field expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Unsupported filter expression: {0}")]
    UnsupportedExpression(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Aggregation not found: {0}")]
    NotFound(String),

    #[error("Aggregation name '{0}' is already used by a different aggregation")]
    NameConflict(String),

    #[error("Cannot convert bucket key '{key}' to {target}: {reason}")]
    Conversion {
        key: String,
        target: &'static str,
        reason: String,
    },

    #[error("Aggregation DSL error: {0}")]
    Dsl(fluentes_dsl::Error),
}

impl FluentError {
    pub(crate) fn invalid_expression(expression: &str, reason: impl Into<String>) -> Self {
        FluentError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

// A missing aggregation means build and read derived different names; surface
// it as NotFound rather than a generic DSL failure.
impl From<fluentes_dsl::Error> for FluentError {
    fn from(err: fluentes_dsl::Error) -> Self {
        match err {
            fluentes_dsl::Error::AggregationNotFound(name) => FluentError::NotFound(name),
            other => FluentError::Dsl(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, FluentError>;
