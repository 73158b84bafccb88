//! Error types for the aggregation DSL model

/// Aggregation DSL errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Aggregation not found: {0}")]
    AggregationNotFound(String),

    #[error("Aggregation '{name}' is not a {expected} aggregate: {source}")]
    UnexpectedShape {
        name: String,
        expected: &'static str,
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Name of the aggregation this error refers to, if any
    pub fn aggregation_name(&self) -> Option<&str> {
        match self {
            Self::AggregationNotFound(name) | Self::UnexpectedShape { name, .. } => Some(name),
            Self::Json(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::AggregationNotFound("SumPrice".to_string());
        assert_eq!(err.to_string(), "Aggregation not found: SumPrice");
        assert_eq!(err.aggregation_name(), Some("SumPrice"));
    }

    #[test]
    fn test_unexpected_shape_message() {
        let source = serde_json::from_str::<u64>("\"x\"").unwrap_err();
        let err = Error::UnexpectedShape {
            name: "GroupByColor".to_string(),
            expected: "terms",
            source,
        };
        assert!(err.to_string().contains("GroupByColor"));
        assert!(err.to_string().contains("terms"));
        assert_eq!(err.aggregation_name(), Some("GroupByColor"));
    }

    #[test]
    fn test_json_error_has_no_name() {
        let source = serde_json::from_str::<u64>("nope").unwrap_err();
        let err = Error::from(source);
        assert!(err.aggregation_name().is_none());
    }
}
