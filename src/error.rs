//! Error types for the filter compiler.

use thiserror::Error;

/// The main error type for filter compilation.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A value could not be converted to its declared type.
    #[error("Cannot cast '{value}' to {data_type}: {reason}")]
    Cast {
        data_type: String,
        value: String,
        reason: String,
    },

    /// Inline type suffix (`value::type`) names no known type.
    #[error("Unknown type: '{0}'. Expected: string, int, int64, float, float64, uint, uint64, date, time or datetime")]
    UnknownType(String),

    /// The JSON filter document is present but malformed.
    #[error("Invalid filter: {0}")]
    FilterDecode(#[from] serde_json::Error),

    /// An order expression is not `column [asc|desc]`.
    #[error("Invalid order expression: '{0}'")]
    InvalidOrder(String),

    /// The dialect has no rendering for this operator.
    #[error("Operator '{operator}' is not supported by the {dialect} dialect")]
    Unsupported {
        dialect: &'static str,
        operator: String,
    },

    /// Column introspection failed while expanding the wildcard.
    #[error("Schema lookup failed for '{table}': {message}")]
    SchemaLookup { table: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    /// Create a cast error for the given type and raw token.
    pub fn cast(
        data_type: impl std::fmt::Display,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Cast {
            data_type: data_type.to_string(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a schema lookup error.
    pub fn schema(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::SchemaLookup {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error was caused by the request itself (bad parameters or
    /// filter body) rather than by a collaborator or the local setup.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Cast { .. }
                | Self::UnknownType(_)
                | Self::FilterDecode(_)
                | Self::InvalidOrder(_)
                | Self::Unsupported { .. }
        )
    }
}

/// Result type alias for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FilterError::cast("int", "abc", "invalid digit found in string");
        assert_eq!(
            err.to_string(),
            "Cannot cast 'abc' to int: invalid digit found in string"
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(FilterError::UnknownType("uuid".into()).is_client_error());
        assert!(FilterError::InvalidOrder("name sideways".into()).is_client_error());
        assert!(!FilterError::schema("users", "connection refused").is_client_error());
        assert!(!FilterError::Config("bad dialect".into()).is_client_error());
    }
}
