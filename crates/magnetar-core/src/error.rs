// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Magnetar data-model operations
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(magnetar::serialization_error),
        help("Ensure the resource format is valid JSON or YAML")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed scheduler annotation
    #[error("Malformed annotation {key}: {message}")]
    #[diagnostic(
        code(magnetar::malformed_annotation),
        help("The annotation value must be the JSON document the scheduler wrote; re-apply it with the CLI")
    )]
    MalformedAnnotation {
        #[allow(unused)]
        key: String,
        #[allow(unused)]
        message: String,
    },

    /// Invalid resource
    #[error("Invalid resource: {reason}")]
    #[diagnostic(code(magnetar::invalid_resource), help("{suggestion}"))]
    InvalidResource {
        #[allow(unused)]
        reason: String,
        #[allow(unused)]
        suggestion: String,
    },
}

/// Result type alias for Magnetar core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Create a MalformedAnnotation error
    pub fn malformed_annotation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedAnnotation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidResource error
    pub fn invalid_resource(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidResource {
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }
}
