//! Error types for docvet operations

use thiserror::Error;

/// Main error type for docvet operations.
///
/// These are the fatal errors: failures to compile a set of constraints
/// into a validator, and infrastructure failures during a validation call.
/// Per-value validation findings are not errors; they are accumulated as
/// `ValidationResult` records by the validator.
#[derive(Error, Debug)]
pub enum DocvetError {
    /// A constraint set failed shape validation
    #[error("constraint set {set:?} is not valid: {message}")]
    InvalidConstraintSet {
        /// Name of the offending constraint set
        set: String,
        /// What was wrong with it
        message: String,
    },

    /// A block `ref` could not be resolved, or resolution found a cycle
    #[error("invalid block reference: {0}")]
    BlockReference(String),

    /// The same document type was declared by more than one constraint
    #[error("document type {doc_type:?} redeclared in {set:?}")]
    RedeclaredDocumentType {
        /// The document type that was declared twice
        doc_type: String,
        /// The constraint set carrying the second declaration
        set: String,
    },

    /// Enum declaration or resolution failure
    #[error("invalid enums: {0}")]
    Enum(String),

    /// HTML policy declaration or resolution failure
    #[error("failed to resolve HTML policies: {0}")]
    HtmlPolicy(String),

    /// A deprecation handler returned an error, aborting validation
    #[error("deprecation handler failure: {0}")]
    DeprecationHandler(String),

    /// JSON encoding or decoding failure
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for docvet operations.
pub type Result<T> = std::result::Result<T, DocvetError>;

impl DocvetError {
    /// Create an invalid-constraint-set error
    #[must_use]
    pub fn invalid_set(set: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConstraintSet {
            set: set.into(),
            message: message.into(),
        }
    }

    /// Create a block reference error
    #[must_use]
    pub fn block_reference(message: impl Into<String>) -> Self {
        Self::BlockReference(message.into())
    }

    /// Create an enum error
    #[must_use]
    pub fn enums(message: impl Into<String>) -> Self {
        Self::Enum(message.into())
    }

    /// Create an HTML policy error
    #[must_use]
    pub fn html_policy(message: impl Into<String>) -> Self {
        Self::HtmlPolicy(message.into())
    }

    /// Create a deprecation handler error
    #[must_use]
    pub fn deprecation_handler(message: impl Into<String>) -> Self {
        Self::DeprecationHandler(message.into())
    }
}

impl From<serde_json::Error> for DocvetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
