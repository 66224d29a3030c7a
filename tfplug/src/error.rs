//! Error types for tfplug

/// Error type for tfplug operations
#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Resource type not found: {0}")]
    ResourceNotFound(String),

    #[error("Data source type not found: {0}")]
    DataSourceNotFound(String),

    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Custom(String),
}

impl TfplugError {
    /// True when the error only says the attribute is absent or null
    pub fn is_missing(&self) -> bool {
        matches!(self, TfplugError::AttributeNotFound(_))
            || matches!(self, TfplugError::TypeMismatch { actual, .. } if actual == "null")
    }
}

/// Result type alias for tfplug operations
pub type Result<T> = std::result::Result<T, TfplugError>;

impl From<String> for TfplugError {
    fn from(s: String) -> Self {
        TfplugError::Custom(s)
    }
}

impl From<&str> for TfplugError {
    fn from(s: &str) -> Self {
        TfplugError::Custom(s.to_string())
    }
}
