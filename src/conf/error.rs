//! Configuration error types
//!
//! Error types for path name validation, path lookup and configuration
//! loading.

/// Why a path name was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Name is empty
    #[error("cannot be empty")]
    Empty,
    /// Name starts with `/`
    #[error("can't begin with a slash")]
    LeadingSlash,
    /// Name ends with `/`
    #[error("can't end with a slash")]
    TrailingSlash,
    /// Name contains characters outside the allowed set
    #[error("can contain only alphanumeric characters, underscore, dot, tilde, minus or slash")]
    InvalidCharacters,
}

/// Error type for path lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Requested name is malformed
    #[error("invalid path name: {reason} ({name})")]
    InvalidName { name: String, reason: NameError },

    /// No configuration entry matches the name
    #[error("path '{0}' is not configured")]
    NotConfigured(String),
}

/// Error type for configuration loading and validation
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    /// A configured literal path name is malformed
    #[error("invalid path name '{name}': {reason}")]
    InvalidName { name: String, reason: NameError },

    /// A `~` path does not compile
    #[error("invalid regular expression: {pattern}")]
    InvalidRegex { pattern: String },

    /// A path entry breaks a validation rule
    #[error("path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The same path name is declared twice
    #[error("path '{0}' is declared more than once")]
    DuplicatePath(String),

    /// A global setting is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Malformed duration string
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    /// Configuration text is not valid JSON for the expected shape
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfError {
    pub(crate) fn path(path: &str, reason: impl Into<String>) -> Self {
        ConfError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
