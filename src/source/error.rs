//! Static source error types

use super::kind::SourceKind;

/// Error type for static sources and their supervisor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Template substitution produced something that is not a URL
    #[error("invalid source URI '{uri}': {reason}")]
    InvalidSourceUri { uri: String, reason: String },

    /// The source execution failed
    #[error("{0}")]
    RunFailure(String),

    /// The source execution returned without being asked to stop
    #[error("source exited unexpectedly")]
    Exited,

    /// The source execution panicked
    #[error("source panicked: {0}")]
    Panicked(String),

    /// Handshake attempted after the supervisor was stopped
    #[error("terminated")]
    Terminated,

    /// The path owner declined the readiness announcement
    #[error("{0}")]
    Rejected(String),

    /// No implementation is registered for this kind of source
    #[error("unsupported source type: {0}")]
    Unsupported(SourceKind),

    /// The configured source is not a static source
    #[error("'{0}' is not a static source")]
    NotStatic(String),
}

impl SourceError {
    /// Wrap any displayable error as a run failure
    pub fn run(err: impl std::fmt::Display) -> Self {
        SourceError::RunFailure(err.to_string())
    }
}
