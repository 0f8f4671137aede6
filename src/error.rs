//! Crate-wide error type
//!
//! Each module keeps its own error enum; this type wraps them so embedders
//! can propagate any of them with `?`.

use crate::conf::{ConfError, PathError};
use crate::source::SourceError;

/// Any error produced by the path router core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or validated
    #[error(transparent)]
    Conf(#[from] ConfError),

    /// Path lookup failed
    #[error(transparent)]
    Path(#[from] PathError),

    /// Static source could not be created or run
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
