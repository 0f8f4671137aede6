//! Path name grammar

use super::error::NameError;

/// Names that match every path and are consulted last
pub const RESERVED_NAMES: [&str; 2] = ["all", "all_others"];

/// Check whether a name is one of the catch-all entries
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Validate a literal path name
///
/// Accepted names are non-empty, do not begin or end with `/` and only use
/// `[A-Za-z0-9_.~/-]`.
pub fn validate_path_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name.starts_with('/') {
        return Err(NameError::LeadingSlash);
    }

    if name.ends_with('/') {
        return Err(NameError::TrailingSlash);
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '.' | '~');
    if !name.chars().all(allowed) {
        return Err(NameError::InvalidCharacters);
    }

    Ok(())
}
