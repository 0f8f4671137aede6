//! Source string template resolution
//!
//! Configured sources may reference regex capture groups (`$G1`, `$G2`, ...)
//! and the activation query string (`$MTX_QUERY`). The substituted string
//! must parse as a URL; the path credentials are then written into its
//! authority.

use url::Url;

use super::error::SourceError;

/// Placeholder replaced with the activation query
pub const QUERY_PLACEHOLDER: &str = "$MTX_QUERY";

/// Substitute placeholders and inject credentials
///
/// `matches` is the full submatch list (group 0 is the whole name and is not
/// substitutable). Higher group numbers are replaced first so that `$G10` is
/// not consumed by `$G1`. Credentials always override those embedded in the
/// template; empty credentials clear them.
pub fn resolve_source(
    source: &str,
    matches: &[String],
    query: &str,
    username: &str,
    password: &str,
) -> Result<String, SourceError> {
    let mut resolved = source.to_string();

    for (i, group) in matches.iter().enumerate().skip(1).rev() {
        resolved = resolved.replace(&format!("$G{}", i), group);
    }

    resolved = resolved.replace(QUERY_PLACEHOLDER, query);

    let invalid = |reason: String| SourceError::InvalidSourceUri {
        uri: resolved.clone(),
        reason,
    };

    let mut url = Url::parse(&resolved).map_err(|e| invalid(e.to_string()))?;

    url.set_username(username)
        .map_err(|_| invalid("cannot carry credentials".to_string()))?;
    let password = (!password.is_empty()).then_some(password);
    url.set_password(password)
        .map_err(|_| invalid("cannot carry credentials".to_string()))?;

    Ok(url.to_string())
}
