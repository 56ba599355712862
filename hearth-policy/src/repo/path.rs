//! Object path validation

use crate::types::PolicyError;

/// Reject paths that could escape the repository.
///
/// A path is refused when any segment, split on `/` or `\`, is `..`, also
/// when the dots or separators are percent-encoded. Returns the path without
/// leading separators.
pub fn validate_path(path: &str) -> Result<&str, PolicyError> {
    let decoded = path
        .to_ascii_lowercase()
        .replace("%2e", ".")
        .replace("%2f", "/")
        .replace("%5c", "\\");
    if decoded.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PolicyError::InvalidPath(path.to_string()));
    }
    Ok(path.trim_start_matches(['/', '\\']))
}
