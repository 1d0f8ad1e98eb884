//! Credential name handling.
//!
//! Credential names are slash-delimited paths. Every lookup and write goes
//! through [`normalize`] so that `foo/bar` and `/foo/bar` address the same
//! credential.

use crate::error::CoreError;

/// Normalize a credential name to its canonical form.
///
/// Prepends the leading slash if missing. Returns an error for empty names
/// or names that are nothing but slashes.
pub fn normalize(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '/') {
        return Err(CoreError::EmptyCredentialName);
    }

    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{}", trimmed))
    }
}
