//! Error types for the permission engine.

use thiserror::Error;

use lockbox_store::StoreError;

/// Errors that can occur during permission operations.
///
/// Note that "access denied" is not here: the engine reports insufficient
/// operations as a boolean or an empty set, never as an error.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
