//! Error types for Lockbox core primitives.

use thiserror::Error;

/// Errors that can occur while handling core types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Credential name was empty or all slashes.
    #[error("credential name must not be empty")]
    EmptyCredentialName,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
