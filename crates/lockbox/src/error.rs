//! Error types for the Lockbox facade.

use thiserror::Error;

use lockbox_core::{CoreError, Operation};
use lockbox_crypto::CryptoError;
use lockbox_perms::PermsError;
use lockbox_pki::PkiError;
use lockbox_store::StoreError;

/// Errors that can occur during Lockbox operations.
#[derive(Debug, Error)]
pub enum LockboxError {
    /// Core validation error (bad name, malformed id).
    #[error("validation error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Permission engine error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Encryption provider error.
    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),

    /// Certificate issuance error.
    #[error("certificate error: {0}")]
    Pki(#[from] PkiError),

    /// The named credential does not exist.
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// The actor lacks the required operation on the path.
    ///
    /// Produced by the facade from the engine's boolean result; the engine
    /// itself never errors for denial.
    #[error("access denied: {actor} lacks {operation} on {path}")]
    AccessDenied {
        actor: String,
        path: String,
        operation: Operation,
    },

    /// Startup or key configuration problem.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stored value failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for Lockbox operations.
pub type Result<T> = std::result::Result<T, LockboxError>;
