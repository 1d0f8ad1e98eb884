//! Error types for the encryption provider core.

use lockbox_core::KeyId;
use thiserror::Error;

/// Errors that can occur during encryption operations.
///
/// The taxonomy matters to callers: configuration errors are fatal and never
/// retried; transient errors are candidates for [`crate::TimedRetry`];
/// everything else is surfaced as-is.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Unknown or misconfigured provider. Fatal, never retried.
    #[error("provider configuration error: {0}")]
    Configuration(String),

    /// A backend failure that may heal (HSM session drop, daemon
    /// connection refused). Retried at the caller's discretion.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// Encryption failed for a non-transient reason.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Decryption failed (bad tag, wrong key). Unrecoverable.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// No key material is registered under this id.
    #[error("unknown encryption key: {0}")]
    UnknownKey(KeyId),

    /// The key material's handle kind does not match the provider
    /// (e.g. a device label handed to the password provider).
    #[error("key handle not usable by this provider: {0}")]
    WrongKeyHandle(String),

    /// Stored data failed to decode. Unrecoverable.
    #[error("data integrity error: {0}")]
    Integrity(String),
}

impl CryptoError {
    /// Whether this error is worth retrying after a reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(self, CryptoError::Transient(_))
    }
}

/// Result type for encryption operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
