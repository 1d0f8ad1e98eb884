//! Error types for certificate issuance.

use thiserror::Error;

/// Errors that can occur during certificate issuance.
#[derive(Debug, Error)]
pub enum PkiError {
    /// An alternative name failed validation. Names the offending entry.
    #[error("invalid alternative name: {0}")]
    InvalidAlternativeName(String),

    /// The request is missing required values or carries impossible ones.
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),

    /// A named certificate authority does not exist.
    #[error("certificate configuration error: {0}")]
    Configuration(String),

    /// No CA name was given and no default CA is configured.
    #[error("default CA required")]
    DefaultCaRequired,

    /// Key generation, PEM handling, or signing failed in the PKI toolkit.
    #[error("certificate signing error: {0}")]
    Signing(#[from] rcgen::Error),
}

/// Result type for certificate operations.
pub type Result<T> = std::result::Result<T, PkiError>;
