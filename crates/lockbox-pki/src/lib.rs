//! # Lockbox PKI
//!
//! Certificate issuance: SAN validation, self-signed and CA-signed X.509
//! leaves, and the certificate-authority registry.
//!
//! ## Overview
//!
//! Issuance is a short pipeline: a [`CertificateRequest`] is validated
//! (subject attributes, duration bounds, and each alternative name), then
//! signed, either by the leaf's own key or by a CA resolved by name from
//! an [`AuthorityStore`] with `"default"` as the fallback name.
//!
//! ## Validation policy
//!
//! Alternative names are accepted only as DNS names (optional leading
//! wildcard label) or IPv4/IPv6 literals. Email addresses and URIs are
//! legal in X.509 but rejected here deliberately. Rejections always name
//! the offending entry and no certificate is produced.
//!
//! One signature algorithm is used everywhere: ECDSA P-256 with SHA-256.
//! A certificate with zero alternative names carries no SAN extension at
//! all.

pub mod authority;
pub mod error;
pub mod generator;
pub mod issuer;
pub mod request;
pub mod san;

pub use authority::{
    AuthorityStore, CertificateAuthority, MemoryAuthorityStore, DEFAULT_CA_NAME,
};
pub use error::{PkiError, Result};
pub use generator::{key_pair_from_pem, CertificateGenerator, IssuedCertificate};
pub use issuer::{CertificateIssuer, SIGNATURE_ALGORITHM};
pub use request::{CertificateRequest, DEFAULT_DURATION_DAYS, MAX_DURATION_DAYS};
pub use san::{validate_alternative_names, AlternativeName};
