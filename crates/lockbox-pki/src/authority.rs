//! Certificate authorities and their registry.
//!
//! A CA is a named (certificate PEM, private key PEM) pair. The generator
//! resolves CAs by name, falling back to `"default"` when the request does
//! not name one.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::{PkiError, Result};
use crate::issuer::SIGNATURE_ALGORITHM;

/// The CA name used when a request does not name one.
pub const DEFAULT_CA_NAME: &str = "default";

/// A named certificate authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateAuthority {
    /// Registry name.
    pub name: String,
    /// The CA certificate, PEM encoded.
    pub certificate_pem: String,
    /// The CA private key, PEM encoded.
    pub private_key_pem: String,
}

impl CertificateAuthority {
    /// Generate a self-signed root CA.
    ///
    /// Used at provisioning time and throughout the test suites.
    pub fn generate_root(
        name: impl Into<String>,
        common_name: &str,
        duration_days: i64,
    ) -> Result<Self> {
        let key_pair = KeyPair::generate_for(SIGNATURE_ALGORITHM)?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + Duration::days(duration_days);

        let certificate = params.self_signed(&key_pair)?;

        Ok(Self {
            name: name.into(),
            certificate_pem: certificate.pem(),
            private_key_pem: key_pair.serialize_pem(),
        })
    }
}

/// Lookup and storage of certificate authorities.
#[async_trait]
pub trait AuthorityStore: Send + Sync {
    /// Find a CA by its registry name.
    async fn find_one_by_name(&self, name: &str) -> Result<Option<CertificateAuthority>>;

    /// Register a CA, replacing any existing one with the same name.
    async fn save(&self, authority: CertificateAuthority) -> Result<()>;
}

/// In-memory authority registry.
pub struct MemoryAuthorityStore {
    inner: RwLock<HashMap<String, CertificateAuthority>>,
}

impl MemoryAuthorityStore {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAuthorityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorityStore for MemoryAuthorityStore {
    async fn find_one_by_name(&self, name: &str) -> Result<Option<CertificateAuthority>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PkiError::Configuration(format!("authority store poisoned: {}", e)))?;
        Ok(inner.get(name).cloned())
    }

    async fn save(&self, authority: CertificateAuthority) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| PkiError::Configuration(format!("authority store poisoned: {}", e)))?;
        inner.insert(authority.name.clone(), authority);
        Ok(())
    }
}
