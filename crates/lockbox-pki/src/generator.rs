//! Certificate generation: key pair, CA resolution, issuance.
//!
//! The orchestrating layer above [`CertificateIssuer`]: generates a fresh
//! leaf key pair, resolves the signing CA from the registry (falling back
//! to the default CA), and hands back the PEM artifacts. Ownership of the
//! private key transfers to the caller, which is responsible for
//! encrypting it at rest.

use std::sync::Arc;

use rcgen::KeyPair;
use serde::{Deserialize, Serialize};

use crate::authority::{AuthorityStore, CertificateAuthority, DEFAULT_CA_NAME};
use crate::error::{PkiError, Result};
use crate::issuer::CertificateIssuer;
use crate::request::CertificateRequest;

/// The product of certificate generation. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCertificate {
    /// The leaf certificate, PEM encoded.
    pub certificate_pem: String,
    /// The leaf private key, PEM encoded.
    pub private_key_pem: String,
    /// The signing CA's certificate, absent for self-signed leaves.
    pub ca_certificate_pem: Option<String>,
}

/// Generates certificates against a CA registry.
pub struct CertificateGenerator<A: AuthorityStore> {
    authorities: Arc<A>,
}

impl<A: AuthorityStore> CertificateGenerator<A> {
    /// Create a generator over the given authority registry.
    pub fn new(authorities: Arc<A>) -> Self {
        Self { authorities }
    }

    /// Generate a key pair and issue a certificate for it.
    ///
    /// Self-sign when the request asks for it; otherwise resolve the named
    /// CA (or the default) and sign with it. A named CA that does not
    /// exist is a configuration error; so is having neither a name nor a
    /// default CA.
    pub async fn generate(&self, request: &CertificateRequest) -> Result<IssuedCertificate> {
        let key_pair = CertificateIssuer::generate_key_pair()?;

        if request.self_sign {
            let certificate_pem = CertificateIssuer::issue_self_signed(&key_pair, request)?;
            return Ok(IssuedCertificate {
                certificate_pem,
                private_key_pem: key_pair.serialize_pem(),
                ca_certificate_pem: None,
            });
        }

        let ca = self.find_ca(request.ca.as_deref()).await?;
        let certificate_pem = CertificateIssuer::issue_signed_by_ca(&ca, &key_pair, request)?;
        tracing::info!(ca = %ca.name, "issued CA-signed certificate");

        Ok(IssuedCertificate {
            certificate_pem,
            private_key_pem: key_pair.serialize_pem(),
            ca_certificate_pem: Some(ca.certificate_pem),
        })
    }

    async fn find_ca(&self, name: Option<&str>) -> Result<CertificateAuthority> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => self
                .authorities
                .find_one_by_name(name)
                .await?
                .ok_or_else(|| {
                    PkiError::Configuration(format!("no certificate authority named {}", name))
                }),
            None => self
                .authorities
                .find_one_by_name(DEFAULT_CA_NAME)
                .await?
                .ok_or(PkiError::DefaultCaRequired),
        }
    }
}

/// Parse a private key PEM back into a key pair.
pub fn key_pair_from_pem(pem: &str) -> Result<KeyPair> {
    Ok(KeyPair::from_pem(pem)?)
}
