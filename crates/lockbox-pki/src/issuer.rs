//! Certificate issuance.
//!
//! Request → validated → signed. Validation failures name the offending
//! value and never reach the signer. One fixed signature algorithm is used
//! everywhere; the SAN extension is embedded only when the validated list
//! is non-empty.

use rcgen::{
    CertificateParams, DistinguishedName, DnType, Ia5String, KeyPair, SanType,
    SignatureAlgorithm, PKCS_ECDSA_P256_SHA256,
};
use time::{Duration, OffsetDateTime};

use crate::authority::CertificateAuthority;
use crate::error::{PkiError, Result};
use crate::request::CertificateRequest;
use crate::san::{validate_alternative_names, AlternativeName};

/// The one signature algorithm certificates are issued with:
/// ECDSA P-256 with SHA-256.
pub static SIGNATURE_ALGORITHM: &SignatureAlgorithm = &PKCS_ECDSA_P256_SHA256;

/// Issues X.509 leaf certificates.
pub struct CertificateIssuer;

impl CertificateIssuer {
    /// Generate a key pair suitable for issuance.
    pub fn generate_key_pair() -> Result<KeyPair> {
        Ok(KeyPair::generate_for(SIGNATURE_ALGORITHM)?)
    }

    /// Issue a certificate signed by the key pair itself.
    ///
    /// Returns the certificate PEM.
    pub fn issue_self_signed(key_pair: &KeyPair, request: &CertificateRequest) -> Result<String> {
        let params = build_params(request)?;
        let certificate = params.self_signed(key_pair)?;
        Ok(certificate.pem())
    }

    /// Issue a certificate signed by a certificate authority.
    ///
    /// The issuer distinguished name comes from the CA certificate; the CA
    /// key signs. Returns the certificate PEM.
    pub fn issue_signed_by_ca(
        ca: &CertificateAuthority,
        key_pair: &KeyPair,
        request: &CertificateRequest,
    ) -> Result<String> {
        let params = build_params(request)?;

        let ca_key = KeyPair::from_pem(&ca.private_key_pem)?;
        let ca_params = CertificateParams::from_ca_cert_pem(&ca.certificate_pem)?;
        let ca_certificate = ca_params.self_signed(&ca_key)?;

        let certificate = params.signed_by(key_pair, &ca_certificate, &ca_key)?;
        Ok(certificate.pem())
    }
}

/// Validate the request and translate it into signing parameters.
fn build_params(request: &CertificateRequest) -> Result<CertificateParams> {
    request.validate()?;
    let alternative_names = validate_alternative_names(&request.alternative_names)?;

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(request);

    let now = OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + Duration::days(request.duration_days);

    // No names means no SAN extension at all, not an empty one.
    if !alternative_names.is_empty() {
        params.subject_alt_names = alternative_names
            .iter()
            .map(to_san_type)
            .collect::<Result<Vec<_>>>()?;
    }

    Ok(params)
}

fn distinguished_name(request: &CertificateRequest) -> DistinguishedName {
    let mut dn = DistinguishedName::new();

    let attributes = [
        (DnType::OrganizationName, &request.organization),
        (DnType::StateOrProvinceName, &request.state),
        (DnType::CountryName, &request.country),
        (DnType::CommonName, &request.common_name),
        (DnType::OrganizationalUnitName, &request.organization_unit),
        (DnType::LocalityName, &request.locality),
    ];

    for (dn_type, value) in attributes {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            dn.push(dn_type, value);
        }
    }

    dn
}

fn to_san_type(name: &AlternativeName) -> Result<SanType> {
    match name {
        AlternativeName::Dns(dns) => {
            let ia5 = Ia5String::try_from(dns.clone())
                .map_err(|_| PkiError::InvalidAlternativeName(dns.clone()))?;
            Ok(SanType::DnsName(ia5))
        }
        AlternativeName::Ip(ip) => Ok(SanType::IpAddress(*ip)),
    }
}
