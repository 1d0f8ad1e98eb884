//! Certificate request parameters.

use serde::{Deserialize, Serialize};

use crate::error::{PkiError, Result};

/// Default certificate lifetime.
pub const DEFAULT_DURATION_DAYS: i64 = 365;

/// Longest accepted certificate lifetime.
pub const MAX_DURATION_DAYS: i64 = 3650;

/// Parameters for issuing a certificate.
///
/// Validated before signing. Never persisted in this form; only the
/// resulting PEM artifacts are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// Subject organization (O).
    pub organization: Option<String>,
    /// Subject organizational unit (OU).
    pub organization_unit: Option<String>,
    /// Subject locality (L).
    pub locality: Option<String>,
    /// Subject state or province (ST).
    pub state: Option<String>,
    /// Subject country (C).
    pub country: Option<String>,
    /// Subject common name (CN).
    pub common_name: Option<String>,
    /// Alternative names, validated before signing.
    pub alternative_names: Vec<String>,
    /// Certificate lifetime in days.
    pub duration_days: i64,
    /// Name of the signing CA. `None` falls back to the default CA.
    pub ca: Option<String>,
    /// Sign with the leaf's own key instead of a CA.
    pub self_sign: bool,
}

impl Default for CertificateRequest {
    fn default() -> Self {
        Self {
            organization: None,
            organization_unit: None,
            locality: None,
            state: None,
            country: None,
            common_name: None,
            alternative_names: Vec::new(),
            duration_days: DEFAULT_DURATION_DAYS,
            ca: None,
            self_sign: false,
        }
    }
}

impl CertificateRequest {
    /// Check the request holds enough to build a subject at all.
    ///
    /// At least one subject attribute is required, and the duration must
    /// fall in `1..=MAX_DURATION_DAYS`. Alternative names are validated
    /// separately, entry by entry.
    pub fn validate(&self) -> Result<()> {
        let has_subject = [
            &self.organization,
            &self.organization_unit,
            &self.locality,
            &self.state,
            &self.country,
            &self.common_name,
        ]
        .into_iter()
        .any(|attr| attr.as_deref().is_some_and(|s| !s.is_empty()));

        if !has_subject {
            return Err(PkiError::InvalidRequest(
                "at least one subject attribute is required".into(),
            ));
        }

        if !(1..=MAX_DURATION_DAYS).contains(&self.duration_days) {
            return Err(PkiError::InvalidRequest(format!(
                "duration must be between 1 and {} days, got {}",
                MAX_DURATION_DAYS, self.duration_days
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_duration() {
        let request = CertificateRequest::default();
        assert_eq!(request.duration_days, 365);
    }

    #[test]
    fn test_validate_requires_a_subject_attribute() {
        let request = CertificateRequest::default();
        assert!(matches!(
            request.validate(),
            Err(PkiError::InvalidRequest(_))
        ));

        let request = CertificateRequest {
            organization: Some("my-org".into()),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_durations() {
        let request = CertificateRequest {
            common_name: Some("cn".into()),
            duration_days: 0,
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = CertificateRequest {
            common_name: Some("cn".into()),
            duration_days: MAX_DURATION_DAYS + 1,
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}
