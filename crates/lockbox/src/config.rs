//! Lockbox configuration.
//!
//! Providers, keys, and the ACL enforcement switch. One key is active at a
//! time; historical keys stay configured so their ciphertexts keep
//! decrypting.

use serde::{Deserialize, Serialize};

use lockbox_core::KeyId;
use lockbox_crypto::{ProviderConfig, ProviderKind};

/// Where a configured key's material comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Derived from the owning password provider's passphrase and salt.
    Derived,
    /// Resident in the owning provider's device or daemon under this label.
    Label(String),
}

/// A configured encryption key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Stable identifier, stored alongside every ciphertext.
    pub id: KeyId,
    /// Name of the provider that owns the key.
    pub provider: String,
    /// Where the key material comes from.
    pub source: KeySource,
    /// Whether new encryptions use this key. Exactly one key is active.
    #[serde(default)]
    pub active: bool,
}

/// Top-level Lockbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockboxConfig {
    /// Configured encryption providers.
    pub providers: Vec<ProviderConfig>,
    /// Configured keys across all providers.
    pub keys: Vec<KeyConfig>,
    /// Whether permission checks are enforced.
    ///
    /// Off, every actor may do everything. Development only.
    #[serde(default = "default_acl_enforced")]
    pub acl_enforced: bool,
}

fn default_acl_enforced() -> bool {
    true
}

impl LockboxConfig {
    /// A single password provider with one derived active key.
    ///
    /// The smallest viable configuration; used by tests and development
    /// setups.
    pub fn single_password_provider(
        provider_name: impl Into<String>,
        passphrase: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        let provider_name = provider_name.into();
        Self {
            providers: vec![ProviderConfig {
                name: provider_name.clone(),
                kind: ProviderKind::Password {
                    passphrase: passphrase.into(),
                    salt: salt.into(),
                },
                key_creation_enabled: false,
            }],
            keys: vec![KeyConfig {
                id: KeyId::generate(),
                provider: provider_name,
                source: KeySource::Derived,
                active: true,
            }],
            acl_enforced: true,
        }
    }

    /// Disable permission checks.
    pub fn with_open_access(mut self) -> Self {
        self.acl_enforced = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_password_provider_shape() {
        let config =
            LockboxConfig::single_password_provider("internal", "passphrase", "0123456789abcdef");

        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.keys.len(), 1);
        assert!(config.keys[0].active);
        assert_eq!(config.keys[0].provider, "internal");
        assert!(config.acl_enforced);
    }

    #[test]
    fn test_open_access_switch() {
        let config =
            LockboxConfig::single_password_provider("internal", "passphrase", "0123456789abcdef")
                .with_open_access();
        assert!(!config.acl_enforced);
    }
}
