//! Password-derived encryption provider.
//!
//! Derives a 256-bit key from a configured passphrase and salt via
//! PBKDF2-HMAC-SHA256, then performs pure local AEAD. No external
//! dependency, nothing to reconnect. This is the fallback provider when no
//! hardware or external service is configured.

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use lockbox_core::{EncryptedValue, EncryptionNonce, KeyId};

use crate::backend::EncryptionBackend;
use crate::error::{CryptoError, Result};
use crate::key::{EncryptionKey, KeyMaterial};

/// PBKDF2 iteration count for key derivation.
pub const DERIVATION_ITERATIONS: u32 = 100_000;

/// Minimum accepted salt length in bytes.
pub const MIN_SALT_LEN: usize = 8;

/// Derive a 256-bit key from a passphrase and salt.
///
/// Deterministic: the same inputs always yield the same key, so the derived
/// key material survives process restarts without persisting key bytes.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Result<EncryptionKey> {
    if passphrase.is_empty() {
        return Err(CryptoError::Configuration(
            "encryption password must not be empty".into(),
        ));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::Configuration(format!(
            "encryption salt must be at least {} bytes, got {}",
            MIN_SALT_LEN,
            salt.len()
        )));
    }

    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        salt,
        DERIVATION_ITERATIONS,
        &mut key,
    );
    Ok(EncryptionKey::from_bytes(key))
}

/// Derive key material for a password provider.
pub fn derive_key_material(
    id: KeyId,
    provider: &str,
    passphrase: &str,
    salt: &[u8],
) -> Result<KeyMaterial> {
    let key = derive_key(passphrase, salt)?;
    Ok(KeyMaterial::local(id, provider, key))
}

/// The password-derived encryption backend.
///
/// Stateless: the derived key travels in the [`KeyMaterial`] handle, so the
/// backend itself holds nothing secret.
pub struct PasswordBackend;

impl PasswordBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl Default for PasswordBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncryptionBackend for PasswordBackend {
    async fn encrypt(&self, key: &KeyMaterial, plaintext: &[u8]) -> Result<EncryptedValue> {
        let local = key.expect_local()?;
        let nonce = EncryptionNonce::generate();
        let ciphertext = local.encrypt(plaintext, &nonce)?;
        Ok(EncryptedValue::new(key.id(), ciphertext, nonce))
    }

    async fn decrypt(
        &self,
        key: &KeyMaterial,
        ciphertext: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        let local = key.expect_local()?;
        local.decrypt(ciphertext, nonce)
    }

    async fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &[u8] = b"0123456789abcdef";

    fn material() -> KeyMaterial {
        derive_key_material(KeyId::generate(), "internal", "correct horse battery", SALT)
            .unwrap()
    }

    #[tokio::test]
    async fn test_password_round_trip() {
        let backend = PasswordBackend::new();
        let key = material();

        let sealed = backend.encrypt(&key, b"super secret").await.unwrap();
        let opened = backend
            .decrypt(&key, &sealed.ciphertext, &sealed.nonce)
            .await
            .unwrap();

        assert_eq!(opened, b"super secret");
        assert_eq!(sealed.key_id, key.id());
    }

    #[tokio::test]
    async fn test_password_fresh_nonce_per_encrypt() {
        let backend = PasswordBackend::new();
        let key = material();

        let a = backend.encrypt(&key, b"same input").await.unwrap();
        let b = backend.encrypt(&key, b"same input").await.unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let k1 = derive_key("passphrase", SALT).unwrap();
        let k2 = derive_key("passphrase", SALT).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());

        let k3 = derive_key("other passphrase", SALT).unwrap();
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }

    #[test]
    fn test_derivation_rejects_bad_config() {
        assert!(matches!(
            derive_key("", SALT),
            Err(CryptoError::Configuration(_))
        ));
        assert!(matches!(
            derive_key("passphrase", b"short"),
            Err(CryptoError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_password_rejects_device_key() {
        let backend = PasswordBackend::new();
        let key = KeyMaterial::labelled(KeyId::generate(), "hsm", "partition-key");

        assert!(matches!(
            backend.encrypt(&key, b"data").await,
            Err(CryptoError::WrongKeyHandle(_))
        ));
    }

    #[tokio::test]
    async fn test_fill_random() {
        let backend = PasswordBackend::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        backend.fill_random(&mut a).await.unwrap();
        backend.fill_random(&mut b).await.unwrap();
        assert_ne!(a, b);
    }
}
