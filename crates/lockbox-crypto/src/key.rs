//! Key material: symmetric keys, handles, and the key ring.
//!
//! A [`KeyMaterial`] binds a key identifier to either raw key bytes held in
//! process memory or a label naming a key resident in an external device.
//! The [`KeyRing`] tracks every known key with one marked active, so values
//! encrypted under rotated-out keys keep decrypting.

use std::collections::HashMap;
use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use lockbox_core::{EncryptionNonce, KeyId};

use crate::error::{CryptoError, Result};

/// A 256-bit symmetric encryption key for ChaCha20-Poly1305.
///
/// Key bytes are wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let nonce = Nonce::from_slice(nonce.as_bytes());
        cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Decrypt data with this key.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;

        let nonce = Nonce::from_slice(nonce.as_bytes());
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key bytes.
        write!(f, "EncryptionKey(..)")
    }
}

/// How a backend addresses the actual key.
#[derive(Debug, Clone)]
pub enum KeyHandle {
    /// Raw key bytes held in process memory (password provider).
    Local(EncryptionKey),

    /// A key resident in an external device or daemon, addressed by label
    /// (HSM and external providers).
    Label(String),
}

/// A piece of key material: identifier, owning provider, and key handle.
///
/// Immutable once constructed; one exists per configured key.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    id: KeyId,
    provider: String,
    handle: KeyHandle,
}

impl KeyMaterial {
    /// Key material backed by in-process key bytes.
    pub fn local(id: KeyId, provider: impl Into<String>, key: EncryptionKey) -> Self {
        Self {
            id,
            provider: provider.into(),
            handle: KeyHandle::Local(key),
        }
    }

    /// Key material resident in an external device, addressed by label.
    pub fn labelled(id: KeyId, provider: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id,
            provider: provider.into(),
            handle: KeyHandle::Label(label.into()),
        }
    }

    /// The key identifier stored alongside ciphertexts.
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// The name of the provider that owns this key.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The key handle.
    pub fn handle(&self) -> &KeyHandle {
        &self.handle
    }

    /// Get the in-process key, or fail if this key lives in a device.
    pub fn expect_local(&self) -> Result<&EncryptionKey> {
        match &self.handle {
            KeyHandle::Local(key) => Ok(key),
            KeyHandle::Label(label) => Err(CryptoError::WrongKeyHandle(format!(
                "key {} is device-resident (label {})",
                self.id, label
            ))),
        }
    }

    /// Get the device label, or fail if this key is in-process material.
    pub fn expect_label(&self) -> Result<&str> {
        match &self.handle {
            KeyHandle::Label(label) => Ok(label),
            KeyHandle::Local(_) => Err(CryptoError::WrongKeyHandle(format!(
                "key {} is local material, not device-resident",
                self.id
            ))),
        }
    }
}

/// The set of known key materials, one of them active.
///
/// Encryption always uses the active key. Decryption resolves whatever key
/// the ciphertext names, so rotation never orphans stored values.
#[derive(Debug, Clone)]
pub struct KeyRing {
    active: KeyId,
    keys: HashMap<KeyId, KeyMaterial>,
}

impl KeyRing {
    /// Create a ring with a single active key.
    pub fn new(active: KeyMaterial) -> Self {
        let id = active.id();
        let mut keys = HashMap::new();
        keys.insert(id, active);
        Self { active: id, keys }
    }

    /// Add an inactive (historical) key to the ring.
    pub fn add(&mut self, key: KeyMaterial) {
        self.keys.insert(key.id(), key);
    }

    /// Make an already-registered key the active one.
    pub fn set_active(&mut self, id: KeyId) -> Result<()> {
        if !self.keys.contains_key(&id) {
            return Err(CryptoError::UnknownKey(id));
        }
        self.active = id;
        Ok(())
    }

    /// The key used for new encryptions.
    pub fn active(&self) -> &KeyMaterial {
        // The active id always points at a registered key.
        &self.keys[&self.active]
    }

    /// Look up key material by id.
    pub fn get(&self, id: KeyId) -> Option<&KeyMaterial> {
        self.keys.get(&id)
    }

    /// Look up key material by id, failing with an integrity error if the
    /// ciphertext references a key this process does not know.
    pub fn require(&self, id: KeyId) -> Result<&KeyMaterial> {
        self.keys.get(&id).ok_or(CryptoError::UnknownKey(id))
    }

    /// Number of keys in the ring.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the ring is empty (never true: a ring always has its active key).
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();
        let plaintext = b"hello, world!";

        let ciphertext = key.encrypt(plaintext, &nonce).unwrap();
        assert_ne!(ciphertext, plaintext);

        let decrypted = key.decrypt(&ciphertext, &nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();

        let ciphertext = key1.encrypt(b"secret", &nonce).unwrap();

        // Wrong key should fail
        assert!(key2.decrypt(&ciphertext, &nonce).is_err());
    }

    #[test]
    fn test_key_ring_rotation() {
        let old = KeyMaterial::local(KeyId::generate(), "internal", EncryptionKey::generate());
        let new = KeyMaterial::local(KeyId::generate(), "internal", EncryptionKey::generate());
        let old_id = old.id();
        let new_id = new.id();

        let mut ring = KeyRing::new(old);
        ring.add(new);
        ring.set_active(new_id).unwrap();

        assert_eq!(ring.active().id(), new_id);
        // The rotated-out key is still resolvable for decryption.
        assert!(ring.get(old_id).is_some());
    }

    #[test]
    fn test_key_ring_unknown_key() {
        let ring = KeyRing::new(KeyMaterial::local(
            KeyId::generate(),
            "internal",
            EncryptionKey::generate(),
        ));

        let unknown = KeyId::generate();
        assert!(matches!(
            ring.require(unknown),
            Err(CryptoError::UnknownKey(id)) if id == unknown
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_encrypt_decrypt_round_trip(
            plaintext in proptest::collection::vec(proptest::num::u8::ANY, 0..512)
        ) {
            let key = EncryptionKey::from_bytes([0x42; 32]);
            let nonce = EncryptionNonce::from_bytes([7; 12]);

            let ciphertext = key.encrypt(&plaintext, &nonce).unwrap();
            let decrypted = key.decrypt(&ciphertext, &nonce).unwrap();
            proptest::prop_assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_expect_local_rejects_label() {
        let key = KeyMaterial::labelled(KeyId::generate(), "hsm", "partition-key-1");
        assert!(matches!(
            key.expect_local(),
            Err(CryptoError::WrongKeyHandle(_))
        ));
        assert_eq!(key.expect_label().unwrap(), "partition-key-1");
    }
}
