//! Backend trait: the one capability set every encryption provider offers.
//!
//! The provider registry hands out trait objects; callers never know which
//! variant (HSM, external daemon, password-derived) is underneath.

use async_trait::async_trait;

use lockbox_core::{EncryptedValue, EncryptionNonce};

use crate::error::{CryptoError, Result};
use crate::key::KeyMaterial;

/// An at-rest encryption backend.
///
/// Implementations must tolerate concurrent `encrypt`/`decrypt` calls from
/// many tasks. `reconnect` is a best-effort recovery hook: callers invoke it
/// (typically through [`crate::TimedRetry`]) after a transient failure, and
/// implementations must serialize it against themselves so two failing tasks
/// cannot tear down one another's fresh session.
#[async_trait]
pub trait EncryptionBackend: Send + Sync {
    /// Encrypt `plaintext` under the given key material.
    ///
    /// Produces a fresh random nonce per call; the nonce is never reused
    /// for the same key.
    async fn encrypt(&self, key: &KeyMaterial, plaintext: &[u8]) -> Result<EncryptedValue>;

    /// Decrypt a ciphertext produced by [`EncryptionBackend::encrypt`].
    async fn decrypt(
        &self,
        key: &KeyMaterial,
        ciphertext: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>>;

    /// Fill `dest` with cryptographically secure random bytes.
    async fn fill_random(&self, dest: &mut [u8]) -> Result<()>;

    /// Make sure the key behind `key` is usable.
    ///
    /// Device-backed providers create or wait for their resident keys here;
    /// the default implementation has nothing to prepare.
    async fn prepare_key(&self, _key: &KeyMaterial) -> Result<()> {
        Ok(())
    }

    /// Best-effort recovery after a transient failure.
    ///
    /// Non-transient errors are ignored. The default implementation does
    /// nothing; providers without connection state need no recovery.
    async fn reconnect(&self, _last_error: &CryptoError) -> Result<()> {
        Ok(())
    }
}
