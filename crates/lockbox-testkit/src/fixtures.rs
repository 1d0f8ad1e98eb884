//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a ready-to-use Lockbox over an
//! in-memory store, deterministic key material, and a flaky HSM device for
//! exercising reconnect paths.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use lockbox::{Lockbox, LockboxConfig};
use lockbox_core::KeyId;
use lockbox_crypto::{
    CryptoError, EncryptionKey, HsmConnector, HsmSession, KeyMaterial, ProviderRegistry,
    SoftHsmDevice,
};
use lockbox_pki::{AuthorityStore, CertificateAuthority, MemoryAuthorityStore, DEFAULT_CA_NAME};
use lockbox_store::MemoryStore;

/// Passphrase used by fixture configs.
pub const TEST_PASSPHRASE: &str = "fixture passphrase";

/// Salt used by fixture configs.
pub const TEST_SALT: &str = "0123456789abcdef";

/// A test fixture with a memory-backed Lockbox.
pub struct TestFixture {
    pub lockbox: Lockbox<MemoryStore>,
    pub authorities: Arc<MemoryAuthorityStore>,
}

impl TestFixture {
    /// A Lockbox with one password provider and ACLs enforced.
    pub async fn new() -> Self {
        Self::with_config(LockboxConfig::single_password_provider(
            "internal",
            TEST_PASSPHRASE,
            TEST_SALT,
        ))
        .await
    }

    /// A Lockbox with permission checks disabled.
    pub async fn open_access() -> Self {
        Self::with_config(
            LockboxConfig::single_password_provider("internal", TEST_PASSPHRASE, TEST_SALT)
                .with_open_access(),
        )
        .await
    }

    /// A Lockbox built from an arbitrary config.
    pub async fn with_config(config: LockboxConfig) -> Self {
        let authorities = Arc::new(MemoryAuthorityStore::new());
        let lockbox = Lockbox::new(
            Arc::new(MemoryStore::new()),
            Arc::clone(&authorities),
            ProviderRegistry::new(),
            config,
        )
        .await
        .expect("fixture config must assemble");

        Self {
            lockbox,
            authorities,
        }
    }

    /// Register a default root CA so certificate generation works.
    pub async fn seed_default_ca(&self) -> CertificateAuthority {
        let ca = CertificateAuthority::generate_root(DEFAULT_CA_NAME, "Fixture Root", 3650)
            .expect("root generation");
        self.authorities.save(ca.clone()).await.expect("save CA");
        ca
    }
}

/// Local key material with fixed key bytes for unit tests.
pub fn deterministic_key_material(seed: u8) -> KeyMaterial {
    KeyMaterial::local(
        KeyId::generate(),
        "internal",
        EncryptionKey::from_bytes([seed; 32]),
    )
}

/// A connector whose sessions fail with transient errors while tripped.
///
/// Reconnecting yields a healthy session again, so retry-with-reconnect
/// paths can be driven deterministically.
#[derive(Clone)]
pub struct FlakyHsm {
    inner: SoftHsmDevice,
    broken: Arc<AtomicBool>,
    connects: Arc<AtomicU32>,
}

impl FlakyHsm {
    /// Wrap a soft device.
    pub fn new(inner: SoftHsmDevice) -> Self {
        Self {
            inner,
            broken: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Make every open session start failing.
    pub fn drop_session(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// How many sessions have been opened so far.
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HsmConnector for FlakyHsm {
    async fn connect(&self) -> Result<Box<dyn HsmSession>, CryptoError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.broken.store(false, Ordering::SeqCst);
        let session = self.inner.connect().await?;
        Ok(Box::new(FlakySession {
            inner: session,
            broken: Arc::clone(&self.broken),
        }))
    }
}

struct FlakySession {
    inner: Box<dyn HsmSession>,
    broken: Arc<AtomicBool>,
}

impl FlakySession {
    fn check(&self) -> Result<(), CryptoError> {
        if self.broken.load(Ordering::SeqCst) {
            Err(CryptoError::Transient("session dropped".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HsmSession for FlakySession {
    async fn encrypt(
        &self,
        label: &str,
        nonce: &lockbox_core::EncryptionNonce,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.check()?;
        self.inner.encrypt(label, nonce, plaintext).await
    }

    async fn decrypt(
        &self,
        label: &str,
        nonce: &lockbox_core::EncryptionNonce,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.check()?;
        self.inner.decrypt(label, nonce, ciphertext).await
    }

    async fn fill_random(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        self.check()?;
        self.inner.fill_random(dest).await
    }

    async fn has_key(&self, label: &str) -> Result<bool, CryptoError> {
        self.check()?;
        self.inner.has_key(label).await
    }

    async fn create_key(&self, label: &str) -> Result<(), CryptoError> {
        self.check()?;
        self.inner.create_key(label).await
    }
}
