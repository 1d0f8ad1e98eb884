//! HSM-backed encryption provider.
//!
//! The physical device (PKCS#11 binding, vendor library) is abstracted
//! behind the [`HsmConnector`]/[`HsmSession`] trait pair. Every operation
//! can fail with a transient session-loss error; callers recover by
//! invoking `reconnect` (usually via [`crate::TimedRetry`]) and retrying.
//!
//! A software-backed device ships in [`soft`] for tests and development.

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use lockbox_core::{EncryptedValue, EncryptionNonce};

use crate::backend::EncryptionBackend;
use crate::error::{CryptoError, Result};
use crate::key::KeyMaterial;
use crate::retry::TimedRetry;

/// A live session with an HSM device.
///
/// Keys are addressed by label; the key bytes never leave the device.
#[async_trait]
pub trait HsmSession: Send + Sync {
    /// Encrypt under the device key named `label`.
    async fn encrypt(
        &self,
        label: &str,
        nonce: &EncryptionNonce,
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Decrypt under the device key named `label`.
    async fn decrypt(
        &self,
        label: &str,
        nonce: &EncryptionNonce,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Fill `dest` from the device's hardware RNG.
    async fn fill_random(&self, dest: &mut [u8]) -> Result<()>;

    /// Whether a key with this label exists on the device.
    async fn has_key(&self, label: &str) -> Result<bool>;

    /// Generate a new key under this label.
    async fn create_key(&self, label: &str) -> Result<()>;
}

/// Opens sessions with a particular device.
#[async_trait]
pub trait HsmConnector: Send + Sync {
    /// Open a fresh session.
    async fn connect(&self) -> Result<Box<dyn HsmSession>>;
}

/// The HSM encryption backend.
///
/// Holds one session behind a read lock; `reconnect` swaps it under the
/// write lock and is serialized by a dedicated mutex so at most one
/// reconnect is in flight.
pub struct HsmBackend {
    connector: Box<dyn HsmConnector>,
    session: RwLock<Box<dyn HsmSession>>,
    reconnect_gate: Mutex<()>,
    key_creation_enabled: bool,
    retry: TimedRetry,
}

impl HsmBackend {
    /// Open the initial session.
    ///
    /// A failure here is a configuration error: if the device is not
    /// reachable at startup there is nothing to retry against.
    pub async fn connect(
        connector: Box<dyn HsmConnector>,
        key_creation_enabled: bool,
        retry: TimedRetry,
    ) -> Result<Self> {
        let session = connector.connect().await.map_err(|e| {
            CryptoError::Configuration(format!("failed to open HSM session: {}", e))
        })?;

        Ok(Self {
            connector,
            session: RwLock::new(session),
            reconnect_gate: Mutex::new(()),
            key_creation_enabled,
            retry,
        })
    }

    /// Ensure the device key behind `key` exists.
    ///
    /// With key creation enabled a missing key is generated in-device.
    /// With creation disabled we wait (bounded) for another node to create
    /// it, then give up with a configuration error.
    pub async fn get_or_create_key(&self, key: &KeyMaterial) -> Result<()> {
        let label = key.expect_label()?.to_string();

        {
            let session = self.session.read().await;
            if session.has_key(&label).await? {
                return Ok(());
            }

            if self.key_creation_enabled {
                tracing::info!(label = %label, "creating encryption key on device");
                return session.create_key(&label).await;
            }
        }

        let session = &self.session;
        let label_ref: &str = &label;
        self.retry
            .run(|| async move {
                let s = session.read().await;
                if s.has_key(label_ref).await? {
                    Ok(())
                } else {
                    Err(CryptoError::Transient(format!(
                        "key {} not present on device yet",
                        label_ref
                    )))
                }
            })
            .await
            .map_err(|e| match e {
                CryptoError::Transient(_) => CryptoError::Configuration(format!(
                    "encryption key {} not found on device and key creation is disabled",
                    label
                )),
                other => other,
            })
    }
}

#[async_trait]
impl EncryptionBackend for HsmBackend {
    async fn encrypt(&self, key: &KeyMaterial, plaintext: &[u8]) -> Result<EncryptedValue> {
        let label = key.expect_label()?;
        let nonce = EncryptionNonce::generate();

        let session = self.session.read().await;
        let ciphertext = session.encrypt(label, &nonce, plaintext).await?;
        Ok(EncryptedValue::new(key.id(), ciphertext, nonce))
    }

    async fn decrypt(
        &self,
        key: &KeyMaterial,
        ciphertext: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        let label = key.expect_label()?;

        let session = self.session.read().await;
        session.decrypt(label, nonce, ciphertext).await
    }

    async fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        let session = self.session.read().await;
        session.fill_random(dest).await
    }

    async fn prepare_key(&self, key: &KeyMaterial) -> Result<()> {
        self.get_or_create_key(key).await
    }

    async fn reconnect(&self, last_error: &CryptoError) -> Result<()> {
        if !last_error.is_transient() {
            return Ok(());
        }

        // One reconnect at a time.
        let _gate = self.reconnect_gate.lock().await;

        // Another task may have restored the session while we waited for
        // the gate; probe before tearing anything down.
        {
            let session = self.session.read().await;
            let mut probe = [0u8; 1];
            if session.fill_random(&mut probe).await.is_ok() {
                return Ok(());
            }
        }

        let fresh = self.connector.connect().await?;
        *self.session.write().await = fresh;
        tracing::warn!("reopened HSM session after transient failure: {}", last_error);
        Ok(())
    }
}

/// A software-backed HSM for tests and development.
///
/// Same interface, no hardware: keys live in a shared in-memory table and
/// sessions never drop on their own.
pub mod soft {
    use super::*;
    use rand::{rngs::OsRng, RngCore};
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock as StdRwLock};

    use crate::key::EncryptionKey;

    /// An in-memory device. Cloning shares the key table, like sessions
    /// against one physical partition.
    #[derive(Clone, Default)]
    pub struct SoftHsmDevice {
        keys: Arc<StdRwLock<HashMap<String, EncryptionKey>>>,
    }

    impl SoftHsmDevice {
        /// Create an empty device.
        pub fn new() -> Self {
            Self::default()
        }

        /// Preload a key, as a provisioned partition would have.
        pub fn insert_key(&self, label: impl Into<String>, key: EncryptionKey) {
            self.keys
                .write()
                .expect("soft hsm lock poisoned")
                .insert(label.into(), key);
        }

        /// Whether a key with this label exists.
        pub fn contains_key(&self, label: &str) -> bool {
            self.keys
                .read()
                .expect("soft hsm lock poisoned")
                .contains_key(label)
        }
    }

    #[async_trait]
    impl HsmConnector for SoftHsmDevice {
        async fn connect(&self) -> Result<Box<dyn HsmSession>> {
            Ok(Box::new(SoftHsmSession {
                keys: Arc::clone(&self.keys),
            }))
        }
    }

    struct SoftHsmSession {
        keys: Arc<StdRwLock<HashMap<String, EncryptionKey>>>,
    }

    impl SoftHsmSession {
        fn key(&self, label: &str) -> Result<EncryptionKey> {
            self.keys
                .read()
                .map_err(|e| CryptoError::Transient(e.to_string()))?
                .get(label)
                .cloned()
                .ok_or_else(|| {
                    CryptoError::Configuration(format!("no key with label {} on device", label))
                })
        }
    }

    #[async_trait]
    impl HsmSession for SoftHsmSession {
        async fn encrypt(
            &self,
            label: &str,
            nonce: &EncryptionNonce,
            plaintext: &[u8],
        ) -> Result<Vec<u8>> {
            self.key(label)?.encrypt(plaintext, nonce)
        }

        async fn decrypt(
            &self,
            label: &str,
            nonce: &EncryptionNonce,
            ciphertext: &[u8],
        ) -> Result<Vec<u8>> {
            self.key(label)?.decrypt(ciphertext, nonce)
        }

        async fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
            OsRng.fill_bytes(dest);
            Ok(())
        }

        async fn has_key(&self, label: &str) -> Result<bool> {
            Ok(self
                .keys
                .read()
                .map_err(|e| CryptoError::Transient(e.to_string()))?
                .contains_key(label))
        }

        async fn create_key(&self, label: &str) -> Result<()> {
            self.keys
                .write()
                .map_err(|e| CryptoError::Transient(e.to_string()))?
                .insert(label.to_string(), EncryptionKey::generate());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::soft::SoftHsmDevice;
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use lockbox_core::KeyId;

    use crate::key::EncryptionKey;

    fn retry() -> TimedRetry {
        TimedRetry::new(3, Duration::from_millis(1))
    }

    fn device_with_key(label: &str) -> SoftHsmDevice {
        let device = SoftHsmDevice::new();
        device.insert_key(label, EncryptionKey::generate());
        device
    }

    /// A connector whose sessions fail while `broken` is set. Reconnecting
    /// yields a healthy session again.
    #[derive(Clone)]
    struct FlakyDevice {
        inner: SoftHsmDevice,
        broken: Arc<AtomicBool>,
        connects: Arc<AtomicU32>,
    }

    impl FlakyDevice {
        fn new(inner: SoftHsmDevice) -> Self {
            Self {
                inner,
                broken: Arc::new(AtomicBool::new(false)),
                connects: Arc::new(AtomicU32::new(0)),
            }
        }

        fn drop_session(&self) {
            self.broken.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl HsmConnector for FlakyDevice {
        async fn connect(&self) -> Result<Box<dyn HsmSession>> {
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
        fn check(&self) -> Result<()> {
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
            nonce: &EncryptionNonce,
            plaintext: &[u8],
        ) -> Result<Vec<u8>> {
            self.check()?;
            self.inner.encrypt(label, nonce, plaintext).await
        }

        async fn decrypt(
            &self,
            label: &str,
            nonce: &EncryptionNonce,
            ciphertext: &[u8],
        ) -> Result<Vec<u8>> {
            self.check()?;
            self.inner.decrypt(label, nonce, ciphertext).await
        }

        async fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
            self.check()?;
            self.inner.fill_random(dest).await
        }

        async fn has_key(&self, label: &str) -> Result<bool> {
            self.check()?;
            self.inner.has_key(label).await
        }

        async fn create_key(&self, label: &str) -> Result<()> {
            self.check()?;
            self.inner.create_key(label).await
        }
    }

    #[tokio::test]
    async fn test_hsm_round_trip() {
        let backend =
            HsmBackend::connect(Box::new(device_with_key("key-1")), false, retry())
                .await
                .unwrap();
        let key = KeyMaterial::labelled(KeyId::generate(), "hsm", "key-1");

        let sealed = backend.encrypt(&key, b"device secret").await.unwrap();
        let opened = backend
            .decrypt(&key, &sealed.ciphertext, &sealed.nonce)
            .await
            .unwrap();

        assert_eq!(opened, b"device secret");
    }

    #[tokio::test]
    async fn test_hsm_creates_key_when_enabled() {
        let device = SoftHsmDevice::new();
        let backend = HsmBackend::connect(Box::new(device.clone()), true, retry())
            .await
            .unwrap();
        let key = KeyMaterial::labelled(KeyId::generate(), "hsm", "fresh-key");

        backend.get_or_create_key(&key).await.unwrap();
        assert!(device.contains_key("fresh-key"));
    }

    #[tokio::test]
    async fn test_hsm_waits_then_fails_when_creation_disabled() {
        let backend = HsmBackend::connect(Box::new(SoftHsmDevice::new()), false, retry())
            .await
            .unwrap();
        let key = KeyMaterial::labelled(KeyId::generate(), "hsm", "never-created");

        let err = backend.get_or_create_key(&key).await.unwrap_err();
        assert!(matches!(err, CryptoError::Configuration(_)));
    }

    fn labelled_key() -> KeyMaterial {
        KeyMaterial::labelled(KeyId::generate(), "hsm", "key-1")
    }

    #[tokio::test]
    async fn test_hsm_reconnect_restores_session() {
        let flaky = FlakyDevice::new(device_with_key("key-1"));
        let backend = HsmBackend::connect(Box::new(flaky.clone()), false, retry())
            .await
            .unwrap();
        let key = labelled_key();

        backend.encrypt(&key, b"before").await.unwrap();

        flaky.drop_session();
        let err = backend.encrypt(&key, b"during").await.unwrap_err();
        assert!(err.is_transient());

        backend.reconnect(&err).await.unwrap();
        backend.encrypt(&key, b"after").await.unwrap();
        assert_eq!(flaky.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hsm_retry_with_reconnect_end_to_end() {
        let flaky = FlakyDevice::new(device_with_key("key-1"));
        let backend = HsmBackend::connect(Box::new(flaky.clone()), false, retry())
            .await
            .unwrap();
        let key = labelled_key();

        flaky.drop_session();

        let policy = retry();
        let backend_ref = &backend;
        let key_ref = &key;
        let sealed = policy
            .run_with_recovery(
                || async move { backend_ref.encrypt(key_ref, b"payload").await },
                |e| async move {
                    let _ = backend_ref.reconnect(&e).await;
                },
            )
            .await
            .unwrap();

        let opened = backend
            .decrypt(&key, &sealed.ciphertext, &sealed.nonce)
            .await
            .unwrap();
        assert_eq!(opened, b"payload");
    }
}
