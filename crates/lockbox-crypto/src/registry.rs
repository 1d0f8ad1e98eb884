//! Provider configuration and the memoized backend registry.
//!
//! The registry is the factory for encryption backends: the first request
//! for a provider name constructs the backend, every later request returns
//! the cached instance. The cache is owned by whoever owns the registry
//! (explicit state, not a process-wide static), so tests build isolated
//! registries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backend::EncryptionBackend;
use crate::error::{CryptoError, Result};
use crate::external::ExternalBackend;
use crate::hsm::{soft::SoftHsmDevice, HsmBackend, HsmConnector};
use crate::password::PasswordBackend;
use crate::retry::TimedRetry;

/// Default bound on device-recovery retries.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;

/// Default delay between device-recovery retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The kind of a configured provider, with its connection parameters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderKind {
    /// A hardware security module partition.
    Hsm {
        partition: String,
        partition_password: String,
    },
    /// A colocated encryption daemon.
    External { host: String, port: u16 },
    /// A key derived from a configured passphrase.
    Password { passphrase: String, salt: String },
}

impl fmt::Debug for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print partition passwords or passphrases.
        match self {
            ProviderKind::Hsm { partition, .. } => f
                .debug_struct("Hsm")
                .field("partition", partition)
                .field("partition_password", &"..")
                .finish(),
            ProviderKind::External { host, port } => f
                .debug_struct("External")
                .field("host", host)
                .field("port", port)
                .finish(),
            ProviderKind::Password { .. } => f
                .debug_struct("Password")
                .field("passphrase", &"..")
                .field("salt", &"..")
                .finish(),
        }
    }
}

impl ProviderKind {
    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Hsm { .. } => "hsm",
            ProviderKind::External { .. } => "external",
            ProviderKind::Password { .. } => "password",
        }
    }
}

/// A configured encryption provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name: the cache identity.
    pub name: String,
    /// Kind and connection parameters.
    pub kind: ProviderKind,
    /// Whether missing device keys may be created on demand.
    #[serde(default)]
    pub key_creation_enabled: bool,
}

/// Supplies device connectors for HSM providers.
///
/// The real PKCS#11 binding is an external collaborator; the default
/// factory hands out software devices, one per partition name.
pub trait HsmConnectorFactory: Send + Sync {
    /// Build a connector for the given provider.
    fn connector(&self, config: &ProviderConfig) -> Result<Box<dyn HsmConnector>>;
}

/// Factory producing software HSM devices, one per partition name.
///
/// Repeated requests for the same partition share a device, so provider
/// reconstruction in tests sees the same keys.
#[derive(Default)]
pub struct SoftHsmFactory {
    devices: std::sync::Mutex<HashMap<String, SoftHsmDevice>>,
}

impl SoftHsmFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the device for a partition, e.g. to preload keys.
    pub fn device(&self, partition: &str) -> SoftHsmDevice {
        self.devices
            .lock()
            .expect("soft hsm factory lock poisoned")
            .entry(partition.to_string())
            .or_default()
            .clone()
    }
}

impl HsmConnectorFactory for SoftHsmFactory {
    fn connector(&self, config: &ProviderConfig) -> Result<Box<dyn HsmConnector>> {
        match &config.kind {
            ProviderKind::Hsm { partition, .. } => Ok(Box::new(self.device(partition))),
            other => Err(CryptoError::Configuration(format!(
                "provider {} is {}, not an HSM",
                config.name,
                other.label()
            ))),
        }
    }
}

/// The memoized encryption-backend factory.
///
/// Concurrency: the cache lock is held across construction, so two tasks
/// racing on the first request for a provider still produce exactly one
/// backend (and one device session). Construction is rare, once per
/// provider per process, so the serialization is immaterial.
pub struct ProviderRegistry {
    hsm_connectors: Box<dyn HsmConnectorFactory>,
    retry: TimedRetry,
    backends: Mutex<HashMap<String, Arc<dyn EncryptionBackend>>>,
}

impl ProviderRegistry {
    /// Create a registry with the soft HSM factory and default retry policy.
    pub fn new() -> Self {
        Self {
            hsm_connectors: Box::new(SoftHsmFactory::new()),
            retry: TimedRetry::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY),
            backends: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different connector factory (the production PKCS#11 binding).
    pub fn with_hsm_factory(mut self, factory: Box<dyn HsmConnectorFactory>) -> Self {
        self.hsm_connectors = factory;
        self
    }

    /// Use a different device-recovery retry policy.
    pub fn with_retry(mut self, retry: TimedRetry) -> Self {
        self.retry = retry;
        self
    }

    /// The registry's retry policy, for callers wrapping backend calls.
    pub fn retry(&self) -> &TimedRetry {
        &self.retry
    }

    /// Resolve a provider to its backend, constructing it on first request.
    ///
    /// Construction failures are configuration errors: fatal, not retried
    /// at this layer.
    pub async fn get_encryption_service(
        &self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn EncryptionBackend>> {
        let mut backends = self.backends.lock().await;

        if let Some(backend) = backends.get(&config.name) {
            return Ok(Arc::clone(backend));
        }

        let backend: Arc<dyn EncryptionBackend> = match &config.kind {
            ProviderKind::Hsm { .. } => {
                let connector = self.hsm_connectors.connector(config)?;
                Arc::new(
                    HsmBackend::connect(
                        connector,
                        config.key_creation_enabled,
                        self.retry.clone(),
                    )
                    .await?,
                )
            }
            ProviderKind::External { host, port } => {
                Arc::new(ExternalBackend::new(host.clone(), *port))
            }
            ProviderKind::Password { .. } => Arc::new(PasswordBackend::new()),
        };

        tracing::info!(
            provider = %config.name,
            kind = config.kind.label(),
            "constructed encryption provider"
        );

        backends.insert(config.name.clone(), Arc::clone(&backend));
        Ok(backend)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
