//! The Lockbox: unified API for the secret-management core.
//!
//! Ties the permission engine, the encryption providers, and certificate
//! issuance into credential operations: every read, write, and delete is
//! authorization-gated, and every stored value is encrypted at rest with
//! the active key.

use std::collections::HashMap;
use std::sync::Arc;

use lockbox_core::{
    name::normalize, Credential, EncryptedValue, Operation, OperationSet, PermissionGrant,
};
use lockbox_crypto::{
    derive_key_material, EncryptionBackend, KeyMaterial, KeyRing, ProviderConfig, ProviderKind,
    ProviderRegistry,
};
use lockbox_perms::PermissionEngine;
use lockbox_pki::{
    AuthorityStore, CertificateGenerator, CertificateRequest, IssuedCertificate,
    MemoryAuthorityStore,
};
use lockbox_store::Store;

use crate::config::{KeySource, LockboxConfig};
use crate::error::{LockboxError, Result};

/// The main Lockbox struct.
///
/// Provides a unified API for:
/// - Reading, writing, and deleting credentials
/// - Managing credential ACLs
/// - Generating certificate credentials
///
/// Credentials with no ACL at all are treated as open-access (legacy
/// behavior) until their first grant is written.
pub struct Lockbox<S: Store, A: AuthorityStore = MemoryAuthorityStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Permission engine over the same store.
    engine: PermissionEngine<S>,
    /// Memoized encryption-backend factory.
    registry: ProviderRegistry,
    /// Provider configs by name.
    providers: HashMap<String, ProviderConfig>,
    /// Known key material, one key active.
    ring: KeyRing,
    /// Certificate generation against the CA registry.
    generator: CertificateGenerator<A>,
    /// Whether permission checks are enforced.
    acl_enforced: bool,
}

impl<S: Store, A: AuthorityStore> Lockbox<S, A> {
    /// Assemble a Lockbox from its parts.
    ///
    /// Resolves every configured provider and key up front: misconfigured
    /// providers, unreachable devices, and key-count mistakes all fail here
    /// rather than on the first request.
    pub async fn new(
        store: Arc<S>,
        authorities: Arc<A>,
        registry: ProviderRegistry,
        config: LockboxConfig,
    ) -> Result<Self> {
        let providers: HashMap<String, ProviderConfig> = config
            .providers
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();

        let mut active: Option<KeyMaterial> = None;
        let mut inactive: Vec<KeyMaterial> = Vec::new();

        for key_config in &config.keys {
            let provider = providers.get(&key_config.provider).ok_or_else(|| {
                LockboxError::Configuration(format!(
                    "key {} references unknown provider {}",
                    key_config.id, key_config.provider
                ))
            })?;

            let material = match &key_config.source {
                KeySource::Derived => match &provider.kind {
                    ProviderKind::Password { passphrase, salt } => derive_key_material(
                        key_config.id,
                        &provider.name,
                        passphrase,
                        salt.as_bytes(),
                    )?,
                    _ => {
                        return Err(LockboxError::Configuration(format!(
                            "key {} is derived but provider {} is not a password provider",
                            key_config.id, provider.name
                        )))
                    }
                },
                KeySource::Label(label) => {
                    KeyMaterial::labelled(key_config.id, &provider.name, label)
                }
            };

            let backend = registry.get_encryption_service(provider).await?;
            backend.prepare_key(&material).await?;

            if key_config.active {
                if active.is_some() {
                    return Err(LockboxError::Configuration(
                        "more than one active encryption key configured".into(),
                    ));
                }
                active = Some(material);
            } else {
                inactive.push(material);
            }
        }

        let active = active.ok_or_else(|| {
            LockboxError::Configuration("no active encryption key configured".into())
        })?;
        let mut ring = KeyRing::new(active);
        for material in inactive {
            ring.add(material);
        }

        Ok(Self {
            engine: PermissionEngine::new(Arc::clone(&store)),
            store,
            registry,
            providers,
            ring,
            generator: CertificateGenerator::new(authorities),
            acl_enforced: config.acl_enforced,
        })
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the permission engine.
    pub fn permissions(&self) -> &PermissionEngine<S> {
        &self.engine
    }

    /// Get the key ring.
    pub fn key_ring(&self) -> &KeyRing {
        &self.ring
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credential Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Write a credential value.
    ///
    /// Creating a new credential needs no prior grant; the creator receives
    /// the full operation set on it. Overwriting requires WRITE.
    pub async fn set_credential(&self, actor: &str, name: &str, value: &[u8]) -> Result<()> {
        let name = normalize(name)?;
        self.write_value(actor, &name, value).await
    }

    /// Read and decrypt a credential value.
    pub async fn get_credential(&self, actor: &str, name: &str) -> Result<Vec<u8>> {
        let name = normalize(name)?;
        self.authorize(actor, &name, Operation::Read).await?;

        let credential = self
            .store
            .find_credential(&name)
            .await?
            .ok_or_else(|| LockboxError::CredentialNotFound(name.clone()))?;

        let value = credential
            .value
            .ok_or_else(|| LockboxError::CredentialNotFound(name.clone()))?;

        self.decrypt(&value).await
    }

    /// Delete a credential. Its grants go with it.
    ///
    /// Idempotent: returns whether a credential was actually removed.
    pub async fn delete_credential(&self, actor: &str, name: &str) -> Result<bool> {
        let name = normalize(name)?;
        self.authorize(actor, &name, Operation::Delete).await?;
        Ok(self.store.delete_credential(&name).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ACL Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read a credential's ACL. Requires READ_ACL.
    pub async fn get_acl(&self, actor: &str, name: &str) -> Result<Vec<PermissionGrant>> {
        let name = normalize(name)?;
        self.authorize(actor, &name, Operation::ReadAcl).await?;
        Ok(self.engine.get_permissions(&name).await?)
    }

    /// Upsert grants. Requires WRITE_ACL on each entry's path.
    ///
    /// Entries are applied independently; a failure partway leaves earlier
    /// entries committed.
    pub async fn save_acl(
        &self,
        actor: &str,
        entries: &[PermissionGrant],
    ) -> Result<Vec<PermissionGrant>> {
        let mut saved = Vec::with_capacity(entries.len());

        for entry in entries {
            self.authorize(actor, &entry.path, Operation::WriteAcl).await?;
            saved.extend(
                self.engine
                    .save_permissions(std::slice::from_ref(entry))
                    .await?,
            );
        }

        Ok(saved)
    }

    /// Delete the grant for (path, target actor). Requires WRITE_ACL.
    pub async fn delete_acl_entry(
        &self,
        actor: &str,
        name: &str,
        target_actor: &str,
    ) -> Result<bool> {
        let name = normalize(name)?;
        self.authorize(actor, &name, Operation::WriteAcl).await?;
        Ok(self.engine.delete_permissions(&name, target_actor).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Certificate Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate a certificate credential.
    ///
    /// Issues per the request (CA-signed or self-signed), stores the whole
    /// artifact encrypted at rest, and returns it to the caller.
    pub async fn generate_certificate(
        &self,
        actor: &str,
        name: &str,
        request: &CertificateRequest,
    ) -> Result<IssuedCertificate> {
        let name = normalize(name)?;
        let issued = self.generator.generate(request).await?;

        let bytes = serde_json::to_vec(&issued)
            .map_err(|e| LockboxError::Serialization(e.to_string()))?;
        self.write_value(actor, &name, &bytes).await?;

        Ok(issued)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Deny unless the actor holds `operation` on `name`, directly or via a
    /// wildcard grant, or unless the credential predates ACLs entirely.
    async fn authorize(&self, actor: &str, name: &str, operation: Operation) -> Result<()> {
        if !self.acl_enforced {
            return Ok(());
        }

        if self.engine.has_permission(actor, name, operation).await? {
            return Ok(());
        }

        // Legacy credentials with no ACL stay open until the first grant.
        if self.engine.has_no_defined_access_control(name).await? {
            return Ok(());
        }

        Err(LockboxError::AccessDenied {
            actor: actor.to_string(),
            path: name.to_string(),
            operation,
        })
    }

    /// Encrypt and store a value under an already-normalized name,
    /// auto-granting the creator on first write.
    async fn write_value(&self, actor: &str, name: &str, value: &[u8]) -> Result<()> {
        let existing = self.store.find_credential(name).await?;
        if existing.is_some() {
            self.authorize(actor, name, Operation::Write).await?;
        }

        let sealed = self.encrypt(value).await?;
        self.store
            .upsert_credential(&Credential::new(name, Some(sealed), now_millis()))
            .await?;

        if existing.is_none() {
            self.engine
                .save_permissions(&[PermissionGrant::new(name, actor, OperationSet::all())])
                .await?;
            tracing::debug!(actor, name, "granted creator full operations");
        }

        Ok(())
    }

    async fn backend_for(&self, key: &KeyMaterial) -> Result<Arc<dyn EncryptionBackend>> {
        let provider = self.providers.get(key.provider()).ok_or_else(|| {
            LockboxError::Configuration(format!(
                "key {} references unknown provider {}",
                key.id(),
                key.provider()
            ))
        })?;
        Ok(self.registry.get_encryption_service(provider).await?)
    }

    /// Encrypt with the active key, retrying transient backend failures
    /// with a reconnect in between.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedValue> {
        let key = self.ring.active();
        let backend = self.backend_for(key).await?;

        let backend_ref = &backend;
        let sealed = self
            .registry
            .retry()
            .run_with_recovery(
                || async move { backend_ref.encrypt(key, plaintext).await },
                |e| async move {
                    let _ = backend_ref.reconnect(&e).await;
                },
            )
            .await?;
        Ok(sealed)
    }

    /// Decrypt with whatever key the stored value names.
    async fn decrypt(&self, value: &EncryptedValue) -> Result<Vec<u8>> {
        let key = self.ring.require(value.key_id)?;
        let backend = self.backend_for(key).await?;

        let backend_ref = &backend;
        let ciphertext: &[u8] = &value.ciphertext;
        let nonce = &value.nonce;
        let plaintext = self
            .registry
            .retry()
            .run_with_recovery(
                || async move { backend_ref.decrypt(key, ciphertext, nonce).await },
                |e| async move {
                    let _ = backend_ref.reconnect(&e).await;
                },
            )
            .await?;
        Ok(plaintext)
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
