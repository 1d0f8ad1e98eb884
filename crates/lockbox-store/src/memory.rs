//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use lockbox_core::{Credential, PermissionGrant};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Credentials indexed by normalized name.
    credentials: HashMap<String, Credential>,

    /// Grants indexed by (path, actor). BTreeMap for deterministic order.
    grants: BTreeMap<(String, String), PermissionGrant>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                credentials: HashMap::new(),
                grants: BTreeMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_credential(&self, name: &str) -> Result<Option<Credential>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.credentials.get(name).cloned())
    }

    async fn upsert_credential(&self, credential: &Credential) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        match inner.credentials.get_mut(&credential.name) {
            Some(existing) => {
                // Keep the original creation time, replace the value.
                existing.value = credential.value.clone();
            }
            None => {
                inner
                    .credentials
                    .insert(credential.name.clone(), credential.clone());
            }
        }

        Ok(())
    }

    async fn delete_credential(&self, name: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        let removed = inner.credentials.remove(name).is_some();
        if removed {
            inner
                .grants
                .retain(|(path, _), _| path != name);
        }

        Ok(removed)
    }

    async fn list_credential_names(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut names: Vec<String> = inner.credentials.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn find_all_by_path(&self, path: &str) -> Result<Vec<PermissionGrant>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .grants
            .iter()
            .filter(|((p, _), _)| p == path)
            .map(|(_, grant)| grant.clone())
            .collect())
    }

    async fn find_by_path_and_actor(
        &self,
        path: &str,
        actor: &str,
    ) -> Result<Option<PermissionGrant>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .grants
            .get(&(path.to_string(), actor.to_string()))
            .cloned())
    }

    async fn find_by_paths_and_actor(
        &self,
        paths: &[String],
        actor: &str,
    ) -> Result<Vec<PermissionGrant>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(paths
            .iter()
            .filter_map(|path| inner.grants.get(&(path.clone(), actor.to_string())))
            .cloned()
            .collect())
    }

    async fn save_grant(&self, grant: &PermissionGrant) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.grants.insert(
            (grant.path.clone(), grant.actor.clone()),
            grant.clone(),
        );
        Ok(())
    }

    async fn delete_by_path_and_actor(&self, path: &str, actor: &str) -> Result<u64> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let removed = inner
            .grants
            .remove(&(path.to_string(), actor.to_string()))
            .is_some();
        Ok(if removed { 1 } else { 0 })
    }
}
