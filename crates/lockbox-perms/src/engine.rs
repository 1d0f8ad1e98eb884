//! The permission engine.
//!
//! Business logic over the grant store: effective-operation lookup,
//! wildcard-inherited permission checks, per-entry upserts, and the
//! legacy "no ACL defined" probe.

use std::sync::Arc;

use lockbox_core::{Operation, OperationSet, PermissionGrant};
use lockbox_store::Store;

use crate::error::Result;
use crate::paths::wildcard_candidates;

/// The permission engine.
///
/// Default-deny: an actor with no matching grant has no operations. The
/// engine never errors for "access denied"; denial is an empty set or
/// `false`, and the calling layer decides what to do with it.
pub struct PermissionEngine<S: Store> {
    store: Arc<S>,
}

impl<S: Store> PermissionEngine<S> {
    /// Create an engine over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The operations declared for (path, actor), exact match only.
    ///
    /// Returns the empty set when no grant exists.
    pub async fn get_allowed_operations(
        &self,
        path: &str,
        actor: &str,
    ) -> Result<OperationSet> {
        let grant = self.store.find_by_path_and_actor(path, actor).await?;
        Ok(grant.map(|g| g.operations).unwrap_or_default())
    }

    /// Whether `actor` may perform `required` on the concrete `path`.
    ///
    /// Checks the exact path and every ancestor wildcard form, so a grant
    /// on `/prefix/*` authorizes all credentials below `/prefix/`.
    pub async fn has_permission(
        &self,
        actor: &str,
        path: &str,
        required: Operation,
    ) -> Result<bool> {
        let candidates = wildcard_candidates(path);
        let grants = self
            .store
            .find_by_paths_and_actor(&candidates, actor)
            .await?;

        let allowed = grants.iter().any(|g| g.operations.contains(required));
        if !allowed {
            tracing::debug!(actor, path, %required, "permission denied by default");
        }
        Ok(allowed)
    }

    /// Upsert a batch of grants, one row per entry.
    ///
    /// Replace semantics: each entry's operation set becomes the stored set
    /// for its (path, actor) pair, not the union with what was there.
    /// Entries are applied independently; a failure partway leaves earlier
    /// entries committed.
    pub async fn save_permissions(
        &self,
        entries: &[PermissionGrant],
    ) -> Result<Vec<PermissionGrant>> {
        let mut saved = Vec::with_capacity(entries.len());

        for entry in entries {
            self.store.save_grant(entry).await?;
            saved.push(entry.clone());
        }

        Ok(saved)
    }

    /// Delete the grant for (path, actor).
    ///
    /// Idempotent: returns whether a row was actually removed.
    pub async fn delete_permissions(&self, path: &str, actor: &str) -> Result<bool> {
        Ok(self.store.delete_by_path_and_actor(path, actor).await? > 0)
    }

    /// Whether a credential exists but has no ACL at all.
    ///
    /// Legacy credentials written before ACLs are treated as open-access
    /// until their first grant lands. Returns `false` when the credential
    /// itself does not exist.
    pub async fn has_no_defined_access_control(&self, name: &str) -> Result<bool> {
        if self.store.find_credential(name).await?.is_none() {
            return Ok(false);
        }
        Ok(self.store.find_all_by_path(name).await?.is_empty())
    }

    /// The full ACL of a credential: every grant on its exact path.
    pub async fn get_permissions(&self, name: &str) -> Result<Vec<PermissionGrant>> {
        Ok(self.store.find_all_by_path(name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_core::Credential;
    use lockbox_store::MemoryStore;

    fn engine() -> PermissionEngine<MemoryStore> {
        PermissionEngine::new(Arc::new(MemoryStore::new()))
    }

    fn grant(path: &str, actor: &str, ops: &[Operation]) -> PermissionGrant {
        PermissionGrant::new(path, actor, ops.into())
    }

    #[tokio::test]
    async fn test_exact_grant_authorizes() {
        let engine = engine();
        engine
            .save_permissions(&[grant("/a/b/c", "alice", &[Operation::Read])])
            .await
            .unwrap();

        assert!(engine
            .has_permission("alice", "/a/b/c", Operation::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_wildcard_grant_authorizes_below_prefix() {
        let engine = engine();
        engine
            .save_permissions(&[grant("/a/*", "alice", &[Operation::Read])])
            .await
            .unwrap();

        assert!(engine
            .has_permission("alice", "/a/b/c", Operation::Read)
            .await
            .unwrap());
        assert!(engine
            .has_permission("alice", "/a/x", Operation::Read)
            .await
            .unwrap());

        // Different subtree, different operation, different actor: all denied.
        assert!(!engine
            .has_permission("alice", "/other/x", Operation::Read)
            .await
            .unwrap());
        assert!(!engine
            .has_permission("alice", "/a/b/c", Operation::Write)
            .await
            .unwrap());
        assert!(!engine
            .has_permission("bob", "/a/b/c", Operation::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_mid_level_wildcard_authorizes() {
        let engine = engine();
        engine
            .save_permissions(&[grant("/a/b/*", "alice", &[Operation::Delete])])
            .await
            .unwrap();

        assert!(engine
            .has_permission("alice", "/a/b/c", Operation::Delete)
            .await
            .unwrap());
        assert!(!engine
            .has_permission("alice", "/a/x", Operation::Delete)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_allowed_operations_default_deny() {
        let engine = engine();
        let ops = engine
            .get_allowed_operations("/nothing/here", "alice")
            .await
            .unwrap();
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn test_allowed_operations_is_exact_match_only() {
        let engine = engine();
        engine
            .save_permissions(&[grant("/a/*", "alice", &[Operation::Read])])
            .await
            .unwrap();

        // Wildcard inheritance applies to has_permission, not to the
        // declared-operations lookup.
        let ops = engine.get_allowed_operations("/a/b", "alice").await.unwrap();
        assert!(ops.is_empty());

        let ops = engine.get_allowed_operations("/a/*", "alice").await.unwrap();
        assert!(ops.contains(Operation::Read));
    }

    #[tokio::test]
    async fn test_save_permissions_replaces_operations() {
        let engine = engine();
        engine
            .save_permissions(&[grant("/a/b", "alice", &[Operation::Read])])
            .await
            .unwrap();
        engine
            .save_permissions(&[grant("/a/b", "alice", &[Operation::Write])])
            .await
            .unwrap();

        let ops = engine.get_allowed_operations("/a/b", "alice").await.unwrap();
        assert!(!ops.contains(Operation::Read));
        assert!(ops.contains(Operation::Write));
        assert_eq!(ops.len(), 1);
    }

    #[tokio::test]
    async fn test_save_permissions_returns_saved_entries() {
        let engine = engine();
        let entries = [
            grant("/a/b", "alice", &[Operation::Read]),
            grant("/a/b", "bob", &[Operation::Write, Operation::WriteAcl]),
        ];

        let saved = engine.save_permissions(&entries).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved, entries);
    }

    #[tokio::test]
    async fn test_delete_permissions_idempotent() {
        let engine = engine();
        engine
            .save_permissions(&[grant("/a/b", "alice", &[Operation::Read])])
            .await
            .unwrap();

        assert!(engine.delete_permissions("/a/b", "alice").await.unwrap());
        assert!(!engine.delete_permissions("/a/b", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_has_no_defined_access_control() {
        let engine = engine();

        // Credential does not exist.
        assert!(!engine
            .has_no_defined_access_control("/missing")
            .await
            .unwrap());

        // Credential exists, zero grants.
        engine
            .store()
            .upsert_credential(&Credential::new("/exists-no-grants", None, 0))
            .await
            .unwrap();
        assert!(engine
            .has_no_defined_access_control("/exists-no-grants")
            .await
            .unwrap());

        // Credential exists, one grant.
        engine
            .save_permissions(&[grant("/exists-no-grants", "alice", &[Operation::Read])])
            .await
            .unwrap();
        assert!(!engine
            .has_no_defined_access_control("/exists-no-grants")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_get_permissions_lists_exact_path_grants() {
        let engine = engine();
        engine
            .save_permissions(&[
                grant("/a/b", "alice", &[Operation::Read]),
                grant("/a/b", "bob", &[Operation::Write]),
                grant("/a/*", "carol", &[Operation::Read]),
            ])
            .await
            .unwrap();

        let acl = engine.get_permissions("/a/b").await.unwrap();
        assert_eq!(acl.len(), 2);
        assert!(acl.iter().all(|g| g.path == "/a/b"));
    }
}
