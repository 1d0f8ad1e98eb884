//! Store trait: the abstract interface for credential and grant persistence.
//!
//! This trait allows the permission engine and the facade to be
//! storage-agnostic. Implementations include SQLite (primary) and in-memory
//! (for tests).

use async_trait::async_trait;
use lockbox_core::{Credential, PermissionGrant};

use crate::error::Result;

/// The Store trait: async interface for credential and permission persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **One grant per (path, actor)**: [`Store::save_grant`] upserts; a
///   second save for the same pair replaces the stored operation set.
/// - **Row-level atomicity**: every method is atomic on its own; callers
///   needing cross-row atomicity handle it themselves.
/// - **Cascading delete**: deleting a credential also removes every grant on
///   its exact path.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Credential Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a credential by its normalized name.
    async fn find_credential(&self, name: &str) -> Result<Option<Credential>>;

    /// Insert or replace a credential row.
    ///
    /// An existing row keeps its original `created_at`; only the value is
    /// replaced.
    async fn upsert_credential(&self, credential: &Credential) -> Result<()>;

    /// Delete a credential and every grant on its exact path.
    ///
    /// Returns whether a credential row was actually removed.
    async fn delete_credential(&self, name: &str) -> Result<bool>;

    /// List all credential names.
    async fn list_credential_names(&self) -> Result<Vec<String>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get every grant whose path equals `path` exactly.
    async fn find_all_by_path(&self, path: &str) -> Result<Vec<PermissionGrant>>;

    /// Get the single grant for a (path, actor) pair, if any.
    async fn find_by_path_and_actor(
        &self,
        path: &str,
        actor: &str,
    ) -> Result<Option<PermissionGrant>>;

    /// Get every grant for `actor` whose path is any of `paths`.
    ///
    /// Used for wildcard lookups: the caller materializes the candidate
    /// paths and the store matches them in one query.
    async fn find_by_paths_and_actor(
        &self,
        paths: &[String],
        actor: &str,
    ) -> Result<Vec<PermissionGrant>>;

    /// Insert or replace the grant for (path, actor).
    ///
    /// Replace semantics: the stored operation set becomes exactly
    /// `grant.operations`.
    async fn save_grant(&self, grant: &PermissionGrant) -> Result<()>;

    /// Delete the grant for (path, actor).
    ///
    /// Returns the number of rows removed (0 or 1).
    async fn delete_by_path_and_actor(&self, path: &str, actor: &str) -> Result<u64>;
}
