//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Lockbox. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use lockbox_core::{
    Credential, EncryptedValue, EncryptionNonce, KeyId, Operation, OperationSet, PermissionGrant,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&*conn)
        })
        .await
        .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }
}

// Helper to convert a permissions row to a PermissionGrant.
fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<PermissionGrant> {
    let mut operations = OperationSet::empty();
    if row.get::<_, bool>("read_permission")? {
        operations.insert(Operation::Read);
    }
    if row.get::<_, bool>("write_permission")? {
        operations.insert(Operation::Write);
    }
    if row.get::<_, bool>("delete_permission")? {
        operations.insert(Operation::Delete);
    }
    if row.get::<_, bool>("read_acl_permission")? {
        operations.insert(Operation::ReadAcl);
    }
    if row.get::<_, bool>("write_acl_permission")? {
        operations.insert(Operation::WriteAcl);
    }

    Ok(PermissionGrant {
        path: row.get("path")?,
        actor: row.get("actor")?,
        operations,
    })
}

const GRANT_COLUMNS: &str = "path, actor, read_permission, write_permission, \
     delete_permission, read_acl_permission, write_acl_permission";

#[async_trait]
impl Store for SqliteStore {
    async fn find_credential(&self, name: &str) -> Result<Option<Credential>> {
        let name = name.to_string();

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT name, key_id, ciphertext, nonce, created_at
                     FROM credentials WHERE name = ?1",
                    params![name],
                    |row| {
                        // Defer domain decoding so we can surface InvalidData
                        // instead of a type error.
                        Ok((
                            row.get::<_, String>("name")?,
                            row.get::<_, Option<Vec<u8>>>("key_id")?,
                            row.get::<_, Option<Vec<u8>>>("ciphertext")?,
                            row.get::<_, Option<Vec<u8>>>("nonce")?,
                            row.get::<_, i64>("created_at")?,
                        ))
                    },
                )
                .optional()?;

            match row {
                None => Ok(None),
                Some((name, key_id, ciphertext, nonce, created_at)) => {
                    decode_credential(name, key_id, ciphertext, nonce, created_at).map(Some)
                }
            }
        })
        .await
    }

    async fn upsert_credential(&self, credential: &Credential) -> Result<()> {
        let credential = credential.clone();

        self.with_conn(move |conn| {
            let (key_id, ciphertext, nonce) = match &credential.value {
                Some(v) => (
                    Some(v.key_id.as_uuid().as_bytes().to_vec()),
                    Some(v.ciphertext.clone()),
                    Some(v.nonce.as_bytes().to_vec()),
                ),
                None => (None, None, None),
            };

            conn.execute(
                "INSERT INTO credentials (name, key_id, ciphertext, nonce, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(name) DO UPDATE SET
                     key_id = excluded.key_id,
                     ciphertext = excluded.ciphertext,
                     nonce = excluded.nonce",
                params![
                    credential.name,
                    key_id,
                    ciphertext,
                    nonce,
                    credential.created_at
                ],
            )?;

            Ok(())
        })
        .await
    }

    async fn delete_credential(&self, name: &str) -> Result<bool> {
        let name = name.to_string();

        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;

            // Grants on the exact path go with the credential.
            tx.execute("DELETE FROM permissions WHERE path = ?1", params![name])?;
            let removed = tx.execute("DELETE FROM credentials WHERE name = ?1", params![name])?;

            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_credential_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM credentials ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn find_all_by_path(&self, path: &str) -> Result<Vec<PermissionGrant>> {
        let path = path.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM permissions WHERE path = ?1 ORDER BY actor",
                GRANT_COLUMNS
            ))?;
            let grants = stmt
                .query_map(params![path], row_to_grant)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(grants)
        })
        .await
    }

    async fn find_by_path_and_actor(
        &self,
        path: &str,
        actor: &str,
    ) -> Result<Option<PermissionGrant>> {
        let path = path.to_string();
        let actor = actor.to_string();

        self.with_conn(move |conn| {
            let grant = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM permissions WHERE path = ?1 AND actor = ?2",
                        GRANT_COLUMNS
                    ),
                    params![path, actor],
                    row_to_grant,
                )
                .optional()?;
            Ok(grant)
        })
        .await
    }

    async fn find_by_paths_and_actor(
        &self,
        paths: &[String],
        actor: &str,
    ) -> Result<Vec<PermissionGrant>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let paths = paths.to_vec();
        let actor = actor.to_string();

        self.with_conn(move |conn| {
            let placeholders = vec!["?"; paths.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM permissions WHERE actor = ? AND path IN ({}) ORDER BY path",
                GRANT_COLUMNS, placeholders
            );

            let mut stmt = conn.prepare(&sql)?;
            let params_iter =
                std::iter::once(actor.clone()).chain(paths.iter().cloned());
            let grants = stmt
                .query_map(rusqlite::params_from_iter(params_iter), row_to_grant)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(grants)
        })
        .await
    }

    async fn save_grant(&self, grant: &PermissionGrant) -> Result<()> {
        let grant = grant.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO permissions (
                    path, actor, read_permission, write_permission,
                    delete_permission, read_acl_permission, write_acl_permission
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(path, actor) DO UPDATE SET
                    read_permission = excluded.read_permission,
                    write_permission = excluded.write_permission,
                    delete_permission = excluded.delete_permission,
                    read_acl_permission = excluded.read_acl_permission,
                    write_acl_permission = excluded.write_acl_permission",
                params![
                    grant.path,
                    grant.actor,
                    grant.operations.contains(Operation::Read),
                    grant.operations.contains(Operation::Write),
                    grant.operations.contains(Operation::Delete),
                    grant.operations.contains(Operation::ReadAcl),
                    grant.operations.contains(Operation::WriteAcl),
                ],
            )?;

            Ok(())
        })
        .await
    }

    async fn delete_by_path_and_actor(&self, path: &str, actor: &str) -> Result<u64> {
        let path = path.to_string();
        let actor = actor.to_string();

        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM permissions WHERE path = ?1 AND actor = ?2",
                params![path, actor],
            )?;
            Ok(removed as u64)
        })
        .await
    }
}

/// Decode raw credential columns into a Credential.
fn decode_credential(
    name: String,
    key_id: Option<Vec<u8>>,
    ciphertext: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    created_at: i64,
) -> Result<Credential> {
    let value = match (key_id, ciphertext, nonce) {
        (Some(key_id), Some(ciphertext), Some(nonce)) => {
            let uuid = Uuid::from_slice(&key_id)
                .map_err(|e| StoreError::InvalidData(format!("bad key id: {}", e)))?;
            let nonce: [u8; 12] = nonce
                .try_into()
                .map_err(|_| StoreError::InvalidData("nonce is not 12 bytes".into()))?;
            Some(EncryptedValue::new(
                KeyId::from_uuid(uuid),
                ciphertext,
                EncryptionNonce::from_bytes(nonce),
            ))
        }
        (None, None, None) => None,
        _ => {
            return Err(StoreError::InvalidData(format!(
                "credential {} has a partial encrypted value",
                name
            )))
        }
    };

    Ok(Credential {
        name,
        value,
        created_at,
    })
}
