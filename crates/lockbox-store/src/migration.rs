//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;
            tracing::debug!("applied schema migration v{}", version);

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Credentials table: one row per named credential
        CREATE TABLE credentials (
            name TEXT PRIMARY KEY,            -- normalized name, leading slash
            key_id BLOB,                      -- 16 bytes, UUID of the key material
            ciphertext BLOB,                  -- AEAD ciphertext incl. tag
            nonce BLOB,                       -- 12 bytes
            created_at INTEGER NOT NULL       -- Unix ms
        );

        -- Permission grants: one row per (path, actor) pair.
        -- One boolean column per operation.
        CREATE TABLE permissions (
            path TEXT NOT NULL,
            actor TEXT NOT NULL,
            read_permission INTEGER NOT NULL DEFAULT 0,
            write_permission INTEGER NOT NULL DEFAULT 0,
            delete_permission INTEGER NOT NULL DEFAULT 0,
            read_acl_permission INTEGER NOT NULL DEFAULT 0,
            write_acl_permission INTEGER NOT NULL DEFAULT 0,

            PRIMARY KEY (path, actor)
        );

        -- Indexes for common queries
        CREATE INDEX idx_permissions_path ON permissions(path);
        CREATE INDEX idx_permissions_actor ON permissions(actor);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
