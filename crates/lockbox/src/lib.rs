//! # Lockbox
//!
//! The unified API for the Lockbox secret-management core: encrypted-at-rest,
//! access-controlled, versionable credentials for many client actors.
//!
//! ## Overview
//!
//! A [`Lockbox`] ties together the component crates:
//!
//! - **Permissions**: every credential operation is gated by the
//!   hierarchical path-based permission engine (wildcard grants on
//!   `/prefix/*` cover the subtree)
//! - **Encryption**: values are sealed with the active key of the key ring
//!   through whichever provider owns it (HSM, external daemon, or
//!   password-derived); transient backend failures are retried with a
//!   reconnect in between
//! - **Certificates**: certificate credentials are issued (CA-signed or
//!   self-signed, with validated SANs) and stored like any other value
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lockbox::{
//!     Lockbox, LockboxConfig, MemoryAuthorityStore, ProviderRegistry, SqliteStore,
//! };
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("lockbox.db").unwrap());
//!     let authorities = Arc::new(MemoryAuthorityStore::new());
//!     let config = LockboxConfig::single_password_provider(
//!         "internal",
//!         "a strong passphrase",
//!         "0123456789abcdef",
//!     );
//!
//!     let lockbox = Lockbox::new(store, authorities, ProviderRegistry::new(), config)
//!         .await
//!         .unwrap();
//!
//!     lockbox
//!         .set_credential("uaa-user:alice", "/db/password", b"hunter2")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `lockbox::core` - Shared types (operations, grants, encrypted values)
//! - `lockbox::store` - Storage abstraction and SQLite
//! - `lockbox::crypto` - Encryption providers and the registry
//! - `lockbox::perms` - The permission engine
//! - `lockbox::pki` - Certificate issuance

pub mod config;
pub mod error;
pub mod lockbox;

// Re-export component crates
pub use lockbox_core as core;
pub use lockbox_crypto as crypto;
pub use lockbox_perms as perms;
pub use lockbox_pki as pki;
pub use lockbox_store as store;

// Re-export main types for convenience
pub use config::{KeyConfig, KeySource, LockboxConfig};
pub use error::{LockboxError, Result};
pub use lockbox::Lockbox;

// Re-export commonly used component types
pub use lockbox_core::{
    Credential, EncryptedValue, KeyId, Operation, OperationSet, PermissionGrant,
};
pub use lockbox_crypto::{ProviderConfig, ProviderKind, ProviderRegistry, TimedRetry};
pub use lockbox_pki::{CertificateRequest, IssuedCertificate, MemoryAuthorityStore};
pub use lockbox_store::{MemoryStore, SqliteStore};
