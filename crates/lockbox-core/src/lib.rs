//! # Lockbox Core
//!
//! Core primitives for the Lockbox secret-management system.
//!
//! ## Overview
//!
//! This crate holds the shared vocabulary the other Lockbox crates build on:
//!
//! - **Operations**: the five things an actor can be allowed to do to a
//!   credential (read, write, delete, read ACL, write ACL)
//! - **Grants**: the (path, actor, operations) triple the permission engine
//!   evaluates
//! - **Encrypted values**: ciphertext + nonce + key id, the unit the
//!   encryption providers produce and the store persists
//! - **Credential names**: slash-delimited paths, normalized to a leading
//!   slash
//!
//! Nothing here performs I/O; the store, crypto, and permission crates
//! depend on this one and never the other way around.

pub mod error;
pub mod name;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{
    Credential, EncryptedValue, EncryptionNonce, KeyId, Operation, OperationSet, PermissionGrant,
};
