//! Shared vocabulary for the Lockbox system.
//!
//! Permission operations, grants, credentials, and the encrypted-value
//! envelope that ties a ciphertext back to the key that produced it.

use std::collections::BTreeSet;
use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An operation an actor can be granted on a credential path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Read the credential value.
    Read,
    /// Write (set or overwrite) the credential value.
    Write,
    /// Delete the credential.
    Delete,
    /// Read the credential's access-control list.
    ReadAcl,
    /// Modify the credential's access-control list.
    WriteAcl,
}

impl Operation {
    /// All operations, in canonical order.
    pub const ALL: [Operation; 5] = [
        Operation::Read,
        Operation::Write,
        Operation::Delete,
        Operation::ReadAcl,
        Operation::WriteAcl,
    ];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Delete => "delete",
            Operation::ReadAcl => "read_acl",
            Operation::WriteAcl => "write_acl",
        };
        f.write_str(s)
    }
}

/// A set of allowed operations.
///
/// Grants carry one of these per (path, actor) pair. Upserts replace the
/// whole set rather than merging into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationSet(BTreeSet<Operation>);

impl OperationSet {
    /// Create an empty set.
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Create a set containing every operation.
    pub fn all() -> Self {
        Operation::ALL.into_iter().collect()
    }

    /// Check whether the set contains an operation.
    pub fn contains(&self, op: Operation) -> bool {
        self.0.contains(&op)
    }

    /// Add an operation to the set.
    pub fn insert(&mut self, op: Operation) -> bool {
        self.0.insert(op)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of operations in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the operations in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Operation> for OperationSet {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&[Operation]> for OperationSet {
    fn from(ops: &[Operation]) -> Self {
        ops.iter().copied().collect()
    }
}

/// A permission grant: the operations an actor holds on a path.
///
/// At most one grant exists per (path, actor) pair. The path may end in a
/// wildcard segment (`/prefix/*`), in which case it covers every credential
/// below the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// The credential path (or wildcard prefix) this grant covers.
    pub path: String,
    /// The principal the grant applies to.
    pub actor: String,
    /// The operations the actor may perform.
    pub operations: OperationSet,
}

impl PermissionGrant {
    /// Create a new grant.
    pub fn new(
        path: impl Into<String>,
        actor: impl Into<String>,
        operations: OperationSet,
    ) -> Self {
        Self {
            path: path.into(),
            actor: actor.into(),
            operations,
        }
    }
}

/// Identifier of a piece of key material.
///
/// Stored alongside every ciphertext so decryption can find the key that
/// produced it, including keys that have since been rotated out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

impl KeyId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from the canonical hyphenated form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 12];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// The product of an encrypt operation.
///
/// Carries everything decryption needs besides the key itself: the
/// ciphertext, the nonce it was sealed with, and the id of the key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// The key material that produced this ciphertext.
    pub key_id: KeyId,
    /// AEAD ciphertext (includes the authentication tag).
    pub ciphertext: Vec<u8>,
    /// The nonce used for this encryption. Never reused for the same key.
    pub nonce: EncryptionNonce,
}

impl EncryptedValue {
    /// Create a new encrypted value.
    pub fn new(key_id: KeyId, ciphertext: Vec<u8>, nonce: EncryptionNonce) -> Self {
        Self {
            key_id,
            ciphertext,
            nonce,
        }
    }
}

/// A stored credential row.
///
/// The value is absent for credentials that exist only as metadata (e.g.
/// while their first value is still being written).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Normalized credential name (always starts with `/`).
    pub name: String,
    /// The encrypted value, if one has been written.
    pub value: Option<EncryptedValue>,
    /// Creation time (Unix milliseconds).
    pub created_at: i64,
}

impl Credential {
    /// Create a new credential row.
    pub fn new(name: impl Into<String>, value: Option<EncryptedValue>, created_at: i64) -> Self {
        Self {
            name: name.into(),
            value,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_set_replace_not_merge() {
        let mut grant = PermissionGrant::new(
            "/a/b",
            "uaa-user:alice",
            [Operation::Read].as_slice().into(),
        );
        assert!(grant.operations.contains(Operation::Read));

        grant.operations = [Operation::Write].as_slice().into();
        assert!(!grant.operations.contains(Operation::Read));
        assert!(grant.operations.contains(Operation::Write));
        assert_eq!(grant.operations.len(), 1);
    }

    #[test]
    fn test_operation_serde_names() {
        let json = serde_json::to_string(&Operation::ReadAcl).unwrap();
        assert_eq!(json, "\"read_acl\"");

        let op: Operation = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(op, Operation::Write);
    }

    #[test]
    fn test_operation_set_all() {
        let all = OperationSet::all();
        assert_eq!(all.len(), 5);
        for op in Operation::ALL {
            assert!(all.contains(op));
        }
    }

    #[test]
    fn test_nonce_generate_unique() {
        let a = EncryptionNonce::generate();
        let b = EncryptionNonce::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_id_parse_roundtrip() {
        let id = KeyId::generate();
        let parsed = KeyId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
