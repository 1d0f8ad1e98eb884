//! Proptest strategies for Lockbox types.

use proptest::prelude::*;

use lockbox_core::{Operation, OperationSet, PermissionGrant};

/// Strategy for slash-delimited credential paths (1-4 segments).
pub fn credential_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9-]{1,12}", 1..=4)
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

/// Strategy for actor identifiers.
pub fn actor() -> impl Strategy<Value = String> {
    ("(uaa-user|mtls-app)", "[a-z0-9-]{4,16}").prop_map(|(kind, id)| format!("{}:{}", kind, id))
}

/// Strategy for a single operation.
pub fn operation() -> impl Strategy<Value = Operation> {
    prop::sample::select(Operation::ALL.to_vec())
}

/// Strategy for a non-empty operation set.
pub fn operation_set() -> impl Strategy<Value = OperationSet> {
    prop::collection::btree_set(operation(), 1..=Operation::ALL.len())
        .prop_map(|ops| ops.into_iter().collect())
}

/// Strategy for a full permission grant.
pub fn permission_grant() -> impl Strategy<Value = PermissionGrant> {
    (credential_path(), actor(), operation_set())
        .prop_map(|(path, actor, operations)| PermissionGrant::new(path, actor, operations))
}
