//! # Lockbox Permissions
//!
//! The hierarchical, path-based permission engine.
//!
//! ## Overview
//!
//! Access control is a mapping from (credential path, actor) to a set of
//! allowed operations, stored one row per pair. Two lookups matter:
//!
//! - **Declared operations** ([`PermissionEngine::get_allowed_operations`]):
//!   the exact row for a pair, empty when absent (default deny)
//! - **Effective permission** ([`PermissionEngine::has_permission`]): the
//!   exact path plus every ancestor wildcard form (`/a/b/c` also checks
//!   `/*`, `/a/*`, `/a/b/*`), so a grant on a prefix covers the subtree
//!
//! Upserts use replace semantics: saving `{WRITE}` over an existing
//! `{READ}` grant leaves exactly `{WRITE}`.
//!
//! "Access denied" is never an error here: the engine reports an empty
//! set or `false` and the calling layer maps that to a denial response.

pub mod engine;
pub mod error;
pub mod paths;

pub use engine::PermissionEngine;
pub use error::{PermsError, Result};
pub use paths::wildcard_candidates;
