//! # Lockbox Store
//!
//! Storage abstraction for Lockbox. Provides a trait-based interface for
//! credential and permission-grant persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait,
//! allowing the permission engine and the facade to be storage-agnostic.
//! The primary implementation is [`SqliteStore`], with [`MemoryStore`] for
//! testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all persistence operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Design Notes
//!
//! - **One grant per (path, actor)**: saving a grant for an existing pair
//!   replaces its operation set
//! - **Row-level atomicity**: each operation is atomic on its own; there is
//!   no cross-row transaction surface
//! - **Cascading delete**: deleting a credential removes the grants on its
//!   exact path

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::Store;
