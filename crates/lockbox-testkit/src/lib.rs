//! # Lockbox Testkit
//!
//! Testing utilities for Lockbox.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a ready-made Lockbox over an in-memory store, CA
//!   seeding, deterministic key material, and a flaky HSM device for
//!   driving reconnect paths
//! - **Generators**: proptest strategies for paths, actors, operations,
//!   and grants
//!
//! ## Fixtures
//!
//! ```rust,no_run
//! use lockbox_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new().await;
//!     fixture
//!         .lockbox
//!         .set_credential("alice", "/test/secret", b"value")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use lockbox_testkit::generators::permission_grant;
//!
//! proptest! {
//!     #[test]
//!     fn grants_survive_the_store(grant in permission_grant()) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{deterministic_key_material, FlakyHsm, TestFixture};
