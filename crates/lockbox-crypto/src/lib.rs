//! # Lockbox Crypto
//!
//! The encryption-provider core: every way Lockbox encrypts data at rest.
//!
//! ## Overview
//!
//! Three backend variants sit behind one capability set
//! ([`EncryptionBackend`]):
//!
//! - **HSM**: keys live in a hardware partition reached through an
//!   [`HsmConnector`]; every operation can fail transiently and recover
//!   via `reconnect`
//! - **External**: keys live in a colocated encryption daemon reached over
//!   TCP with CBOR frames
//! - **Password**: keys are derived from a configured passphrase with
//!   PBKDF2 and used locally; nothing to connect to, nothing to recover
//!
//! The [`ProviderRegistry`] resolves provider configs to backends,
//! constructing each provider exactly once per process and caching it.
//! [`TimedRetry`] is the bounded sleep-and-retry helper callers wrap around
//! flaky (HSM) operations, with `reconnect` as the recovery hook.
//!
//! ## Key model
//!
//! [`KeyMaterial`] is immutable: an id, the owning provider's name, and a
//! handle that is either raw in-process key bytes or a device label. The
//! [`KeyRing`] keeps every known key with one active: new encryptions use
//! the active key, decryption resolves whatever key the stored value names,
//! so key rotation never strands old ciphertexts.

pub mod backend;
pub mod error;
pub mod external;
pub mod hsm;
pub mod key;
pub mod password;
pub mod registry;
pub mod retry;

pub use backend::EncryptionBackend;
pub use error::{CryptoError, Result};
pub use external::{DaemonRequest, DaemonResponse, ExternalBackend};
pub use hsm::{soft::SoftHsmDevice, HsmBackend, HsmConnector, HsmSession};
pub use key::{EncryptionKey, KeyHandle, KeyMaterial, KeyRing};
pub use password::{derive_key, derive_key_material, PasswordBackend};
pub use registry::{
    HsmConnectorFactory, ProviderConfig, ProviderKind, ProviderRegistry, SoftHsmFactory,
};
pub use retry::TimedRetry;
