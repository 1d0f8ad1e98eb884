//! External encryption provider.
//!
//! Operations are remote calls to a colocated encryption daemon at a fixed
//! host/port, carried as length-prefixed CBOR frames over TCP. The daemon
//! owns the keys; this backend only addresses them by label.
//!
//! Failures here are connection-level and transient. The backend does not
//! retry on its own; callers decide.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use lockbox_core::{EncryptedValue, EncryptionNonce};

use crate::backend::EncryptionBackend;
use crate::error::{CryptoError, Result};
use crate::key::KeyMaterial;

/// Upper bound on a single wire frame.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Request frames understood by the encryption daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonRequest {
    /// Encrypt plaintext under the daemon key named `key`.
    Encrypt { key: String, plaintext: Vec<u8> },
    /// Decrypt ciphertext under the daemon key named `key`.
    Decrypt {
        key: String,
        nonce: [u8; 12],
        ciphertext: Vec<u8>,
    },
    /// Request `len` bytes of daemon-side randomness.
    Random { len: u32 },
}

/// Response frames produced by the encryption daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonResponse {
    /// Successful encryption.
    Encrypted { nonce: [u8; 12], ciphertext: Vec<u8> },
    /// Successful decryption.
    Decrypted { plaintext: Vec<u8> },
    /// Requested randomness.
    Random { bytes: Vec<u8> },
    /// The daemon refused the operation.
    Error { message: String },
}

impl DaemonResponse {
    /// Variant name for error messages. Payloads may hold secrets and are
    /// never formatted into errors.
    fn label(&self) -> &'static str {
        match self {
            DaemonResponse::Encrypted { .. } => "Encrypted",
            DaemonResponse::Decrypted { .. } => "Decrypted",
            DaemonResponse::Random { .. } => "Random",
            DaemonResponse::Error { .. } => "Error",
        }
    }
}

/// Client for the external encryption daemon.
///
/// Connections are per-call: there is no session state to recover, so
/// `reconnect` is the default no-op.
pub struct ExternalBackend {
    host: String,
    port: u16,
}

impl ExternalBackend {
    /// Create a client for the daemon at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn transient(&self, context: &str, e: std::io::Error) -> CryptoError {
        CryptoError::Transient(format!(
            "{} {}:{} failed: {}",
            context, self.host, self.port, e
        ))
    }

    /// Send one request frame and read one response frame.
    async fn call(&self, request: &DaemonRequest) -> Result<DaemonResponse> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| self.transient("connecting to encryption daemon", e))?;

        let mut body = Vec::new();
        ciborium::into_writer(request, &mut body)
            .map_err(|e| CryptoError::Integrity(format!("encoding daemon request: {}", e)))?;

        stream
            .write_all(&(body.len() as u32).to_be_bytes())
            .await
            .map_err(|e| self.transient("writing to encryption daemon", e))?;
        stream
            .write_all(&body)
            .await
            .map_err(|e| self.transient("writing to encryption daemon", e))?;

        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| self.transient("reading from encryption daemon", e))?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(CryptoError::Integrity(format!(
                "daemon frame of {} bytes exceeds limit",
                len
            )));
        }

        let mut body = vec![0u8; len];
        stream
            .read_exact(&mut body)
            .await
            .map_err(|e| self.transient("reading from encryption daemon", e))?;

        ciborium::from_reader(&body[..])
            .map_err(|e| CryptoError::Integrity(format!("decoding daemon response: {}", e)))
    }
}

#[async_trait]
impl EncryptionBackend for ExternalBackend {
    async fn encrypt(&self, key: &KeyMaterial, plaintext: &[u8]) -> Result<EncryptedValue> {
        let label = key.expect_label()?;

        let response = self
            .call(&DaemonRequest::Encrypt {
                key: label.to_string(),
                plaintext: plaintext.to_vec(),
            })
            .await?;

        match response {
            DaemonResponse::Encrypted { nonce, ciphertext } => Ok(EncryptedValue::new(
                key.id(),
                ciphertext,
                EncryptionNonce::from_bytes(nonce),
            )),
            DaemonResponse::Error { message } => Err(CryptoError::Encryption(message)),
            other => Err(CryptoError::Integrity(format!(
                "unexpected daemon response to encrypt: {}",
                other.label()
            ))),
        }
    }

    async fn decrypt(
        &self,
        key: &KeyMaterial,
        ciphertext: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        let label = key.expect_label()?;

        let response = self
            .call(&DaemonRequest::Decrypt {
                key: label.to_string(),
                nonce: *nonce.as_bytes(),
                ciphertext: ciphertext.to_vec(),
            })
            .await?;

        match response {
            DaemonResponse::Decrypted { plaintext } => Ok(plaintext),
            DaemonResponse::Error { message } => Err(CryptoError::Decryption(message)),
            other => Err(CryptoError::Integrity(format!(
                "unexpected daemon response to decrypt: {}",
                other.label()
            ))),
        }
    }

    async fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        let response = self
            .call(&DaemonRequest::Random {
                len: dest.len() as u32,
            })
            .await?;

        match response {
            DaemonResponse::Random { bytes } if bytes.len() == dest.len() => {
                dest.copy_from_slice(&bytes);
                Ok(())
            }
            DaemonResponse::Random { bytes } => Err(CryptoError::Integrity(format!(
                "daemon returned {} random bytes, wanted {}",
                bytes.len(),
                dest.len()
            ))),
            DaemonResponse::Error { message } => Err(CryptoError::Transient(message)),
            other => Err(CryptoError::Integrity(format!(
                "unexpected daemon response to random: {}",
                other.label()
            ))),
        }
    }
}
