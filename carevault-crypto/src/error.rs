//! Error types for the encryption layer.

use crate::cipher::Backend;
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No AEAD backend could be selected.
    #[error("no authenticated-encryption backend available")]
    NoBackendAvailable,

    /// The requested backend is not compiled in or failed its self-test.
    #[error("backend {0} is not available")]
    BackendUnavailable(Backend),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed.
    ///
    /// Malformed envelopes, truncated payloads and authentication failures
    /// all map here so callers cannot tell them apart.
    #[error("decryption failed (wrong key or invalid data)")]
    DecryptionFailed,

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Key material was not valid base64.
    #[error("invalid key encoding (expected base64)")]
    InvalidKeyEncoding,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
