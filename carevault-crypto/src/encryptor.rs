//! Seam between record stores and the vault.
//!
//! A store that writes patient records holds an `Arc<dyn DataEncryptor>`;
//! the vault's `EncryptionService` sits behind it and keeps the master key
//! to itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncryptorError {
    /// Nothing to encrypt with: the key is missing or every backend is off.
    #[error("encryptor unavailable (no key or backend)")]
    Unavailable,
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type EncryptorResult<T> = Result<T, EncryptorError>;

/// Seals and opens opaque blobs. Output of `encrypt_bytes` is envelope text
/// as UTF-8 bytes, so it can go into a text column unchanged.
pub trait DataEncryptor: Send + Sync {
    fn encrypt_bytes(&self, data: &[u8]) -> EncryptorResult<Vec<u8>>;

    /// Opens a blob produced by `encrypt_bytes` under the same key.
    fn decrypt_bytes(&self, data: &[u8]) -> EncryptorResult<Vec<u8>>;

    /// A key is loaded and a backend was detected.
    fn is_available(&self) -> bool;
}
