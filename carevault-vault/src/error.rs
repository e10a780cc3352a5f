//! Error types for the vault.

use carevault_crypto::CryptoError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No key source resolved and none has been generated.
    #[error("no encryption key loaded")]
    NoKeyLoaded,
    /// Backend detection found nothing; the service is disabled.
    #[error("no authenticated-encryption backend available")]
    NoBackendAvailable,
    /// Malformed envelope, wrong key or tampered data.
    #[error("decryption failed (wrong key or invalid data)")]
    DecryptionFailed,
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config error: {0}")]
    Config(String),
}

pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    pub(crate) fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| VaultError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::NoBackendAvailable | CryptoError::BackendUnavailable(_) => {
                VaultError::NoBackendAvailable
            }
            CryptoError::DecryptionFailed => VaultError::DecryptionFailed,
            CryptoError::Serialization(e) => VaultError::Serialization(e.to_string()),
            other => VaultError::Encryption(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}
