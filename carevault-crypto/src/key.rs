//! Master key type.
//!
//! The master key is a single 256-bit secret shared by every encryption and
//! hashing operation in a process. It is zeroized on drop and never printed.

use crate::error::{CryptoError, CryptoResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of the master key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// The master key, with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Creates a key from a slice, rejecting anything that is not exactly
    /// `KEY_SIZE` bytes long.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Decodes a base64-encoded key. Surrounding whitespace is ignored.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|_| CryptoError::InvalidKeyEncoding)?,
        );
        Self::from_slice(&decoded)
    }

    /// Encodes the key as base64 text, the format of the key file.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.bytes))
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generates a fresh master key from the OS CSPRNG.
pub fn generate_master_key() -> MasterKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let key = MasterKey::from_bytes(bytes);
    bytes.zeroize();
    key
}
