//! AEAD backends.
//!
//! Two constructions are supported, in order of preference:
//!
//! - **Modern**: XSalsa20-Poly1305 (NaCl secretbox). 24-byte nonce, MAC
//!   carried inside the combined ciphertext.
//! - **Legacy**: AES-256-GCM. 12-byte nonce, detached 16-byte tag stored
//!   between the nonce and the ciphertext.
//!
//! Each backend is behind a Cargo feature. A backend that is not compiled
//! in reports itself unavailable and every call into it fails.

use crate::error::{CryptoError, CryptoResult};
use crate::key::MasterKey;
use serde::{Deserialize, Serialize};

/// Size of the Poly1305 / GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Nonce size for XSalsa20-Poly1305.
pub const MODERN_NONCE_SIZE: usize = 24;

/// Nonce size for AES-256-GCM.
pub const LEGACY_NONCE_SIZE: usize = 12;

/// An authenticated-encryption algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// XSalsa20-Poly1305.
    #[serde(rename = "modern-aead")]
    Modern,
    /// AES-256-GCM.
    #[serde(rename = "legacy-aead")]
    Legacy,
}

impl Backend {
    /// All backends, most preferred first.
    pub const PREFERENCE: [Backend; 2] = [Backend::Modern, Backend::Legacy];

    /// Envelope tag letter. On the wire it is followed by [`TAG_SEPARATOR`](crate::TAG_SEPARATOR).
    pub fn tag(self) -> &'static str {
        match self {
            Backend::Modern => "S",
            Backend::Legacy => "O",
        }
    }

    /// Looks up a backend by its envelope tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::PREFERENCE.into_iter().find(|b| b.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Backend::Modern => "modern-aead",
            Backend::Legacy => "legacy-aead",
        }
    }

    pub fn nonce_size(self) -> usize {
        match self {
            Backend::Modern => MODERN_NONCE_SIZE,
            Backend::Legacy => LEGACY_NONCE_SIZE,
        }
    }

    /// Size of the tag stored separately in the envelope payload.
    /// Zero when the tag is part of the combined ciphertext.
    pub fn detached_tag_size(self) -> usize {
        match self {
            Backend::Modern => 0,
            Backend::Legacy => TAG_SIZE,
        }
    }

    /// Smallest payload that can possibly verify (empty plaintext).
    pub fn min_payload_len(self) -> usize {
        self.nonce_size() + TAG_SIZE
    }

    /// Whether the backend was compiled into this build.
    pub fn is_compiled(self) -> bool {
        match self {
            Backend::Modern => cfg!(feature = "modern-aead"),
            Backend::Legacy => cfg!(feature = "legacy-aead"),
        }
    }

    /// Seals `plaintext`, returning `nonce ∥ [tag] ∥ ciphertext`.
    pub fn seal(self, key: &MasterKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        match self {
            #[cfg(feature = "modern-aead")]
            Backend::Modern => modern::seal(key, plaintext),
            #[cfg(feature = "legacy-aead")]
            Backend::Legacy => legacy::seal(key, plaintext),
            #[allow(unreachable_patterns)]
            other => {
                let _ = (key, plaintext);
                Err(CryptoError::BackendUnavailable(other))
            }
        }
    }

    /// Opens a payload produced by [`Backend::seal`].
    pub fn open(self, key: &MasterKey, payload: &[u8]) -> CryptoResult<Vec<u8>> {
        if payload.len() < self.min_payload_len() {
            return Err(CryptoError::DecryptionFailed);
        }
        match self {
            #[cfg(feature = "modern-aead")]
            Backend::Modern => modern::open(key, payload),
            #[cfg(feature = "legacy-aead")]
            Backend::Legacy => legacy::open(key, payload),
            #[allow(unreachable_patterns)]
            _ => {
                let _ = key;
                Err(CryptoError::DecryptionFailed)
            }
        }
    }

    /// Compiled in and passes a seal/open self-test with a throwaway key.
    pub fn probe(self) -> bool {
        if !self.is_compiled() {
            return false;
        }
        let key = crate::key::generate_master_key();
        let probe = b"carevault-backend-probe";
        match self.seal(&key, probe) {
            Ok(sealed) => matches!(self.open(&key, &sealed), Ok(opened) if opened == probe),
            Err(_) => false,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which backends the host allows the service to use.
///
/// `Capabilities::default()` permits every backend; detection then keeps
/// only the ones that are compiled in and pass their self-test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub modern: bool,
    pub legacy: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            modern: true,
            legacy: true,
        }
    }
}

impl Capabilities {
    /// No backend permitted. A service built with this is disabled.
    pub fn none() -> Self {
        Self {
            modern: false,
            legacy: false,
        }
    }

    /// Only the given backend permitted.
    pub fn only(backend: Backend) -> Self {
        Self {
            modern: backend == Backend::Modern,
            legacy: backend == Backend::Legacy,
        }
    }

    pub fn allows(&self, backend: Backend) -> bool {
        match backend {
            Backend::Modern => self.modern,
            Backend::Legacy => self.legacy,
        }
    }

    /// Permitted backends that are actually usable, most preferred first.
    pub fn available(&self) -> Vec<Backend> {
        Backend::PREFERENCE
            .into_iter()
            .filter(|b| self.allows(*b) && b.probe())
            .collect()
    }
}

#[cfg(feature = "modern-aead")]
mod modern {
    use super::MODERN_NONCE_SIZE;
    use crate::error::{CryptoError, CryptoResult};
    use crate::key::MasterKey;
    use crypto_secretbox::{
        XSalsa20Poly1305,
        aead::{self, Aead, KeyInit},
    };
    use rand::RngCore;

    type Nonce = aead::Nonce<XSalsa20Poly1305>;

    pub(super) fn seal(key: &MasterKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let cipher = XSalsa20Poly1305::new(key.as_bytes().into());

        let mut nonce = [0u8; MODERN_NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut payload = Vec::with_capacity(MODERN_NONCE_SIZE + sealed.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&sealed);
        Ok(payload)
    }

    pub(super) fn open(key: &MasterKey, payload: &[u8]) -> CryptoResult<Vec<u8>> {
        let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
        let (nonce, sealed) = payload.split_at(MODERN_NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(feature = "legacy-aead")]
mod legacy {
    use super::{LEGACY_NONCE_SIZE, TAG_SIZE};
    use crate::error::{CryptoError, CryptoResult};
    use crate::key::MasterKey;
    use aes_gcm::{
        Aes256Gcm, Nonce, Tag,
        aead::{AeadInPlace, KeyInit},
    };
    use rand::RngCore;

    pub(super) fn seal(key: &MasterKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let mut nonce = [0u8; LEGACY_NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut buffer)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut payload = Vec::with_capacity(LEGACY_NONCE_SIZE + TAG_SIZE + buffer.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&tag);
        payload.extend_from_slice(&buffer);
        Ok(payload)
    }

    pub(super) fn open(key: &MasterKey, payload: &[u8]) -> CryptoResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let (nonce, rest) = payload.split_at(LEGACY_NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);

        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(buffer)
    }
}
