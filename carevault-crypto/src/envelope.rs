//! Self-describing ciphertext envelope.
//!
//! Wire form:
//!
//! ```text
//! <backend tag> ":" base64(nonce ∥ [detached tag] ∥ ciphertext)
//! ```
//!
//! `S:` marks XSalsa20-Poly1305, `O:` marks AES-256-GCM. Text without a
//! recognised prefix is an untagged payload written before tagging existed;
//! opening it tries every available backend in preference order.

use crate::cipher::Backend;
use crate::error::{CryptoError, CryptoResult};
use crate::key::MasterKey;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;
use std::str::FromStr;

/// Separator between the backend tag and the payload.
pub const TAG_SEPARATOR: char = ':';

/// A parsed ciphertext envelope. The payload is `nonce ∥ [tag] ∥ ciphertext`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Envelope {
    /// Sealed with XSalsa20-Poly1305.
    Modern(Vec<u8>),
    /// Sealed with AES-256-GCM.
    Legacy(Vec<u8>),
    /// No backend tag; produced by either backend.
    Untagged(Vec<u8>),
}

impl Envelope {
    /// Seals `plaintext` with `backend` and wraps the result.
    pub fn seal(backend: Backend, key: &MasterKey, plaintext: &[u8]) -> CryptoResult<Self> {
        let payload = backend.seal(key, plaintext)?;
        Ok(Self::tagged(backend, payload))
    }

    pub fn tagged(backend: Backend, payload: Vec<u8>) -> Self {
        match backend {
            Backend::Modern => Envelope::Modern(payload),
            Backend::Legacy => Envelope::Legacy(payload),
        }
    }

    /// The backend named by the tag, `None` for untagged payloads.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            Envelope::Modern(_) => Some(Backend::Modern),
            Envelope::Legacy(_) => Some(Backend::Legacy),
            Envelope::Untagged(_) => None,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Envelope::Modern(p) | Envelope::Legacy(p) | Envelope::Untagged(p) => p,
        }
    }

    /// Drops the tag, yielding the form older writers produced.
    pub fn into_untagged(self) -> Self {
        match self {
            Envelope::Modern(p) | Envelope::Legacy(p) | Envelope::Untagged(p) => {
                Envelope::Untagged(p)
            }
        }
    }

    /// Encodes to the wire form.
    pub fn encode(&self) -> String {
        let body = STANDARD.encode(self.payload());
        match self.backend() {
            Some(backend) => format!("{}{}{}", backend.tag(), TAG_SEPARATOR, body),
            None => body,
        }
    }

    /// Parses the wire form.
    ///
    /// Malformed input yields [`CryptoError::DecryptionFailed`], the same
    /// error an authentication failure produces.
    pub fn parse(text: &str) -> CryptoResult<Self> {
        let tagged = text
            .split_once(TAG_SEPARATOR)
            .and_then(|(tag, body)| Backend::from_tag(tag).map(|b| (b, body)));

        match tagged {
            Some((backend, body)) => {
                let payload = decode_payload(body)?;
                if payload.len() < backend.min_payload_len() {
                    return Err(CryptoError::DecryptionFailed);
                }
                Ok(Self::tagged(backend, payload))
            }
            None => Ok(Envelope::Untagged(decode_payload(text)?)),
        }
    }

    /// Opens the envelope.
    ///
    /// Tagged envelopes are opened only by their own backend, which must be
    /// in `available`. Untagged envelopes are tried against each entry of
    /// `available` in order until one verifies.
    pub fn open(&self, key: &MasterKey, available: &[Backend]) -> CryptoResult<Vec<u8>> {
        match self.backend() {
            Some(backend) if available.contains(&backend) => backend.open(key, self.payload()),
            Some(_) => Err(CryptoError::DecryptionFailed),
            None => available
                .iter()
                .find_map(|backend| backend.open(key, self.payload()).ok())
                .ok_or(CryptoError::DecryptionFailed),
        }
    }
}

fn decode_payload(body: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(body)
        .map_err(|_| CryptoError::DecryptionFailed)
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Envelope {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
