//! Encryption primitives for CareVault.
//!
//! Provides:
//! - a zeroizing 256-bit [`MasterKey`]
//! - XSalsa20-Poly1305 and AES-256-GCM backends with capability probing
//! - the tagged ciphertext [`Envelope`] and its text encoding
//! - HMAC-SHA256 keyed hashing
//!
//! # Envelope format
//!
//! ```text
//! S:<base64(nonce[24] ∥ secretbox(ciphertext ∥ mac))>
//! O:<base64(nonce[12] ∥ gcm_tag[16] ∥ ciphertext)>
//! <base64(...)>                     untagged, opened by probing
//! ```
//!
//! The tag is authoritative: a tagged envelope is only ever opened by the
//! backend it names.

mod cipher;
pub mod encryptor;
mod envelope;
mod error;
mod hash;
mod key;

pub use cipher::{Backend, Capabilities, LEGACY_NONCE_SIZE, MODERN_NONCE_SIZE, TAG_SIZE};
pub use encryptor::{DataEncryptor, EncryptorError, EncryptorResult};
pub use envelope::{Envelope, TAG_SEPARATOR};
pub use error::{CryptoError, CryptoResult};
pub use hash::keyed_hash;
pub use key::{KEY_SIZE, MasterKey, generate_master_key};
