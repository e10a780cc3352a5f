//! Keyed hashing.
//!
//! HMAC-SHA256 under the master key. Output is not reproducible without the
//! key, so it can serve as a searchable pseudonym for sensitive fields.

use crate::error::{CryptoError, CryptoResult};
use crate::key::MasterKey;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Returns the lowercase hex HMAC-SHA256 of `data` under `key`.
pub fn keyed_hash(key: &MasterKey, data: &[u8]) -> CryptoResult<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
