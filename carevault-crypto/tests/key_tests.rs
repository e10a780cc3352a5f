use base64::{Engine, engine::general_purpose::STANDARD};
use carevault_crypto::{CryptoError, KEY_SIZE, MasterKey, generate_master_key};

// ── generate_master_key ──────────────────────────────────────────

#[test]
fn generate_master_key_produces_unique_keys() {
    let key1 = generate_master_key();
    let key2 = generate_master_key();
    assert_ne!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn generate_master_key_is_32_bytes() {
    let key = generate_master_key();
    assert_eq!(key.as_bytes().len(), KEY_SIZE);
}

#[test]
fn generated_key_is_not_all_zeros() {
    let key = generate_master_key();
    assert!(key.as_bytes().iter().any(|&b| b != 0));
}

// ── MasterKey ────────────────────────────────────────────────────

#[test]
fn master_key_from_bytes_roundtrip() {
    let bytes = [42u8; 32];
    let key = MasterKey::from_bytes(bytes);
    assert_eq!(*key.as_bytes(), bytes);
}

#[test]
fn from_slice_rejects_short_input() {
    let err = MasterKey::from_slice(&[1u8; 16]).unwrap_err();
    assert!(matches!(
        err,
        CryptoError::InvalidKeyLength {
            expected: 32,
            actual: 16
        }
    ));
}

#[test]
fn from_slice_rejects_long_input() {
    assert!(MasterKey::from_slice(&[1u8; 33]).is_err());
}

#[test]
fn key_debug_does_not_leak_bytes() {
    let key = generate_master_key();
    let debug = format!("{:?}", key);
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains(&format!("{:?}", key.as_bytes())));
}

#[test]
fn master_key_clone() {
    let key = generate_master_key();
    let cloned = key.clone();
    assert_eq!(key.as_bytes(), cloned.as_bytes());
}

// ── base64 ───────────────────────────────────────────────────────

#[test]
fn base64_roundtrip() {
    let key = generate_master_key();
    let encoded = key.to_base64();
    let decoded = MasterKey::from_base64(&encoded).unwrap();
    assert_eq!(key.as_bytes(), decoded.as_bytes());
}

#[test]
fn base64_tolerates_trailing_newline() {
    let key = generate_master_key();
    let encoded = format!("{}\n", key.to_base64().as_str());
    let decoded = MasterKey::from_base64(&encoded).unwrap();
    assert_eq!(key.as_bytes(), decoded.as_bytes());
}

#[test]
fn base64_of_short_secret_rejected() {
    let encoded = STANDARD.encode("short");
    assert!(matches!(
        MasterKey::from_base64(&encoded),
        Err(CryptoError::InvalidKeyLength { actual: 5, .. })
    ));
}

#[test]
fn invalid_base64_rejected() {
    assert!(matches!(
        MasterKey::from_base64("!!!not-base64!!!"),
        Err(CryptoError::InvalidKeyEncoding)
    ));
}

#[test]
fn empty_base64_rejected() {
    assert!(MasterKey::from_base64("").is_err());
}
