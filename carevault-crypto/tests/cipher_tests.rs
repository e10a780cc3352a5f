use carevault_crypto::{
    Backend, Capabilities, LEGACY_NONCE_SIZE, MODERN_NONCE_SIZE, TAG_SIZE, generate_master_key,
};

// ── Backend metadata ─────────────────────────────────────────────

#[test]
fn backend_tags() {
    assert_eq!(Backend::Modern.tag(), "S");
    assert_eq!(Backend::Legacy.tag(), "O");
    assert_eq!(Backend::from_tag("S"), Some(Backend::Modern));
    assert_eq!(Backend::from_tag("O"), Some(Backend::Legacy));
    assert_eq!(Backend::from_tag("X"), None);
    assert_eq!(Backend::from_tag(""), None);
}

#[test]
fn backend_sizes() {
    assert_eq!(Backend::Modern.nonce_size(), MODERN_NONCE_SIZE);
    assert_eq!(Backend::Legacy.nonce_size(), LEGACY_NONCE_SIZE);
    assert_eq!(Backend::Modern.detached_tag_size(), 0);
    assert_eq!(Backend::Legacy.detached_tag_size(), TAG_SIZE);
}

#[test]
fn backend_display_and_serde() {
    assert_eq!(Backend::Modern.to_string(), "modern-aead");
    assert_eq!(Backend::Legacy.to_string(), "legacy-aead");
    let json = serde_json::to_string(&Backend::Legacy).unwrap();
    assert_eq!(json, "\"legacy-aead\"");
    let parsed: Backend = serde_json::from_str("\"modern-aead\"").unwrap();
    assert_eq!(parsed, Backend::Modern);
}

// ── seal / open ──────────────────────────────────────────────────

#[test]
fn seal_open_roundtrip_both_backends() {
    let key = generate_master_key();
    for backend in Backend::PREFERENCE {
        let sealed = backend.seal(&key, b"Hello, World!").unwrap();
        let opened = backend.open(&key, &sealed).unwrap();
        assert_eq!(opened, b"Hello, World!");
    }
}

#[test]
fn seal_open_empty() {
    let key = generate_master_key();
    for backend in Backend::PREFERENCE {
        let sealed = backend.seal(&key, b"").unwrap();
        assert_eq!(sealed.len(), backend.min_payload_len());
        assert_eq!(backend.open(&key, &sealed).unwrap(), b"");
    }
}

#[test]
fn payload_layout_lengths() {
    let key = generate_master_key();
    let plaintext = [7u8; 100];
    let modern = Backend::Modern.seal(&key, &plaintext).unwrap();
    assert_eq!(modern.len(), MODERN_NONCE_SIZE + TAG_SIZE + 100);
    let legacy = Backend::Legacy.seal(&key, &plaintext).unwrap();
    assert_eq!(legacy.len(), LEGACY_NONCE_SIZE + TAG_SIZE + 100);
}

#[test]
fn legacy_ciphertext_follows_detached_tag() {
    // nonce ∥ tag ∥ ciphertext: the ciphertext tail is exactly as long
    // as the plaintext.
    let key = generate_master_key();
    let sealed = Backend::Legacy.seal(&key, b"abc").unwrap();
    assert_eq!(sealed.len() - LEGACY_NONCE_SIZE - TAG_SIZE, 3);
}

#[test]
fn wrong_key_fails() {
    let key1 = generate_master_key();
    let key2 = generate_master_key();
    for backend in Backend::PREFERENCE {
        let sealed = backend.seal(&key1, b"Secret").unwrap();
        assert!(backend.open(&key2, &sealed).is_err());
    }
}

#[test]
fn cross_backend_open_fails() {
    let key = generate_master_key();
    let modern = Backend::Modern.seal(&key, b"Secret").unwrap();
    assert!(Backend::Legacy.open(&key, &modern).is_err());
    let legacy = Backend::Legacy.seal(&key, b"Secret").unwrap();
    assert!(Backend::Modern.open(&key, &legacy).is_err());
}

#[test]
fn truncated_payload_fails() {
    let key = generate_master_key();
    for backend in Backend::PREFERENCE {
        let sealed = backend.seal(&key, b"Secret").unwrap();
        assert!(backend.open(&key, &sealed[..backend.min_payload_len() - 1]).is_err());
        assert!(backend.open(&key, &[]).is_err());
    }
}

#[test]
fn same_plaintext_produces_different_payloads() {
    let key = generate_master_key();
    for backend in Backend::PREFERENCE {
        let a = backend.seal(&key, b"Same").unwrap();
        let b = backend.seal(&key, b"Same").unwrap();
        assert_ne!(a, b);
    }
}

// ── Capabilities ─────────────────────────────────────────────────

#[test]
fn default_capabilities_prefer_modern() {
    assert_eq!(
        Capabilities::default().available(),
        vec![Backend::Modern, Backend::Legacy]
    );
}

#[test]
fn legacy_only_capabilities() {
    let caps = Capabilities::only(Backend::Legacy);
    assert_eq!(caps.available(), vec![Backend::Legacy]);
}

#[test]
fn no_capabilities_detects_nothing() {
    let caps = Capabilities::none();
    assert!(caps.available().is_empty());
}

#[test]
fn compiled_backends_pass_probe() {
    for backend in Backend::PREFERENCE {
        assert!(backend.is_compiled());
        assert!(backend.probe());
    }
}
