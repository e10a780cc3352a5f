#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::STANDARD};
use carevault_vault::{
    Capabilities, EncryptionService, FixedEnvironment, KeyManager, VaultConfig, DEFAULT_KEY_NAME,
};
use std::path::PathBuf;
use std::sync::{Arc, Once};
use tempfile::TempDir;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A temp directory with a key path inside it.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        init_tracing();
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.path().join("private").join("master.key")
    }

    pub fn env(&self) -> FixedEnvironment {
        FixedEnvironment::new(self.key_path())
    }

    pub fn key_manager(&self, env: FixedEnvironment) -> KeyManager {
        KeyManager::new(&VaultConfig::default(), Arc::new(env))
    }

    pub fn service(&self, env: FixedEnvironment) -> EncryptionService {
        EncryptionService::new(self.key_manager(env))
    }

    pub fn service_with(&self, env: FixedEnvironment, caps: Capabilities) -> EncryptionService {
        EncryptionService::with_capabilities(self.key_manager(env), caps)
    }

    /// A service with a freshly generated file-backed key.
    pub fn ready_service(&self) -> EncryptionService {
        let service = self.service(self.env());
        assert!(service.key_manager().ensure_key_exists());
        service
    }

    pub fn write_key_file(&self, b64: &str) {
        let path = self.key_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b64).unwrap();
        restrict(&path);
    }
}

#[cfg(unix)]
pub fn restrict(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).unwrap();
}

#[cfg(not(unix))]
pub fn restrict(_path: &std::path::Path) {}

/// Base64 of a key made of one repeated byte.
pub fn key_b64(byte: u8) -> String {
    STANDARD.encode([byte; 32])
}

pub const KEY_NAME: &str = DEFAULT_KEY_NAME;

/// Makes `path` read-only. Returns false when the restriction is not
/// enforced for this process (running as root), so callers can skip.
#[cfg(unix)]
pub fn make_read_only(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o400)).unwrap();
    std::fs::OpenOptions::new().write(true).open(path).is_err()
}
