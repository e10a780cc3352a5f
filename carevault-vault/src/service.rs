//! Authenticated encryption, decryption and keyed hashing on top of the
//! [`KeyManager`].

use crate::config::VaultConfig;
use crate::environment::{KeyEnvironment, SystemEnvironment};
use crate::error::{VaultError, VaultResult};
use crate::key_manager::{KeyManager, KeySource};
use carevault_crypto::{
    Backend, Capabilities, DataEncryptor, EncryptorError, EncryptorResult, Envelope, keyed_hash,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{error, info, warn};
use zeroize::Zeroizing;

/// Plaintext recovered by [`EncryptionService::decrypt_structured`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decrypted {
    /// The plaintext parsed as JSON.
    Structured(serde_json::Value),
    /// Authenticated, but not JSON. Older records stored bare strings.
    Raw(String),
}

impl Decrypted {
    /// Collapses to a JSON value; raw text becomes a JSON string.
    pub fn into_value(self) -> serde_json::Value {
        match self {
            Decrypted::Structured(value) => value,
            Decrypted::Raw(text) => serde_json::Value::String(text),
        }
    }
}

/// What [`EncryptionService::reset_key`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    /// A previous key file existed and was wiped.
    pub wiped_previous: bool,
    /// Where the key now in use came from.
    pub key_source: KeySource,
}

#[derive(Debug, Default)]
struct Detection {
    active: Option<Backend>,
    /// Usable backends in preference order; untagged payloads probe these.
    available: Vec<Backend>,
}

pub struct EncryptionService {
    keys: KeyManager,
    capabilities: Capabilities,
    detection: RwLock<Detection>,
    warnings: Mutex<Vec<String>>,
}

impl EncryptionService {
    /// Creates a service using every backend this build supports.
    pub fn new(keys: KeyManager) -> Self {
        Self::with_capabilities(keys, Capabilities::default())
    }

    /// Creates a service limited to `capabilities`.
    pub fn with_capabilities(keys: KeyManager, capabilities: Capabilities) -> Self {
        let service = Self {
            keys,
            capabilities,
            detection: RwLock::new(Detection::default()),
            warnings: Mutex::new(Vec::new()),
        };
        service.detect_backend();
        service
    }

    /// Builds the key manager and service from configuration, reading the
    /// process environment.
    pub fn from_config(config: VaultConfig) -> Self {
        let env = Arc::new(SystemEnvironment::from_config(config.clone()));
        Self::new(KeyManager::new(&config, env))
    }

    /// Builds the service over a caller-supplied environment.
    pub fn with_environment(config: &VaultConfig, env: Arc<dyn KeyEnvironment>) -> Self {
        Self::new(KeyManager::new(config, env))
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.keys
    }

    /// The backend new envelopes are sealed with, `None` when disabled.
    pub fn backend(&self) -> Option<Backend> {
        self.read_detection().active
    }

    /// A backend was detected and a key is loaded.
    pub fn is_available(&self) -> bool {
        self.backend().is_some() && self.keys.has_key()
    }

    /// Service warnings followed by key manager warnings.
    pub fn warnings(&self) -> Vec<String> {
        let mut all = self.lock_warnings().clone();
        all.extend(self.keys.warnings());
        all
    }

    /// Encrypts a UTF-8 string into envelope text.
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        self.seal(plaintext.as_bytes())
    }

    /// Serializes `value` to JSON, then encrypts it.
    pub fn encrypt_value<T: Serialize + ?Sized>(&self, value: &T) -> VaultResult<String> {
        let json = Zeroizing::new(serde_json::to_string(value)?);
        self.seal(json.as_bytes())
    }

    /// Decrypts envelope text to a UTF-8 string.
    pub fn decrypt(&self, envelope: &str) -> VaultResult<String> {
        let plaintext = self.open(envelope)?;
        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed)
    }

    /// Decrypts and parses JSON, falling back to the raw string when the
    /// authenticated plaintext is not JSON.
    pub fn decrypt_structured(&self, envelope: &str) -> VaultResult<Decrypted> {
        let text = Zeroizing::new(self.decrypt(envelope)?);
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Decrypted::Structured(value)),
            Err(_) => Ok(Decrypted::Raw(text.to_string())),
        }
    }

    /// Decrypts and deserializes into `T`. Unlike
    /// [`decrypt_structured`](Self::decrypt_structured), a parse failure is
    /// an error.
    pub fn decrypt_value<T: DeserializeOwned>(&self, envelope: &str) -> VaultResult<T> {
        let plaintext = Zeroizing::new(self.open(envelope)?);
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Lowercase hex HMAC-SHA256 of `data` under the master key.
    ///
    /// Needs a key but not an AEAD backend.
    pub fn hash(&self, data: impl AsRef<[u8]>) -> VaultResult<String> {
        let key = self.keys.get_key()?;
        Ok(keyed_hash(&key, data.as_ref())?)
    }

    /// Encrypts the whole of `source` and writes the envelope text to `dest`.
    pub fn encrypt_file(&self, source: &Path, dest: &Path) -> VaultResult<()> {
        let plaintext = Zeroizing::new(std::fs::read(source).map_err(VaultError::io(source))?);
        let envelope = self.seal(&plaintext)?;
        std::fs::write(dest, envelope).map_err(VaultError::io(dest))
    }

    /// Reads envelope text from `path` and returns the decrypted bytes.
    pub fn decrypt_file(&self, path: &Path) -> VaultResult<Vec<u8>> {
        let envelope = std::fs::read_to_string(path).map_err(VaultError::io(path))?;
        self.open(envelope.trim_end())
    }

    /// Rotates the master key.
    ///
    /// Wipes the current key file, clears the cached key, generates and
    /// persists a new one, then re-runs backend detection. **Everything
    /// encrypted under the previous key becomes permanently unreadable.**
    /// Other instances keep using their cached copy of the old key until
    /// their own cache is cleared.
    ///
    /// If the existing key file cannot be wiped, nothing changes: the error
    /// is returned, the old key stays loaded and a warning is recorded.
    pub fn reset_key(&self) -> VaultResult<ResetOutcome> {
        let wiped_previous = self.keys.try_wipe_key_file()?;
        self.keys.clear_cache();

        if !self.keys.ensure_key_exists() {
            return Err(VaultError::KeyGeneration(format!(
                "could not create a new key at {}",
                self.keys.key_path().display()
            )));
        }

        let key_source = self.keys.key_source();
        if matches!(key_source, KeySource::Environment | KeySource::DeployConfig) {
            self.keys.record_warning(format!(
                "key reset did not change the key: it is supplied by the {key_source} source and must be rotated there"
            ));
        }

        self.lock_warnings().clear();
        self.detect_backend();

        info!(%key_source, wiped_previous, "Master key reset");
        Ok(ResetOutcome {
            wiped_previous,
            key_source,
        })
    }

    fn detect_backend(&self) {
        let available = self.capabilities.available();
        let active = available.first().copied();

        match active {
            Some(Backend::Modern) => {}
            Some(Backend::Legacy) => self.record_warning(
                "modern AEAD backend unavailable; operating in fallback mode (AES-256-GCM)"
                    .to_string(),
            ),
            None => {
                let message =
                    "no authenticated-encryption backend available; encryption is disabled"
                        .to_string();
                error!("{}", message);
                self.lock_warnings().push(message);
            }
        }

        *self.detection.write().unwrap_or_else(PoisonError::into_inner) = Detection {
            active,
            available,
        };
    }

    fn seal(&self, plaintext: &[u8]) -> VaultResult<String> {
        let backend = self.backend().ok_or(VaultError::NoBackendAvailable)?;
        let key = self.keys.get_key()?;
        Ok(Envelope::seal(backend, &key, plaintext)?.encode())
    }

    fn open(&self, envelope: &str) -> VaultResult<Vec<u8>> {
        let available = self.read_detection().available.clone();
        if available.is_empty() {
            return Err(VaultError::NoBackendAvailable);
        }
        let key = self.keys.get_key()?;
        Ok(Envelope::parse(envelope)?.open(&key, &available)?)
    }

    fn record_warning(&self, message: String) {
        warn!("{}", message);
        self.lock_warnings().push(message);
    }

    fn read_detection(&self) -> std::sync::RwLockReadGuard<'_, Detection> {
        self.detection.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_warnings(&self) -> MutexGuard<'_, Vec<String>> {
        self.warnings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("backend", &self.backend())
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl DataEncryptor for EncryptionService {
    fn encrypt_bytes(&self, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        self.seal(data)
            .map(String::into_bytes)
            .map_err(to_encryptor_error)
    }

    fn decrypt_bytes(&self, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        let envelope = std::str::from_utf8(data)
            .map_err(|_| to_encryptor_error(VaultError::DecryptionFailed))?;
        self.open(envelope).map_err(to_encryptor_error)
    }

    fn is_available(&self) -> bool {
        EncryptionService::is_available(self)
    }
}

fn to_encryptor_error(err: VaultError) -> EncryptorError {
    match err {
        VaultError::NoKeyLoaded | VaultError::NoBackendAvailable => EncryptorError::Unavailable,
        VaultError::Serialization(e) => EncryptorError::Serialization(e),
        other => EncryptorError::Crypto(other.to_string()),
    }
}
