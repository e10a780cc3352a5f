//! Master key resolution, generation, migration and wipe.
//!
//! Sources are tried in fixed order and the first valid one wins:
//!
//! 1. environment variable (base64)
//! 2. deployment config value (base64)
//! 3. key file at the resolver-supplied path (base64 text)
//!
//! A source whose value does not decode to exactly 32 bytes is rejected
//! with a warning and resolution moves on. I/O problems never escape as
//! errors; they are recorded as warnings. The one hard failure is
//! [`KeyManager::get_key`] with nothing resolved.

use crate::config::VaultConfig;
use crate::environment::KeyEnvironment;
use crate::error::{VaultError, VaultResult};
use crate::storage;
use carevault_crypto::{MasterKey, generate_master_key};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// How many times to re-read a key file another process is still writing.
const CONFLICT_READ_ATTEMPTS: u32 = 5;
const CONFLICT_READ_DELAY: Duration = Duration::from_millis(20);

/// Where the loaded key came from. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeySource {
    Environment,
    DeployConfig,
    File,
    /// Generated by this instance and written to the key file.
    Generated,
    #[default]
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            KeySource::Environment => "environment",
            KeySource::DeployConfig => "deploy-config",
            KeySource::File => "file",
            KeySource::Generated => "generated",
            KeySource::None => "none",
        })
    }
}

/// Result of [`KeyManager::migrate_old_key_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The key file already exists at the current location.
    NotNeeded,
    /// No readable legacy key file was found.
    NoLegacyKey,
    /// The key was moved and the legacy file wiped.
    Migrated { from: PathBuf },
    /// A legacy key was found but could not be written to the new location.
    Failed,
}

#[derive(Default)]
struct KeyState {
    key: Option<MasterKey>,
    source: KeySource,
    resolved: bool,
}

/// Owns the single master key of one vault instance.
pub struct KeyManager {
    env: Arc<dyn KeyEnvironment>,
    key_env_var: String,
    key_config_name: String,
    state: Mutex<KeyState>,
    warnings: Mutex<Vec<String>>,
}

impl KeyManager {
    pub fn new(config: &VaultConfig, env: Arc<dyn KeyEnvironment>) -> Self {
        Self {
            env,
            key_env_var: config.key_env_var.clone(),
            key_config_name: config.key_config_name.clone(),
            state: Mutex::new(KeyState::default()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Returns the key, resolving it on first use.
    pub fn get_key(&self) -> VaultResult<MasterKey> {
        self.resolved_state()
            .key
            .clone()
            .ok_or(VaultError::NoKeyLoaded)
    }

    pub fn has_key(&self) -> bool {
        self.resolved_state().key.is_some()
    }

    pub fn key_source(&self) -> KeySource {
        self.resolved_state().source
    }

    pub fn key_path(&self) -> PathBuf {
        self.env.secure_key_path()
    }

    /// Operator-facing warnings recorded since the last cache clear.
    pub fn warnings(&self) -> Vec<String> {
        self.lock_warnings().clone()
    }

    /// Makes sure a key is loaded, generating and persisting one if no
    /// source provides it. Returns false if the key file cannot be written.
    pub fn ensure_key_exists(&self) -> bool {
        let mut state = self.resolved_state();
        if state.key.is_some() {
            return true;
        }

        let path = self.env.secure_key_path();
        self.check_location(&path);

        let key = generate_master_key();
        match storage::create_key_file(&path, key.to_base64().as_bytes()) {
            Ok(()) => {
                info!(path = %path.display(), "Generated new master key");
                state.key = Some(key);
                state.source = KeySource::Generated;
                true
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Key file appeared concurrently, adopting it");
                match self.read_conflicting_key(&path) {
                    Some(existing) => {
                        state.key = Some(existing);
                        state.source = KeySource::File;
                        true
                    }
                    None => false,
                }
            }
            Err(e) => {
                self.record_warning(format!(
                    "cannot write key file {}: {e}; encryption stays unavailable until the directory is writable",
                    path.display()
                ));
                false
            }
        }
    }

    /// Moves a key from a legacy location to the current key path.
    ///
    /// Runs only when the current path has no key file. The first legacy
    /// file holding a valid key is copied, then overwritten with zeros and
    /// deleted. The cached key is dropped so the next access reloads from
    /// the new location; warnings are kept.
    pub fn migrate_old_key_file(&self) -> MigrationOutcome {
        let path = self.env.secure_key_path();
        if path.exists() {
            return MigrationOutcome::NotNeeded;
        }

        for legacy in self.env.legacy_key_paths() {
            if legacy == path {
                continue;
            }
            let contents = match storage::read_key_file(&legacy) {
                Ok(Some(contents)) => contents,
                Ok(None) => continue,
                Err(e) => {
                    self.record_warning(format!(
                        "cannot read legacy key file {}: {e}",
                        legacy.display()
                    ));
                    continue;
                }
            };
            if let Err(e) = MasterKey::from_base64(&contents) {
                self.record_warning(format!(
                    "legacy key file {} ignored: {e}",
                    legacy.display()
                ));
                continue;
            }

            match storage::create_key_file(&path, contents.trim().as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return MigrationOutcome::NotNeeded;
                }
                Err(e) => {
                    self.record_warning(format!(
                        "cannot migrate key file to {}: {e}",
                        path.display()
                    ));
                    return MigrationOutcome::Failed;
                }
            }

            if let Err(e) = storage::wipe_file(&legacy) {
                self.record_warning(format!(
                    "migrated key but could not wipe legacy file {}: {e}",
                    legacy.display()
                ));
            }
            info!(
                from = %legacy.display(),
                to = %path.display(),
                "Migrated master key file"
            );
            // Warnings about skipped or unwiped legacy files must survive.
            self.forget_key();
            return MigrationOutcome::Migrated { from: legacy };
        }

        MigrationOutcome::NoLegacyKey
    }

    /// Drops the cached key and warnings. The next access re-resolves.
    pub fn clear_cache(&self) {
        self.forget_key();
        self.lock_warnings().clear();
    }

    fn forget_key(&self) {
        *self.lock_state() = KeyState::default();
    }

    /// Overwrites the key file with zeros and deletes it.
    /// Returns whether a file was wiped. The in-memory key is untouched.
    pub fn wipe_key_file(&self) -> bool {
        self.try_wipe_key_file().unwrap_or(false)
    }

    /// Like [`wipe_key_file`](Self::wipe_key_file), but a file that exists
    /// and cannot be wiped is an error. The failure is also recorded as a
    /// warning.
    pub(crate) fn try_wipe_key_file(&self) -> VaultResult<bool> {
        let path = self.env.secure_key_path();
        if !path.exists() {
            return Ok(false);
        }
        match storage::wipe_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Wiped master key file");
                Ok(true)
            }
            Err(e) => {
                self.record_warning(format!(
                    "could not wipe key file {}: {e}",
                    path.display()
                ));
                Err(VaultError::Io { path, source: e })
            }
        }
    }

    pub(crate) fn record_warning(&self, message: String) {
        warn!("{}", message);
        self.lock_warnings().push(message);
    }

    fn resolved_state(&self) -> MutexGuard<'_, KeyState> {
        let mut state = self.lock_state();
        if !state.resolved {
            self.resolve(&mut state);
        }
        state
    }

    fn resolve(&self, state: &mut KeyState) {
        state.resolved = true;

        let env_value = self.env.read_env(&self.key_env_var).map(Zeroizing::new);
        if let Some(key) = self.decode_source(KeySource::Environment, env_value) {
            debug!(var = %self.key_env_var, "Master key loaded from environment");
            state.key = Some(key);
            state.source = KeySource::Environment;
            return;
        }

        let deploy_value = self
            .env
            .read_deploy_config(&self.key_config_name)
            .map(Zeroizing::new);
        if let Some(key) = self.decode_source(KeySource::DeployConfig, deploy_value) {
            debug!(name = %self.key_config_name, "Master key loaded from deploy config");
            state.key = Some(key);
            state.source = KeySource::DeployConfig;
            return;
        }

        if let Some(key) = self.load_key_file() {
            state.key = Some(key);
            state.source = KeySource::File;
            return;
        }

        self.record_warning(
            "no encryption key configured; one will be generated when a key is first required for writing"
                .to_string(),
        );
    }

    fn decode_source(
        &self,
        source: KeySource,
        value: Option<Zeroizing<String>>,
    ) -> Option<MasterKey> {
        let value = value?;
        if value.trim().is_empty() {
            return None;
        }
        match MasterKey::from_base64(&value) {
            Ok(key) => Some(key),
            Err(e) => {
                self.record_warning(format!("{source} key rejected: {e}"));
                None
            }
        }
    }

    fn load_key_file(&self) -> Option<MasterKey> {
        let path = self.env.secure_key_path();
        let contents = match storage::read_key_file(&path) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                self.record_warning(format!("cannot read key file {}: {e}", path.display()));
                return None;
            }
        };

        let key = self.decode_source(KeySource::File, Some(contents))?;
        debug!(path = %path.display(), "Master key loaded from file");
        self.check_permissions(&path);
        self.check_location(&path);
        Some(key)
    }

    /// Re-reads a key file that another process created first. It may still
    /// be empty for a moment while that process writes it.
    fn read_conflicting_key(&self, path: &Path) -> Option<MasterKey> {
        for attempt in 1..=CONFLICT_READ_ATTEMPTS {
            match storage::read_key_file(path) {
                Ok(Some(contents)) if !contents.trim().is_empty() => {
                    return match MasterKey::from_base64(&contents) {
                        Ok(key) => {
                            self.check_permissions(path);
                            Some(key)
                        }
                        Err(e) => {
                            self.record_warning(format!(
                                "existing key file {} is invalid: {e}",
                                path.display()
                            ));
                            None
                        }
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    self.record_warning(format!(
                        "cannot read key file {}: {e}",
                        path.display()
                    ));
                    return None;
                }
            }
            if attempt < CONFLICT_READ_ATTEMPTS {
                std::thread::sleep(CONFLICT_READ_DELAY);
            }
        }
        self.record_warning(format!(
            "key file {} is empty, possibly left by an interrupted write; \
             delete it or call reset_key to generate a new key",
            path.display()
        ));
        None
    }

    fn check_permissions(&self, path: &Path) {
        match storage::is_too_permissive(path) {
            Ok(false) => {}
            Ok(true) => {
                self.record_warning(format!(
                    "key file {} is readable by other users; restricting to owner",
                    path.display()
                ));
                if let Err(e) = storage::restrict_permissions(path) {
                    self.record_warning(format!(
                        "could not restrict permissions on {}: {e}",
                        path.display()
                    ));
                }
            }
            Err(e) => debug!(path = %path.display(), "Cannot stat key file: {}", e),
        }
    }

    fn check_location(&self, path: &Path) {
        if let Some(root) = self.env.document_root() {
            if storage::is_within(path, &root) {
                self.record_warning(format!(
                    "key file {} is inside the web document root {}; move it outside",
                    path.display(),
                    root.display()
                ));
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, KeyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_warnings(&self) -> MutexGuard<'_, Vec<String>> {
        self.warnings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("key_path", &self.env.secure_key_path())
            .field("key_env_var", &self.key_env_var)
            .field("key_config_name", &self.key_config_name)
            .finish_non_exhaustive()
    }
}
