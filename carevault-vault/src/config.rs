//! Vault configuration, read from `carevault.toml`.
//!
//! ```toml
//! key_env_var = "CAREVAULT_ENCRYPTION_KEY"
//! key_config_name = "CAREVAULT_ENCRYPTION_KEY"
//! key_path = "/var/lib/carevault/private/master.key"
//! legacy_key_paths = ["/var/www/portal/uploads/.key"]
//! document_root = "/var/www/portal"
//!
//! [deploy]
//! CAREVAULT_ENCRYPTION_KEY = "base64..."
//! ```

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default name of both the environment variable and the deploy-config
/// value holding a base64 master key.
pub const DEFAULT_KEY_NAME: &str = "CAREVAULT_ENCRYPTION_KEY";

#[derive(Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Environment variable consulted first.
    #[serde(default = "default_key_name")]
    pub key_env_var: String,
    /// Deploy-config value consulted second.
    #[serde(default = "default_key_name")]
    pub key_config_name: String,
    /// Key file consulted last, and where generated keys are written.
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
    /// Historical key file locations, oldest last.
    #[serde(default)]
    pub legacy_key_paths: Vec<PathBuf>,
    /// Web-servable root; a key file under it triggers a warning.
    #[serde(default)]
    pub document_root: Option<PathBuf>,
    /// Deployment-time constants.
    #[serde(default)]
    pub deploy: HashMap<String, String>,
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.to_string()
}

fn default_key_path() -> PathBuf {
    PathBuf::from("private").join("carevault.key")
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            key_env_var: default_key_name(),
            key_config_name: default_key_name(),
            key_path: default_key_path(),
            legacy_key_paths: Vec::new(),
            document_root: None,
            deploy: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut deploy_names: Vec<&String> = self.deploy.keys().collect();
        deploy_names.sort();
        f.debug_struct("VaultConfig")
            .field("key_env_var", &self.key_env_var)
            .field("key_config_name", &self.key_config_name)
            .field("key_path", &self.key_path)
            .field("legacy_key_paths", &self.legacy_key_paths)
            .field("document_root", &self.document_root)
            .field("deploy", &deploy_names)
            .finish()
    }
}

impl VaultConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> VaultResult<Self> {
        toml::from_str(contents).map_err(|e| VaultError::Config(e.to_string()))
    }

    /// Loads configuration from `path`.
    /// A missing or unreadable file falls back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No vault config found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded vault config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse vault config {:?}: {}. Falling back to defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read vault config {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}
