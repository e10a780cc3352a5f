//! Host collaborators the key manager reads from.
//!
//! The vault never decides where the key file lives or how the host exposes
//! its environment; it asks a [`KeyEnvironment`].

use crate::config::VaultConfig;
use std::collections::HashMap;
use std::path::PathBuf;

/// Read-only view of the host: key file location, environment variables
/// and deployment-time constants.
pub trait KeyEnvironment: Send + Sync {
    /// Where the key file lives (or will be written).
    fn secure_key_path(&self) -> PathBuf;

    fn read_env(&self, name: &str) -> Option<String>;

    fn read_deploy_config(&self, name: &str) -> Option<String>;

    /// Historical key file locations, consulted only by migration.
    fn legacy_key_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Web-servable document root, if the host has one.
    fn document_root(&self) -> Option<PathBuf> {
        None
    }
}

/// Reads the process environment; everything else comes from [`VaultConfig`].
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    config: VaultConfig,
}

impl SystemEnvironment {
    pub fn from_config(config: VaultConfig) -> Self {
        Self { config }
    }
}

impl KeyEnvironment for SystemEnvironment {
    fn secure_key_path(&self) -> PathBuf {
        self.config.key_path.clone()
    }

    fn read_env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn read_deploy_config(&self, name: &str) -> Option<String> {
        self.config.deploy.get(name).cloned()
    }

    fn legacy_key_paths(&self) -> Vec<PathBuf> {
        self.config.legacy_key_paths.clone()
    }

    fn document_root(&self) -> Option<PathBuf> {
        self.config.document_root.clone()
    }
}

/// Every value supplied up front. Used when embedding the vault in a host
/// that resolves its own settings, and in tests.
#[derive(Debug, Clone, Default)]
pub struct FixedEnvironment {
    key_path: PathBuf,
    env: HashMap<String, String>,
    deploy: HashMap<String, String>,
    legacy_paths: Vec<PathBuf>,
    document_root: Option<PathBuf>,
}

impl FixedEnvironment {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_deploy_value(mut self, name: &str, value: &str) -> Self {
        self.deploy.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_legacy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_paths.push(path.into());
        self
    }

    pub fn with_document_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.document_root = Some(root.into());
        self
    }
}

impl KeyEnvironment for FixedEnvironment {
    fn secure_key_path(&self) -> PathBuf {
        self.key_path.clone()
    }

    fn read_env(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn read_deploy_config(&self, name: &str) -> Option<String> {
        self.deploy.get(name).cloned()
    }

    fn legacy_key_paths(&self) -> Vec<PathBuf> {
        self.legacy_paths.clone()
    }

    fn document_root(&self) -> Option<PathBuf> {
        self.document_root.clone()
    }
}
