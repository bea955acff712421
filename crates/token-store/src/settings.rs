//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file next to the
//! credentials. The only setting the credential store depends on is the
//! SSH key used for encryption.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::SshKeyPair;
use crate::error::{Result, StoreError};
use crate::storage::write_atomic;

/// Settings file name
pub const SETTINGS_FILE: &str = "config.json";

/// Current settings file version
const SETTINGS_VERSION: u32 = 1;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Private key tokens are encrypted to (`None` = plaintext)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
    /// Public key for `ssh_key` when it is not `<ssh_key>.pub`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            ssh_key: None,
            ssh_public_key: None,
        }
    }
}

/// Gettable/settable encryption key configuration
#[async_trait]
pub trait KeySetting: Send + Sync {
    /// Private key currently configured for token encryption
    fn encryption_key(&self) -> Option<PathBuf>;

    /// Configured key with the public key it was validated against
    fn encryption_key_pair(&self) -> Option<SshKeyPair> {
        self.encryption_key().map(|key| SshKeyPair::conventional(&key))
    }

    /// Persist a new key (`None` clears it)
    async fn set_encryption_key(&mut self, key: Option<SshKeyPair>) -> Result<()>;
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Load settings from `config_dir`, using defaults when none are saved
    pub fn new(config_dir: &Path) -> Result<Self> {
        let settings_file = config_dir.join(SETTINGS_FILE);
        let settings = Self::load_from_file(&settings_file)?;

        Ok(Self {
            settings_file,
            settings,
        })
    }

    /// Load settings from file
    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;
        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            StoreError::TokenStore(format!("{} is corrupted ({})", path.display(), e))
        })?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.settings_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(format!("create {}", parent.display()), e))?;
        }

        let contents = serde_json::to_string_pretty(&self.settings)
            .map_err(|e| StoreError::TokenStore(format!("Failed to serialize settings: {}", e)))?;
        write_atomic(&self.settings_file, contents.as_bytes()).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_file(&self) -> &Path {
        &self.settings_file
    }
}

#[async_trait]
impl KeySetting for SettingsManager {
    fn encryption_key(&self) -> Option<PathBuf> {
        self.settings.ssh_key.clone()
    }

    fn encryption_key_pair(&self) -> Option<SshKeyPair> {
        let private_key = self.settings.ssh_key.as_deref()?;
        Some(match &self.settings.ssh_public_key {
            Some(public_key) => SshKeyPair {
                private_key: private_key.to_path_buf(),
                public_key: public_key.clone(),
            },
            None => SshKeyPair::conventional(private_key),
        })
    }

    async fn set_encryption_key(&mut self, key: Option<SshKeyPair>) -> Result<()> {
        let previous = self.settings.clone();
        self.settings.ssh_public_key = key
            .as_ref()
            .filter(|pair| !pair.is_conventional())
            .map(|pair| pair.public_key.clone());
        self.settings.ssh_key = key.map(|pair| pair.private_key);

        if let Err(e) = self.save().await {
            self.settings = previous;
            return Err(e);
        }
        Ok(())
    }
}
