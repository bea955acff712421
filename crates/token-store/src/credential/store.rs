//! Credential store for workspace CRUD and re-keying

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::token::{normalize_cookie, TokenKind};
use super::types::{Credential, CredentialMap};
use crate::crypto::{Encryptor, SshKeyPair};
use crate::error::{Result, StoreError};
use crate::interaction::Interaction;
use crate::storage::{ArtifactState, ConfigPaths, CredentialLoader, CredentialSaver};

/// Named workspace credentials, loaded lazily and persisted on every change
pub struct CredentialStore {
    loader: CredentialLoader,
    saver: CredentialSaver,
    encryptor: Encryptor,
    /// Key pair the map is encrypted to (`None` = plaintext)
    key: RwLock<Option<SshKeyPair>>,
    /// Loaded on first access
    cache: RwLock<Option<CredentialMap>>,
}

impl CredentialStore {
    /// Store encrypting to `key` and its `<key>.pub`
    pub fn new(paths: Arc<dyn ConfigPaths>, encryptor: Encryptor, key: Option<PathBuf>) -> Self {
        let pair = key.as_deref().map(SshKeyPair::conventional);
        Self::with_key_pair(paths, encryptor, pair)
    }

    pub fn with_key_pair(
        paths: Arc<dyn ConfigPaths>,
        encryptor: Encryptor,
        key: Option<SshKeyPair>,
    ) -> Self {
        Self {
            loader: CredentialLoader::new(paths.clone(), encryptor.clone()),
            saver: CredentialSaver::new(paths, encryptor.clone()),
            encryptor,
            key: RwLock::new(key),
            cache: RwLock::new(None),
        }
    }

    pub fn loader(&self) -> &CredentialLoader {
        &self.loader
    }

    pub fn encryptor(&self) -> &Encryptor {
        &self.encryptor
    }

    /// Private key currently used for reads and writes
    pub async fn key_path(&self) -> Option<PathBuf> {
        self.key.read().await.as_ref().map(|pair| pair.private_key.clone())
    }

    pub async fn key_pair(&self) -> Option<SshKeyPair> {
        self.key.read().await.clone()
    }

    pub async fn artifact_state(&self) -> ArtifactState {
        self.loader.state().await
    }

    /// Return the cached map, loading it on first use
    async fn map(&self) -> Result<CredentialMap> {
        if let Some(map) = self.cache.read().await.as_ref() {
            return Ok(map.clone());
        }

        let key = self.key_path().await;
        let map = self.loader.load(key.as_deref()).await?;

        let mut cache = self.cache.write().await;
        *cache = Some(map.clone());
        Ok(map)
    }

    /// Persist `map` under the current key and make it the cached state
    async fn persist(&self, map: CredentialMap) -> Result<()> {
        let pair = self.key_pair().await;

        self.saver.save_with_cleanup(&map, pair.as_ref()).await?;

        let mut cache = self.cache.write().await;
        *cache = Some(map);
        Ok(())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.map().await?.is_empty())
    }

    /// Workspace names in sorted order
    pub async fn names(&self) -> Result<Vec<String>> {
        Ok(self.map().await?.into_keys().collect())
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.map().await?.contains_key(name.trim()))
    }

    pub async fn get(&self, name: &str) -> Result<Credential> {
        let name = name.trim();
        self.map()
            .await?
            .remove(name)
            .ok_or_else(|| StoreError::WorkspaceNotFound(name.to_string()))
    }

    pub async fn all(&self) -> Result<CredentialMap> {
        self.map().await
    }

    /// Add or replace the credential for workspace `name`
    ///
    /// The token must use a known scheme; browser session tokens also need
    /// their cookie. A cookie given for any other scheme is not stored.
    pub async fn add(&self, name: &str, token: &str, cookie: Option<&str>) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "Workspace name cannot be empty".to_string(),
            ));
        }

        let token = token.trim();
        let kind = TokenKind::from_token(token).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "Invalid token format: expected a token starting with one of {}",
                TokenKind::accepted_prefixes()
            ))
        })?;

        let cookie = cookie.map(normalize_cookie).filter(|c| !c.is_empty());
        let cookie = if kind.requires_cookie() {
            let cookie = cookie.ok_or_else(|| {
                StoreError::InvalidArgument(format!(
                    "{} tokens ({}) require a cookie",
                    kind,
                    kind.prefix()
                ))
            })?;
            Some(cookie.to_string())
        } else {
            if cookie.is_some() {
                debug!("Ignoring cookie for {} token", kind);
            }
            None
        };

        let mut map = self.map().await?;
        map.insert(name.to_string(), Credential::new(token, cookie));
        self.persist(map).await?;

        info!("Saved {} token for workspace {}", kind, name);
        Ok(())
    }

    /// Remove workspace `name`, returning whether it existed
    ///
    /// Removing the last workspace still persists an empty map.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        let mut map = self.map().await?;
        if map.remove(name).is_none() {
            return Ok(false);
        }

        self.persist(map).await?;
        info!("Removed workspace {}", name);
        Ok(true)
    }

    /// Re-write every credential from `old_key` to `new_key`
    ///
    /// Either key may be `None` (plaintext). The current file is read with
    /// `old_key`, `new_key` is validated, and only then is the new file
    /// written; the old one is removed after the new one is in place. If
    /// nothing has been persisted yet only the validation happens.
    ///
    /// Returns the validated key pair, if any.
    pub async fn migrate_encryption(
        &self,
        old_key: Option<&Path>,
        new_key: Option<&Path>,
        interaction: &dyn Interaction,
    ) -> Result<Option<SshKeyPair>> {
        let state = self.loader.state().await;
        let map = self.loader.load(old_key).await?;

        let pair = match new_key {
            Some(key) => Some(self.encryptor.validate_key_type(key, interaction).await?),
            None => None,
        };

        if state == ArtifactState::Absent {
            debug!("No credentials persisted yet; nothing to migrate");
        } else {
            match &pair {
                Some(pair) => interaction.info(&format!(
                    "Encrypting {} workspace(s) with {}",
                    map.len(),
                    pair.private_key.display()
                )),
                None => interaction.info(&format!(
                    "Storing {} workspace(s) without encryption",
                    map.len()
                )),
            }

            self.saver.save_with_cleanup(&map, pair.as_ref()).await?;
        }

        *self.key.write().await = pair.clone();
        *self.cache.write().await = Some(map);

        info!("Migrated credentials from {:?} to {:?}", old_key, new_key);
        Ok(pair)
    }
}
