//! Writing the credential map

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::atomic::{discard, replace, restrict_to_owner, temp_path_for, write_atomic};
use super::{ConfigPaths, ENCRYPTED_TOKENS_FILE, TOKENS_FILE};
use crate::credential::CredentialMap;
use crate::crypto::{Encryptor, SecretBytes, SshKeyPair};
use crate::error::{Result, StoreError};

/// Persists the credential map as `tokens.json` or `tokens.age`
#[derive(Clone)]
pub struct CredentialSaver {
    paths: Arc<dyn ConfigPaths>,
    encryptor: Encryptor,
}

impl CredentialSaver {
    pub fn new(paths: Arc<dyn ConfigPaths>, encryptor: Encryptor) -> Self {
        Self { paths, encryptor }
    }

    fn target(&self, key: Option<&SshKeyPair>) -> PathBuf {
        match key {
            Some(_) => self.paths.config_file(ENCRYPTED_TOKENS_FILE),
            None => self.paths.config_file(TOKENS_FILE),
        }
    }

    fn stale(&self, key: Option<&SshKeyPair>) -> PathBuf {
        match key {
            Some(_) => self.paths.config_file(TOKENS_FILE),
            None => self.paths.config_file(ENCRYPTED_TOKENS_FILE),
        }
    }

    /// Atomically write `map`, encrypted to `key` when one is given
    ///
    /// On failure the previous file at the target path is untouched and no
    /// temporary file is left behind. Returns the path written.
    pub async fn save(&self, map: &CredentialMap, key: Option<&SshKeyPair>) -> Result<PathBuf> {
        self.paths.ensure_config_dir()?;

        let contents = SecretBytes::new(serde_json::to_vec(map).map_err(|e| {
            StoreError::TokenStore(format!("Failed to serialize credentials: {}", e))
        })?);
        let target = self.target(key);

        match key {
            Some(pair) => {
                let temp = temp_path_for(&target);

                let result = async {
                    self.encryptor
                        .encrypt(&contents, &pair.public_key, &temp)
                        .await?;
                    restrict_to_owner(&temp)
                        .await
                        .map_err(|e| StoreError::io(format!("restrict {}", temp.display()), e))?;
                    replace(&temp, &target)
                        .await
                        .map_err(|e| StoreError::io(format!("replace {}", target.display()), e))
                }
                .await;

                if result.is_err() {
                    discard(&temp).await;
                }
                result?;
            }
            None => write_atomic(&target, contents.expose()).await?,
        }

        debug!("Saved {} workspaces to {:?}", map.len(), target);
        Ok(target)
    }

    /// [`save`](Self::save), then remove the other format's file so only
    /// one credential artifact exists
    ///
    /// If the other file cannot be removed and the written file is new, the
    /// written file is removed again so the previous artifact stays the one
    /// that gets loaded.
    pub async fn save_with_cleanup(&self, map: &CredentialMap, key: Option<&SshKeyPair>) -> Result<()> {
        let created = !tokio::fs::try_exists(self.target(key)).await.unwrap_or(false);
        let written = self.save(map, key).await?;
        let stale = self.stale(key);

        match tokio::fs::remove_file(&stale).await {
            Ok(()) => {
                info!("Removed {:?} after writing {:?}", stale, written);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Could not remove stale {:?}: {}", stale, e);
                if created {
                    discard(&written).await;
                }
                Err(StoreError::io(
                    format!(
                        "remove {} after writing {}",
                        stale.display(),
                        written.display()
                    ),
                    e,
                ))
            }
        }
    }
}
