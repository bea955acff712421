//! Reading the persisted credential map

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{ConfigPaths, ENCRYPTED_TOKENS_FILE, TOKENS_FILE};
use crate::credential::CredentialMap;
use crate::crypto::{Encryptor, SecretBytes};
use crate::error::{Result, StoreError};
use crate::settings::KeySetting;

/// Which credential artifact is on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Absent,
    Plaintext,
    Encrypted,
}

impl std::fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Absent => "none",
            Self::Plaintext => "plaintext",
            Self::Encrypted => "encrypted",
        })
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Loads the credential map from whichever artifact exists
#[derive(Clone)]
pub struct CredentialLoader {
    paths: Arc<dyn ConfigPaths>,
    encryptor: Encryptor,
}

impl CredentialLoader {
    pub fn new(paths: Arc<dyn ConfigPaths>, encryptor: Encryptor) -> Self {
        Self { paths, encryptor }
    }

    pub fn plaintext_path(&self) -> PathBuf {
        self.paths.config_file(TOKENS_FILE)
    }

    pub fn encrypted_path(&self) -> PathBuf {
        self.paths.config_file(ENCRYPTED_TOKENS_FILE)
    }

    pub async fn encrypted_exists(&self) -> bool {
        exists(&self.encrypted_path()).await
    }

    pub async fn plaintext_exists(&self) -> bool {
        exists(&self.plaintext_path()).await
    }

    pub async fn state(&self) -> ArtifactState {
        if self.encrypted_exists().await {
            ArtifactState::Encrypted
        } else if self.plaintext_exists().await {
            ArtifactState::Plaintext
        } else {
            ArtifactState::Absent
        }
    }

    /// Load the credential map, decrypting with `key` if it is encrypted
    ///
    /// Returns an empty map when nothing has been persisted yet. A damaged
    /// file is reported, never removed.
    pub async fn load(&self, key: Option<&Path>) -> Result<CredentialMap> {
        if self.encrypted_exists().await {
            if self.plaintext_exists().await {
                warn!(
                    "Both {:?} and {:?} exist; using the encrypted file",
                    self.encrypted_path(),
                    self.plaintext_path()
                );
            }

            let key = key.ok_or_else(|| {
                StoreError::Encryption("Cannot read encrypted tokens without SSH key".to_string())
            })?;
            return self.load_encrypted(key).await;
        }

        if self.plaintext_exists().await {
            return self.load_plaintext().await;
        }

        debug!("No credential file found");
        Ok(CredentialMap::new())
    }

    /// Like [`load`](Self::load), taking the key from the key setting
    pub async fn load_auto(&self, settings: &dyn KeySetting) -> Result<CredentialMap> {
        let key = settings.encryption_key();

        if key.is_none() && self.encrypted_exists().await {
            return Err(StoreError::Encryption(format!(
                "Tokens in {} are encrypted but no SSH key configured",
                self.encrypted_path().display()
            )));
        }

        self.load(key.as_deref()).await
    }

    async fn load_encrypted(&self, key: &Path) -> Result<CredentialMap> {
        let path = self.encrypted_path();

        let plaintext = self
            .encryptor
            .decrypt(&path, key)
            .await?
            .ok_or_else(|| disappeared(&path))?;

        let map = parse(&path, &plaintext)?;
        debug!("Loaded {} workspaces from {:?}", map.len(), path);
        Ok(map)
    }

    async fn load_plaintext(&self) -> Result<CredentialMap> {
        let path = self.plaintext_path();

        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => SecretBytes::new(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(disappeared(&path)),
            Err(e) => return Err(StoreError::io(format!("read {}", path.display()), e)),
        };

        let map = parse(&path, &contents)?;
        debug!("Loaded {} workspaces from {:?}", map.len(), path);
        Ok(map)
    }
}

fn disappeared(path: &Path) -> StoreError {
    StoreError::TokenStore(format!("{} disappeared unexpectedly", path.display()))
}

fn parse(path: &Path, contents: &SecretBytes) -> Result<CredentialMap> {
    serde_json::from_slice(contents.expose()).map_err(|e| {
        StoreError::TokenStore(format!(
            "{} is corrupted ({}); repair or remove it manually",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::crypto::{public_key_path, EncryptionBackend};
    use crate::error::ErrorKind;
    use crate::settings::SettingsManager;
    use crate::storage::ConfigDir;
    use crate::test_support::{write_key_pair, FakeAge};
    use tempfile::TempDir;

    fn loader(dir: &Path) -> CredentialLoader {
        CredentialLoader::new(
            Arc::new(ConfigDir::with_dir(dir)),
            Encryptor::new(Arc::new(FakeAge::new())),
        )
    }

    #[tokio::test]
    async fn test_load_nothing_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let loader = loader(temp_dir.path());

        assert_eq!(loader.state().await, ArtifactState::Absent);
        assert!(loader.load(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_plaintext() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(TOKENS_FILE),
            r#"{"w":{"token":"xoxb-t"}}"#,
        )
        .unwrap();
        let loader = loader(temp_dir.path());

        assert_eq!(loader.state().await, ArtifactState::Plaintext);
        let map = loader.load(None).await.unwrap();
        assert_eq!(map["w"], Credential::new("xoxb-t", None));
    }

    #[tokio::test]
    async fn test_corrupted_plaintext_is_reported_and_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(TOKENS_FILE);
        std::fs::write(&path, "not valid json{").unwrap();
        let loader = loader(temp_dir.path());

        let err = loader.load(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenStore);
        assert!(err.to_string().contains("corrupted"));

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not valid json{");
    }

    #[tokio::test]
    async fn test_encrypted_without_key() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(ENCRYPTED_TOKENS_FILE), b"ciphertext").unwrap();
        let loader = loader(temp_dir.path());

        let err = loader.load(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encryption);
        assert!(err.to_string().contains("SSH key"));
    }

    #[tokio::test]
    async fn test_load_auto_reports_unconfigured_key() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(ENCRYPTED_TOKENS_FILE), b"ciphertext").unwrap();
        let loader = loader(temp_dir.path());
        let settings = SettingsManager::new(temp_dir.path()).unwrap();

        let err = loader.load_auto(&settings).await.unwrap_err();
        assert!(err.to_string().contains("no SSH key configured"));
    }

    #[tokio::test]
    async fn test_load_encrypted() {
        let temp_dir = TempDir::new().unwrap();
        let key = write_key_pair(temp_dir.path(), "id_ed25519", "ssh-ed25519");
        let loader = loader(temp_dir.path());

        FakeAge::new()
            .encrypt(
                br#"{"w":{"token":"xoxb-t"}}"#,
                &public_key_path(&key),
                &loader.encrypted_path(),
            )
            .await
            .unwrap();

        assert_eq!(loader.state().await, ArtifactState::Encrypted);
        let map = loader.load(Some(&key)).await.unwrap();
        assert_eq!(map["w"].token(), "xoxb-t");
    }

    #[tokio::test]
    async fn test_corrupted_encrypted_payload_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let key = write_key_pair(temp_dir.path(), "id_ed25519", "ssh-ed25519");
        let loader = loader(temp_dir.path());

        FakeAge::new()
            .encrypt(b"[1, 2", &public_key_path(&key), &loader.encrypted_path())
            .await
            .unwrap();

        let err = loader.load(Some(&key)).await.unwrap_err();
        assert!(err.to_string().contains("corrupted"));
        assert!(loader.encrypted_exists().await);
    }

    #[tokio::test]
    async fn test_vanished_artifacts_are_reported() {
        let temp_dir = TempDir::new().unwrap();
        let key = write_key_pair(temp_dir.path(), "id_ed25519", "ssh-ed25519");
        let loader = loader(temp_dir.path());

        // Both files went away after the existence check in `load`
        let err = loader.load_plaintext().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenStore);
        assert!(err.to_string().contains("disappeared unexpectedly"));
        assert!(err.to_string().contains(TOKENS_FILE));

        let err = loader.load_encrypted(&key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenStore);
        assert!(err.to_string().contains("disappeared unexpectedly"));
        assert!(err.to_string().contains(ENCRYPTED_TOKENS_FILE));
    }
}
