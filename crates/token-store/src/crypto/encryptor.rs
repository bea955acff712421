//! SSH-key validation and encryption front end
//!
//! `Encryptor` sits between the credential files and an
//! [`EncryptionBackend`]. It checks key files before the backend sees them
//! and turns backend failures into messages that name the key involved.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::{EncryptionBackend, SecretBytes};
use crate::error::{Result, StoreError};
use crate::interaction::Interaction;

/// SSH key types age can encrypt to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SshKeyType {
    Rsa,
    Ed25519,
}

impl SshKeyType {
    pub const SUPPORTED: [SshKeyType; 2] = [SshKeyType::Rsa, SshKeyType::Ed25519];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "ssh-rsa",
            Self::Ed25519 => "ssh-ed25519",
        }
    }

    /// Comma-separated list for error messages
    pub fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Read the key type from the first field of an OpenSSH public key line
    pub fn from_public_key(contents: &str) -> Result<Self> {
        let field = contents.split_whitespace().next().unwrap_or("");
        field.parse()
    }
}

impl FromStr for SshKeyType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ssh-rsa" => Ok(Self::Rsa),
            "ssh-ed25519" => Ok(Self::Ed25519),
            other => {
                let shown = if other.is_empty() { "(empty)" } else { other };
                Err(StoreError::Encryption(format!(
                    "Unsupported SSH key type: {} (supports: {})",
                    shown,
                    Self::supported_list()
                )))
            }
        }
    }
}

impl fmt::Display for SshKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A private key and the public key it was validated against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyPair {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl SshKeyPair {
    /// Pair a private key with `<private_key>.pub`
    pub fn conventional(private_key: &Path) -> Self {
        Self {
            private_key: private_key.to_path_buf(),
            public_key: public_key_path(private_key),
        }
    }

    /// Whether the public key lives at the conventional location
    pub fn is_conventional(&self) -> bool {
        self.public_key == public_key_path(&self.private_key)
    }
}

/// `<private_key>.pub`
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut path: OsString = private_key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Key-aware wrapper around an encryption backend
#[derive(Clone)]
pub struct Encryptor {
    backend: Arc<dyn EncryptionBackend>,
}

impl Encryptor {
    pub fn new(backend: Arc<dyn EncryptionBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Whether the encryption capability is present
    pub async fn available(&self) -> bool {
        self.backend.available().await
    }

    async fn require_available(&self) -> Result<()> {
        if self.backend.available().await {
            Ok(())
        } else {
            Err(StoreError::Encryption(format!(
                "{} is not available; install age (https://age-encryption.org) to use encrypted tokens",
                self.backend.backend_name()
            )))
        }
    }

    /// Check that `private_key` is usable for token encryption
    ///
    /// The public key is looked up at `<private_key>.pub`, falling back to
    /// `interaction.prompt_for_public_key`. The key type must be one of
    /// [`SshKeyType::SUPPORTED`]. When the backend is available the pair is
    /// also checked by round-tripping a random probe through it.
    pub async fn validate_key_type(
        &self,
        private_key: &Path,
        interaction: &dyn Interaction,
    ) -> Result<SshKeyPair> {
        if !file_exists(private_key).await {
            return Err(StoreError::Encryption(format!(
                "Private key not found: {}",
                private_key.display()
            )));
        }

        let mut pair = SshKeyPair::conventional(private_key);
        if !file_exists(&pair.public_key).await {
            debug!("No public key at {:?}, asking", pair.public_key);
            match interaction.prompt_for_public_key(private_key) {
                Some(path) if file_exists(&path).await => pair.public_key = path,
                _ => {
                    return Err(StoreError::Encryption(format!(
                        "Public key not found: {}",
                        pair.public_key.display()
                    )))
                }
            }
        }

        let contents = tokio::fs::read(&pair.public_key)
            .await
            .map_err(|e| StoreError::io(format!("read public key {}", pair.public_key.display()), e))?;
        let key_type = SshKeyType::from_public_key(&String::from_utf8_lossy(&contents))?;
        debug!("Public key {:?} is {}", pair.public_key, key_type);

        if self.backend.available().await {
            self.verify_pair(&pair).await?;
        } else {
            debug!("Skipping key pair verification: backend unavailable");
        }

        info!("Validated {} key {:?}", key_type, pair.private_key);
        Ok(pair)
    }

    /// Encrypt a random probe to the public key and decrypt it with the private key
    async fn verify_pair(&self, pair: &SshKeyPair) -> Result<()> {
        let probe = Uuid::new_v4().to_string();
        let probe_path = std::env::temp_dir().join(format!(".token-store-probe-{}.age", Uuid::new_v4()));

        let outcome = async {
            self.backend
                .encrypt(probe.as_bytes(), &pair.public_key, &probe_path)
                .await?;
            self.backend.decrypt(&probe_path, &pair.private_key).await
        }
        .await;

        let _ = tokio::fs::remove_file(&probe_path).await;

        match outcome {
            Ok(decrypted) if decrypted == probe.as_bytes() => Ok(()),
            Ok(_) | Err(_) => Err(StoreError::Encryption(format!(
                "Public key does not match private key: {} / {}",
                pair.public_key.display(),
                pair.private_key.display()
            ))),
        }
    }

    /// Encrypt `plaintext` to `public_key`, writing the ciphertext to `output`
    pub async fn encrypt(&self, plaintext: &SecretBytes, public_key: &Path, output: &Path) -> Result<()> {
        self.require_available().await?;

        if !file_exists(public_key).await {
            return Err(StoreError::Encryption(format!(
                "Public key not found: {}",
                public_key.display()
            )));
        }

        self.backend.encrypt(plaintext.expose(), public_key, output).await
    }

    /// Decrypt `encrypted` with `private_key`
    ///
    /// Returns `Ok(None)` when `encrypted` does not exist.
    pub async fn decrypt(&self, encrypted: &Path, private_key: &Path) -> Result<Option<SecretBytes>> {
        if !file_exists(encrypted).await {
            return Ok(None);
        }

        self.require_available().await?;

        if !file_exists(private_key).await {
            return Err(StoreError::Encryption(format!(
                "Private key not found: {}",
                private_key.display()
            )));
        }

        match self.backend.decrypt(encrypted, private_key).await {
            Ok(plaintext) => Ok(Some(SecretBytes::new(plaintext))),
            Err(e) => Err(StoreError::Encryption(format!(
                "Failed to decrypt {} with {} (wrong key or corrupted file): {}",
                encrypted.display(),
                private_key.display(),
                e
            ))),
        }
    }
}

impl fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryptor")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}
