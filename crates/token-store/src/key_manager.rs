//! Setting, rotating and clearing the token encryption key
//!
//! `KeyManager` keeps the key setting and the credential file in step:
//! the file is migrated first and the setting only changes once that
//! succeeded. Failures come back as a [`KeyChangeOutcome`] with a
//! user-facing message instead of an error.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::credential::CredentialStore;
use crate::crypto::SshKeyPair;
use crate::error::StoreError;
use crate::interaction::Interaction;
use crate::settings::KeySetting;
use crate::storage::{expand_home, ArtifactState};

/// Why a key change failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Encryption,
    InvalidArgument,
    NotFound,
    PermissionDenied,
    DiskFull,
    QuotaExceeded,
    ReadOnlyFilesystem,
    Storage,
}

/// Result of a key change, ready to show to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyChangeOutcome {
    Success {
        message: String,
    },
    Failure {
        category: FailureCategory,
        error: String,
    },
}

impl KeyChangeOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    fn failure(category: FailureCategory, error: impl Into<String>) -> Self {
        Self::Failure {
            category,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The success message or the error text
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message } => message,
            Self::Failure { error, .. } => error,
        }
    }

    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { category, .. } => Some(*category),
        }
    }
}

/// Turn a store error into a categorized failure
pub fn categorize(err: &StoreError) -> KeyChangeOutcome {
    let io_category = err.io_kind().map(|kind| match kind {
        io::ErrorKind::NotFound => (FailureCategory::NotFound, "File not found"),
        io::ErrorKind::PermissionDenied => (
            FailureCategory::PermissionDenied,
            "Permission denied; check the permissions of the config directory",
        ),
        io::ErrorKind::StorageFull => (
            FailureCategory::DiskFull,
            "Disk full; free some space and try again",
        ),
        io::ErrorKind::QuotaExceeded => (
            FailureCategory::QuotaExceeded,
            "Disk quota exceeded; free some space and try again",
        ),
        io::ErrorKind::ReadOnlyFilesystem => (
            FailureCategory::ReadOnlyFilesystem,
            "The config directory is on a read-only filesystem",
        ),
        _ => (FailureCategory::Storage, "Could not update the token store"),
    });

    match (err, io_category) {
        (_, Some((category, summary))) => {
            KeyChangeOutcome::failure(category, format!("{} ({})", summary, err))
        }
        (StoreError::Encryption(message), None) => {
            KeyChangeOutcome::failure(FailureCategory::Encryption, message.clone())
        }
        (StoreError::InvalidArgument(message), None) => {
            KeyChangeOutcome::failure(FailureCategory::InvalidArgument, message.clone())
        }
        (_, None) => KeyChangeOutcome::failure(FailureCategory::Storage, err.to_string()),
    }
}

/// Coordinates the key setting with the credential store
pub struct KeyManager<'a, S: KeySetting> {
    store: &'a CredentialStore,
    settings: &'a mut S,
}

impl<'a, S: KeySetting> KeyManager<'a, S> {
    pub fn new(store: &'a CredentialStore, settings: &'a mut S) -> Self {
        Self { store, settings }
    }

    /// Encrypt tokens with the private key at `new_path`
    ///
    /// An empty path clears the key, as [`unset`](Self::unset) does.
    pub async fn set(&mut self, new_path: &str, interaction: &dyn Interaction) -> KeyChangeOutcome {
        let new_path = new_path.trim();
        if new_path.ends_with(".pub") {
            return KeyChangeOutcome::failure(
                FailureCategory::InvalidArgument,
                "Please provide the private key path, not the public key (.pub)",
            );
        }
        if new_path.is_empty() {
            return self.unset(interaction).await;
        }

        let new_key = expand_home(new_path);
        let current = self.settings.encryption_key_pair();
        let had_tokens = self.store.artifact_state().await != ArtifactState::Absent;

        let pair = match self
            .store
            .migrate_encryption(private_key(&current), Some(&new_key), interaction)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Setting SSH key failed: {}", e);
                return categorize(&e);
            }
        };

        if let Err(outcome) = self.commit(pair.clone(), current, interaction).await {
            return outcome;
        }

        if let Some(pair) = pair.filter(|p| !p.is_conventional()) {
            interaction.info(&format!("Using public key {}", pair.public_key.display()));
        }

        info!("SSH key set to {:?}", new_key);
        if had_tokens {
            KeyChangeOutcome::success(format!("Tokens are now encrypted with {}", new_key.display()))
        } else {
            KeyChangeOutcome::success(format!(
                "SSH key set to {}; tokens will be encrypted when saved",
                new_key.display()
            ))
        }
    }

    /// Stop encrypting tokens, decrypting the current file to plaintext
    ///
    /// When the setting is empty but an encrypted file exists, the key that
    /// decrypts it is asked for.
    pub async fn unset(&mut self, interaction: &dyn Interaction) -> KeyChangeOutcome {
        let configured = self.settings.encryption_key_pair();
        let encrypted = self.store.loader().encrypted_exists().await;

        let resolved = match &configured {
            Some(pair) => Some(pair.private_key.clone()),
            None if encrypted => {
                interaction.warn("Tokens are encrypted but no SSH key is configured");
                match interaction.prompt_for_decryption_key() {
                    Some(path) => Some(expand_home(&path.to_string_lossy())),
                    None => {
                        return KeyChangeOutcome::failure(
                            FailureCategory::Encryption,
                            "The SSH key that encrypted your tokens is required to decrypt them",
                        )
                    }
                }
            }
            None => {
                return KeyChangeOutcome::success(
                    "No SSH key configured; tokens are already stored in plaintext",
                )
            }
        };

        if let Err(e) = self
            .store
            .migrate_encryption(resolved.as_deref(), None, interaction)
            .await
        {
            warn!("Removing SSH key failed: {}", e);
            return categorize(&e);
        }

        if configured.is_some() {
            if let Err(outcome) = self.commit(None, configured, interaction).await {
                return outcome;
            }
        }

        info!("SSH key removed");
        KeyChangeOutcome::success("SSH key removed; tokens are now stored in plaintext")
    }

    /// Persist the new key setting, putting the tokens back under
    /// `previous` if that fails
    async fn commit(
        &mut self,
        new_key: Option<SshKeyPair>,
        previous: Option<SshKeyPair>,
        interaction: &dyn Interaction,
    ) -> Result<(), KeyChangeOutcome> {
        let err = match self.settings.set_encryption_key(new_key.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        error!("Could not save key setting: {}", err);

        let known = KnownPublicKey {
            public_key: previous.as_ref().map(|pair| pair.public_key.clone()),
            inner: interaction,
        };
        let restored = self
            .store
            .migrate_encryption(private_key(&new_key), private_key(&previous), &known)
            .await;

        let mut outcome = categorize(&err);
        if let KeyChangeOutcome::Failure { error, .. } = &mut outcome {
            match restored {
                Ok(_) => error.push_str("; tokens were restored to the previous key setting"),
                Err(e) => {
                    error!("Could not restore tokens: {}", e);
                    interaction.warn(&format!(
                        "Tokens remain stored for {}",
                        new_key
                            .as_ref()
                            .map(|pair| pair.private_key.display().to_string())
                            .unwrap_or_else(|| "plaintext".to_string())
                    ));
                }
            }
        }
        Err(outcome)
    }
}

fn private_key(pair: &Option<SshKeyPair>) -> Option<&Path> {
    pair.as_ref().map(|pair| pair.private_key.as_path())
}

/// Answers the public key prompt with a key validated earlier
struct KnownPublicKey<'a> {
    public_key: Option<PathBuf>,
    inner: &'a dyn Interaction,
}

impl Interaction for KnownPublicKey<'_> {
    fn prompt_for_public_key(&self, private_key: &Path) -> Option<PathBuf> {
        self.public_key
            .clone()
            .or_else(|| self.inner.prompt_for_public_key(private_key))
    }

    fn prompt_for_decryption_key(&self) -> Option<PathBuf> {
        self.inner.prompt_for_decryption_key()
    }

    fn info(&self, message: &str) {
        self.inner.info(message);
    }

    fn warn(&self, message: &str) {
        self.inner.warn(message);
    }
}
