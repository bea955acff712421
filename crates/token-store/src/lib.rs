//! # token-store
//!
//! Per-workspace Slack credential storage for slack-cli including:
//! - Plaintext (`tokens.json`, owner-only) or age-encrypted (`tokens.age`) persistence
//! - SSH key validation and encryption through the age CLI
//! - Atomic writes that never leave both formats or a partial file behind
//! - Key rotation that keeps the old file until the new one is written

pub mod credential;
pub mod crypto;
pub mod error;
pub mod interaction;
pub mod key_manager;
pub mod settings;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use credential::{Credential, CredentialMap, CredentialStore, TokenKind};
pub use crypto::{AgeCli, EncryptionBackend, Encryptor, SecretBytes, SshKeyPair, SshKeyType};
pub use error::{ErrorKind, Result, StoreError};
pub use interaction::{Interaction, NonInteractive};
pub use key_manager::{FailureCategory, KeyChangeOutcome, KeyManager};
pub use settings::{KeySetting, Settings, SettingsManager};
pub use storage::{ArtifactState, ConfigDir, ConfigPaths, CredentialLoader, CredentialSaver};
