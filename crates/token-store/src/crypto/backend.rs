//! Encryption backend trait definitions

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Public-key encryption capability with age semantics
///
/// Recipients and identities are referenced by file so that SSH keys can be
/// used directly. Implementations may shell out to a tool or use a library.
#[async_trait]
pub trait EncryptionBackend: Send + Sync {
    /// Check whether the capability can be used right now
    async fn available(&self) -> bool;

    /// Encrypt `plaintext` to the public key in `recipient_file`, writing the
    /// ciphertext to `output`
    async fn encrypt(&self, plaintext: &[u8], recipient_file: &Path, output: &Path) -> Result<()>;

    /// Decrypt the file at `input` with the private key in `identity_file`
    async fn decrypt(&self, input: &Path, identity_file: &Path) -> Result<Vec<u8>>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}
