//! Encryption of the credential file under an SSH key
//!
//! This module provides:
//! - The `EncryptionBackend` seam over an age-compatible capability
//! - `AgeCli`, the backend that drives the `age` binary
//! - `Encryptor`, which validates SSH keys and wraps the backend
//! - Secure memory handling with zeroize

mod age_cli;
mod backend;
mod encryptor;
mod secure_memory;

pub use age_cli::{AgeCli, DEFAULT_AGE_BINARY, DEFAULT_TIMEOUT};
pub use backend::EncryptionBackend;
pub use encryptor::{public_key_path, Encryptor, SshKeyPair, SshKeyType};
pub use secure_memory::SecretBytes;
