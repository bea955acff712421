//! Credential persistence
//!
//! The credential map lives in a single configuration directory as exactly
//! one of:
//! 1. `tokens.json` - plaintext JSON, owner read/write only
//! 2. `tokens.age` - the same JSON encrypted to an SSH public key

mod atomic;
mod config_dir;
mod loader;
mod saver;
mod traits;

pub(crate) use atomic::write_atomic;
pub use config_dir::{expand_home, ConfigDir};
pub use loader::{ArtifactState, CredentialLoader};
pub use saver::CredentialSaver;
pub use traits::ConfigPaths;

/// Plaintext credential file name
pub const TOKENS_FILE: &str = "tokens.json";

/// Encrypted credential file name
pub const ENCRYPTED_TOKENS_FILE: &str = "tokens.age";
