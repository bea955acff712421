//! Per-call interaction context
//!
//! Operations that may need to ask the user something (a public key that is
//! not next to its private key, a decryption key that was never configured)
//! or report progress take an `&dyn Interaction` argument for the duration
//! of that call.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Prompts and notices surfaced to whoever drives an operation
pub trait Interaction: Send + Sync {
    /// Ask for the public key matching `private_key`, when `<private_key>.pub`
    /// does not exist. `None` means the user gave up.
    fn prompt_for_public_key(&self, private_key: &Path) -> Option<PathBuf>;

    /// Ask for the private key that decrypts the existing encrypted tokens
    fn prompt_for_decryption_key(&self) -> Option<PathBuf>;

    /// Progress message
    fn info(&self, message: &str);

    /// Something the user should know about but that did not fail the call
    fn warn(&self, message: &str);
}

/// Interaction that never prompts and routes notices to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Interaction for NonInteractive {
    fn prompt_for_public_key(&self, _private_key: &Path) -> Option<PathBuf> {
        None
    }

    fn prompt_for_decryption_key(&self) -> Option<PathBuf> {
        None
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}
