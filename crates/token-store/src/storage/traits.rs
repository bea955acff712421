//! Storage trait definitions

use std::path::PathBuf;

use crate::error::Result;

/// Location of the files this crate persists
pub trait ConfigPaths: Send + Sync {
    /// Full path of a file inside the configuration directory
    fn config_file(&self, name: &str) -> PathBuf;

    /// Create the configuration directory if it does not exist yet
    fn ensure_config_dir(&self) -> Result<()>;
}
