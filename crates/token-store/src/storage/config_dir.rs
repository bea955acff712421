//! Filesystem configuration directory

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use tracing::debug;

use super::ConfigPaths;
use crate::error::{Result, StoreError};

/// Configuration directory on the local filesystem
#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    /// Use the platform configuration directory for slack-cli
    pub fn new() -> Result<Self> {
        let root = ProjectDirs::from("", "", "slack-cli")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| StoreError::TokenStore("Could not determine config directory".to_string()))?;

        debug!("Config directory: {:?}", root);
        Ok(Self { root })
    }

    /// Use a custom directory (tests, `--config-dir`)
    pub fn with_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ConfigPaths for ConfigDir {
    fn config_file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn ensure_config_dir(&self) -> Result<()> {
        if self.root.is_dir() {
            return Ok(());
        }

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        builder
            .create(&self.root)
            .map_err(|e| StoreError::io(format!("create config directory {}", self.root.display()), e))?;

        debug!("Created config directory {:?}", self.root);
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix("~/") {
        Some(rest) => rest,
        None if path == "~" => "",
        None => return PathBuf::from(path),
    };

    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => PathBuf::from(path),
    }
}
