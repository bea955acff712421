//! Write-to-temporary-then-rename helpers
//!
//! Temporary files are created next to their target so the final rename
//! stays on one filesystem.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Unique hidden sibling of `target`
pub(crate) fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Create `path` readable and writable by the owner only, and fill it
pub(crate) async fn write_owner_only(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}

/// Restrict an existing file to owner read/write
pub(crate) async fn restrict_to_owner(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Move `temp` over `target`
///
/// Falls back to copy + fsync + delete when the rename reports that the two
/// paths are on different devices.
pub(crate) async fn replace(temp: &Path, target: &Path) -> io::Result<()> {
    match tokio::fs::rename(temp, target).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!("Rename of {:?} crosses devices, copying instead", target);
            tokio::fs::copy(temp, target).await?;
            restrict_to_owner(target).await?;
            tokio::fs::OpenOptions::new()
                .write(true)
                .open(target)
                .await?
                .sync_all()
                .await?;
            tokio::fs::remove_file(temp).await
        }
        Err(e) => Err(e),
    }
}

/// Remove a temporary file, ignoring one that was never created
pub(crate) async fn discard(temp: &Path) {
    match tokio::fs::remove_file(temp).await {
        Ok(()) => debug!("Removed temporary file {:?}", temp),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove temporary file {:?}: {}", temp, e),
    }
}

/// Atomically replace `target` with `contents`, owner-only
pub(crate) async fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    let temp = temp_path_for(target);

    let result = async {
        write_owner_only(&temp, contents)
            .await
            .map_err(|e| StoreError::io(format!("write {}", temp.display()), e))?;
        replace(&temp, target)
            .await
            .map_err(|e| StoreError::io(format!("replace {}", target.display()), e))
    }
    .await;

    if result.is_err() {
        discard(&temp).await;
    }
    result
}
