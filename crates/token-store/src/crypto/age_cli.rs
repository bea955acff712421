//! age command-line backend
//!
//! Shells out to the `age` binary. SSH public keys are accepted as
//! recipients (`-R`) and SSH private keys as identities (`-i`), so no key
//! conversion is needed. Every invocation is bounded by a timeout.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::EncryptionBackend;
use crate::error::{Result, StoreError};

/// Default binary looked up on `PATH`
pub const DEFAULT_AGE_BINARY: &str = "age";

/// Default per-invocation timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the `--version` availability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// age CLI encryption backend
#[derive(Debug, Clone)]
pub struct AgeCli {
    binary: PathBuf,
    timeout: Duration,
}

impl AgeCli {
    /// Create a backend using `age` from `PATH`
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_AGE_BINARY),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a specific age binary
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.kill_on_drop(true);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command
    }

    /// Run a prepared command, feeding `stdin` if given, under the timeout
    async fn run(&self, mut command: Command, stdin: Option<&[u8]>, timeout: Duration) -> Result<Output> {
        command.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command.spawn().map_err(|e| {
            StoreError::Encryption(format!(
                "failed to run '{}': {}",
                self.binary.display(),
                e
            ))
        })?;

        let input = stdin.map(|bytes| (child.stdin.take(), bytes));

        let exchange = async move {
            // age may exit before reading its input; its status and stderr
            // then say more than the broken pipe does
            let mut write_error = None;
            if let Some((Some(mut pipe), bytes)) = input {
                let written = async {
                    pipe.write_all(bytes).await?;
                    pipe.shutdown().await
                }
                .await;
                drop(pipe);
                write_error = written.err();
            }

            let output = child.wait_with_output().await?;
            match write_error {
                Some(e) if output.status.success() => Err(e),
                _ => Ok(output),
            }
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| {
                warn!("age invocation timed out after {:?}", timeout);
                StoreError::Encryption(format!("age timed out after {:?}", timeout))
            })?
            .map_err(|e| StoreError::Encryption(format!("age process failed: {}", e)))
    }
}

impl Default for AgeCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Summarise a failed invocation for an error message
fn failure_summary(output: &Output) -> String {
    let status = output
        .status
        .code()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exit status {}", status)
    } else {
        format!("exit status {}: {}", status, stderr)
    }
}

#[async_trait]
impl EncryptionBackend for AgeCli {
    async fn available(&self) -> bool {
        let mut command = self.command();
        command.arg("--version");

        match self.run(command, None, PROBE_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                debug!(
                    "age available: {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
                true
            }
            Ok(output) => {
                debug!("age --version failed: {}", failure_summary(&output));
                false
            }
            Err(e) => {
                debug!("age not available: {}", e);
                false
            }
        }
    }

    async fn encrypt(&self, plaintext: &[u8], recipient_file: &Path, output: &Path) -> Result<()> {
        let mut command = self.command();
        command
            .arg("-R")
            .arg(recipient_file)
            .arg("-o")
            .arg(output);

        let result = self.run(command, Some(plaintext), self.timeout).await?;
        if !result.status.success() {
            return Err(StoreError::Encryption(format!(
                "age encryption failed ({})",
                failure_summary(&result)
            )));
        }

        debug!("Encrypted {} bytes to {:?}", plaintext.len(), output);
        Ok(())
    }

    async fn decrypt(&self, input: &Path, identity_file: &Path) -> Result<Vec<u8>> {
        let mut command = self.command();
        command.arg("-d").arg("-i").arg(identity_file).arg(input);

        let result = self.run(command, None, self.timeout).await?;
        if !result.status.success() {
            return Err(StoreError::Encryption(format!(
                "age decryption failed ({})",
                failure_summary(&result)
            )));
        }

        debug!("Decrypted {:?}", input);
        Ok(result.stdout)
    }

    fn backend_name(&self) -> &'static str {
        "age CLI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn missing_binary() -> AgeCli {
        AgeCli::new().with_binary("/nonexistent/definitely-not-age")
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        assert!(!missing_binary().available().await);
    }

    #[tokio::test]
    async fn test_missing_binary_encrypt_is_encryption_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = missing_binary()
            .encrypt(
                b"{}",
                &temp_dir.path().join("id.pub"),
                &temp_dir.path().join("out.age"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Encryption);
        assert!(!temp_dir.path().join("out.age").exists());
    }

    /// Write an executable shell script standing in for the age binary
    #[cfg(unix)]
    fn fake_binary(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("age");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_binary_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let backend = AgeCli::new()
            .with_binary(fake_binary(temp_dir.path(), "sleep 10"))
            .with_timeout(Duration::from_millis(300));

        let started = std::time::Instant::now();
        let err = backend
            .decrypt(&temp_dir.path().join("tokens.age"), &temp_dir.path().join("id"))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(err.kind(), ErrorKind::Encryption);
        assert!(err.to_string().contains("timed out after 300ms"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_reports_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let backend = AgeCli::new().with_binary(fake_binary(
            temp_dir.path(),
            "echo 'age: error: malformed recipient' >&2\nexit 1",
        ));
        // Larger than a pipe buffer, so the write fails once age has exited
        let plaintext = vec![b'x'; 1 << 20];

        let err = backend
            .encrypt(
                &plaintext,
                &temp_dir.path().join("id.pub"),
                &temp_dir.path().join("out.age"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Encryption);
        assert!(err.to_string().contains("malformed recipient"));
    }

    #[test]
    fn test_builder() {
        let backend = AgeCli::new()
            .with_binary("/usr/local/bin/age")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(backend.binary(), Path::new("/usr/local/bin/age"));
        assert_eq!(backend.timeout, Duration::from_secs(3));
        assert_eq!(backend.backend_name(), "age CLI");
    }
}
