//! Deterministic stand-ins for the age binary and SSH keys

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::crypto::{public_key_path, EncryptionBackend};
use crate::error::{Result, StoreError};
use crate::interaction::Interaction;

const PRIVATE_MARKER: &str = "FAKE-PRIVATE";
const HEADER_MARKER: &str = "FAKE-AGE";

/// Write a fake private key whose identity is `name`
pub fn write_private_key(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("{} {}\n", PRIVATE_MARKER, name)).unwrap();
    path
}

/// Write a fake private key plus `<name>.pub` of the given type
pub fn write_key_pair(dir: &Path, name: &str, key_type: &str) -> PathBuf {
    let path = write_private_key(dir, name);
    std::fs::write(
        public_key_path(&path),
        format!("{} {} test@host\n", key_type, name),
    )
    .unwrap();
    path
}

/// Backend with age-like behaviour: ciphertext is bound to one identity and
/// is not readable as plaintext
pub struct FakeAge {
    available: AtomicBool,
    /// Index of the first encrypt call that fails
    fail_from: AtomicUsize,
    encrypt_calls: AtomicUsize,
}

impl FakeAge {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            fail_from: AtomicUsize::new(usize::MAX),
            encrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every encryption fail after writing a partial output file
    pub fn set_fail_encrypt(&self, fail: bool) {
        let from = if fail { 0 } else { usize::MAX };
        self.fail_from.store(from, Ordering::SeqCst);
    }

    /// Let the next `n` encryptions succeed and fail the rest
    pub fn fail_encrypt_after(&self, n: usize) {
        self.fail_from.store(self.encrypt_calls() + n, Ordering::SeqCst);
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }
}

fn second_field(contents: &str) -> Option<String> {
    contents.split_whitespace().nth(1).map(str::to_string)
}

#[async_trait]
impl EncryptionBackend for FakeAge {
    async fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn encrypt(&self, plaintext: &[u8], recipient_file: &Path, output: &Path) -> Result<()> {
        let index = self.encrypt_calls.fetch_add(1, Ordering::SeqCst);

        if index >= self.fail_from.load(Ordering::SeqCst) {
            std::fs::write(output, b"partial").unwrap();
            return Err(StoreError::Encryption("simulated encryption failure".to_string()));
        }

        let recipient = std::fs::read_to_string(recipient_file)
            .map_err(|e| StoreError::Encryption(e.to_string()))?;
        let id = second_field(&recipient)
            .ok_or_else(|| StoreError::Encryption("malformed recipient".to_string()))?;

        let mut body = format!("{} {}\n", HEADER_MARKER, id).into_bytes();
        body.extend(plaintext.iter().rev());
        std::fs::write(output, body).map_err(|e| StoreError::Encryption(e.to_string()))
    }

    async fn decrypt(&self, input: &Path, identity_file: &Path) -> Result<Vec<u8>> {
        let identity = std::fs::read_to_string(identity_file)
            .map_err(|e| StoreError::Encryption(e.to_string()))?;
        if !identity.starts_with(PRIVATE_MARKER) {
            return Err(StoreError::Encryption("unsupported identity".to_string()));
        }
        let id = second_field(&identity).unwrap_or_default();

        let data = std::fs::read(input).map_err(|e| StoreError::Encryption(e.to_string()))?;
        let split = data
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| StoreError::Encryption("invalid header".to_string()))?;
        let header = String::from_utf8_lossy(&data[..split]);
        if header != format!("{} {}", HEADER_MARKER, id) {
            return Err(StoreError::Encryption(
                "no identity matched any of the recipients".to_string(),
            ));
        }

        Ok(data[split + 1..].iter().rev().copied().collect())
    }

    fn backend_name(&self) -> &'static str {
        "fake age"
    }
}

/// Answers the public key prompt with a fixed path
pub struct FixedPublicKey(pub PathBuf);

impl Interaction for FixedPublicKey {
    fn prompt_for_public_key(&self, _private_key: &Path) -> Option<PathBuf> {
        Some(self.0.clone())
    }

    fn prompt_for_decryption_key(&self) -> Option<PathBuf> {
        None
    }

    fn info(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}
}

/// Answers the decryption key prompt and records notices
#[derive(Default)]
pub struct Scripted {
    pub decryption_key: Option<PathBuf>,
    pub notices: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn with_decryption_key(path: PathBuf) -> Self {
        Self {
            decryption_key: Some(path),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl Interaction for Scripted {
    fn prompt_for_public_key(&self, _private_key: &Path) -> Option<PathBuf> {
        None
    }

    fn prompt_for_decryption_key(&self) -> Option<PathBuf> {
        self.decryption_key.clone()
    }

    fn info(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.notices.lock().unwrap().push(format!("warning: {}", message));
    }
}
