//! Error types for token-store

use std::io;

use thiserror::Error;

/// Result type alias for token store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Coarse classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Capability missing, bad key, or failed decryption
    Encryption,
    /// I/O failure or a damaged/vanished credential artifact
    TokenStore,
    /// Caller supplied an invalid name, token, or cookie
    Argument,
    /// Lookup of a workspace that was never added
    WorkspaceNotFound,
}

/// Token store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Token store error: {0}")]
    TokenStore(String),

    #[error("Failed to {action}: {source}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),
}

impl StoreError {
    /// Wrap an I/O error with a short description of what was being attempted
    pub fn io(action: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            action: action.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encryption(_) => ErrorKind::Encryption,
            Self::TokenStore(_) | Self::Io { .. } => ErrorKind::TokenStore,
            Self::InvalidArgument(_) => ErrorKind::Argument,
            Self::WorkspaceNotFound(_) => ErrorKind::WorkspaceNotFound,
        }
    }

    /// The underlying filesystem error, if this failure came from one
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}
