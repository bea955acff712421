//! Workspace credential management

mod store;
mod token;
mod types;

pub use store::CredentialStore;
pub use token::{normalize_cookie, TokenKind};
pub use types::{Credential, CredentialMap};
