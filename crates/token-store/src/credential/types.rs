//! Credential type definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::token::TokenKind;

/// All persisted credentials, keyed by workspace name
pub type CredentialMap = BTreeMap<String, Credential>;

/// Token (and session cookie, when the token scheme needs one) for one
/// workspace - automatically zeroed when dropped
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    /// API token, e.g. `xoxb-...`
    token: String,

    /// Browser session cookie (`d` cookie value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cookie: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, cookie: Option<String>) -> Self {
        Self {
            token: token.into(),
            cookie,
        }
    }

    /// Get the token (use carefully)
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Scheme of the stored token, if it is a recognized one
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_token(&self.token)
    }

    /// Token shortened for display (e.g. `xoxb-123...`)
    pub fn masked_token(&self) -> String {
        let visible: String = self.token.chars().take(8).collect();
        format!("{}...", visible)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.kind().map(|k| k.prefix()).unwrap_or("[REDACTED]"))
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
