//! Slack token schemes

use serde::{Deserialize, Serialize};

/// Scheme of a Slack API token, identified by its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Bot token (`xoxb-`)
    Bot,
    /// User token (`xoxp-`)
    User,
    /// Browser session token (`xoxc-`), only valid with its `d` cookie
    Browser,
    /// Legacy session token (`xoxs-`)
    Session,
    /// Workspace app token (`xoxa-`)
    App,
    /// Rotating bot token (`xoxe.xoxb-`)
    RotatingBot,
    /// Rotating user token (`xoxe.xoxp-`)
    RotatingUser,
}

impl TokenKind {
    pub const ALL: [TokenKind; 7] = [
        TokenKind::Bot,
        TokenKind::User,
        TokenKind::Browser,
        TokenKind::Session,
        TokenKind::App,
        TokenKind::RotatingBot,
        TokenKind::RotatingUser,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Bot => "xoxb-",
            Self::User => "xoxp-",
            Self::Browser => "xoxc-",
            Self::Session => "xoxs-",
            Self::App => "xoxa-",
            Self::RotatingBot => "xoxe.xoxb-",
            Self::RotatingUser => "xoxe.xoxp-",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::User => "user",
            Self::Browser => "browser session",
            Self::Session => "session",
            Self::App => "app",
            Self::RotatingBot => "rotating bot",
            Self::RotatingUser => "rotating user",
        }
    }

    /// Browser session tokens are rejected by the API without the cookie
    pub fn requires_cookie(&self) -> bool {
        matches!(self, Self::Browser)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| token.starts_with(kind.prefix()))
    }

    /// Comma-separated prefixes for error messages
    pub fn accepted_prefixes() -> String {
        Self::ALL
            .iter()
            .map(|k| k.prefix())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Strip a `d=` prefix and surrounding whitespace from a pasted cookie
pub fn normalize_cookie(cookie: &str) -> &str {
    let cookie = cookie.trim();
    cookie.strip_prefix("d=").unwrap_or(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(TokenKind::from_token("xoxb-1-2-3"), Some(TokenKind::Bot));
        assert_eq!(TokenKind::from_token("xoxp-1"), Some(TokenKind::User));
        assert_eq!(TokenKind::from_token("xoxc-abc"), Some(TokenKind::Browser));
        assert_eq!(
            TokenKind::from_token("xoxe.xoxp-1-abc"),
            Some(TokenKind::RotatingUser)
        );
        assert_eq!(TokenKind::from_token("sk-abc"), None);
        assert_eq!(TokenKind::from_token("xoxb"), None);
    }

    #[test]
    fn test_only_browser_tokens_require_cookie() {
        let needing: Vec<_> = TokenKind::ALL
            .into_iter()
            .filter(|k| k.requires_cookie())
            .collect();
        assert_eq!(needing, vec![TokenKind::Browser]);
    }

    #[test]
    fn test_normalize_cookie() {
        assert_eq!(normalize_cookie(" d=xoxd-abc "), "xoxd-abc");
        assert_eq!(normalize_cookie("xoxd-abc"), "xoxd-abc");
        assert_eq!(normalize_cookie("d="), "");
    }
}
