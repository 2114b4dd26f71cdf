//! Credential values held by the store. Tokens are opaque bearer strings; the
//! client never inspects them for expiry and only learns that one expired from
//! a server rejection. Token material is wrapped in `SecretString` so it never
//! appears in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{collections::BTreeSet, fmt};

/// Opaque bearer credential.
#[derive(Clone)]
pub struct Token(SecretString);

impl Token {
    /// Wraps a raw token string. Use [`Token::parse`] for untrusted input.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Parses a stored or received token, treating blank values as absent.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::new(trimmed))
        }
    }
}

impl ExposeSecret<str> for Token {
    fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token([REDACTED])")
    }
}

/// Snapshot of the client's credentials.
///
/// A session with no access token, no refresh token and no roles is the
/// logged-out state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<Token>,
    pub refresh_token: Option<Token>,
    pub roles: BTreeSet<String>,
}

impl Session {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.roles.is_empty()
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Credential payload returned by the login and renewal endpoints.
///
/// Older API revisions answer with `token` instead of `accessToken`; both are
/// accepted, `accessToken` wins when both are present.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CredentialGrant {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
    #[serde(default)]
    roles: Option<Vec<String>>,
}

impl CredentialGrant {
    pub(crate) fn access_token(&self) -> Option<Token> {
        self.access_token
            .as_deref()
            .and_then(Token::parse)
            .or_else(|| self.token.as_deref().and_then(Token::parse))
    }

    pub(crate) fn refresh_token(&self) -> Option<Token> {
        self.refresh_token.as_deref().and_then(Token::parse)
    }

    pub(crate) fn roles(&self) -> BTreeSet<String> {
        self.roles
            .iter()
            .flatten()
            .map(|role| role.trim())
            .filter(|role| !role.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}
