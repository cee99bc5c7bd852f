//! Meteomatics authentication
//!
//! Access tokens are exchanged for HTTP Basic credentials at the provider's
//! token endpoint. Tokens are short-lived and never persisted.

use std::fmt;

use async_trait::async_trait;

pub mod token_provider;

pub use token_provider::{MeteomaticsTokenProvider, RunScopedTokenSource, TokenResponse};

/// Provider account credentials, passed per call rather than stored in clients
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub username: String,
    pub password: String,
}

impl ProviderCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer credential for the data endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Anything that can hand out an access token for a set of credentials
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire_token(&self, credentials: &ProviderCredentials) -> crate::Result<AccessToken>;
}
