use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use super::{AccessToken, ProviderCredentials, TokenSource};
use crate::error::IngestError;

pub const DEFAULT_TOKEN_URL: &str = "https://login.meteomatics.com/api/v1/token";

/// Body of a successful token response
///
/// Only `access_token` is required; the provider may send more fields.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Parse a token body, rejecting payloads without a usable `access_token`
    pub fn parse(body: &str) -> crate::Result<Self> {
        let response: TokenResponse = serde_json::from_str(body)
            .map_err(|e| IngestError::auth(format!("Malformed token response: {e}")))?;

        if response.access_token.trim().is_empty() {
            return Err(IngestError::auth("Token response carried an empty access_token"));
        }

        Ok(response)
    }
}

/// Token endpoint client
///
/// Every acquisition builds and drops its own HTTP client, so no connection
/// outlives the call and nothing is shared with the data-fetch client.
#[derive(Debug, Clone)]
pub struct MeteomaticsTokenProvider {
    token_url: String,
    timeout: Duration,
}

impl MeteomaticsTokenProvider {
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            token_url: token_url.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl Default for MeteomaticsTokenProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_URL, Duration::from_secs(30))
    }
}

#[async_trait]
impl TokenSource for MeteomaticsTokenProvider {
    #[instrument(name = "acquire_token", level = "debug", skip_all, fields(username = %credentials.username))]
    async fn acquire_token(&self, credentials: &ProviderCredentials) -> crate::Result<AccessToken> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| IngestError::auth(format!("Failed to create token HTTP client: {e}")))?;

        let response = client
            .get(&self.token_url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|e| IngestError::auth(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IngestError::auth(format!(
                "Token endpoint returned {status}: {}",
                error_text.trim()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::auth(format!("Failed to read token response: {e}")))?;

        let token = TokenResponse::parse(&body)?;
        debug!(
            token_type = token.token_type.as_deref().unwrap_or("unspecified"),
            "Acquired access token"
        );
        Ok(AccessToken::new(token.access_token))
    }
}

/// Reuses the first token acquired within one run
///
/// Construct one per run and drop it afterwards. Failed acquisitions are not
/// cached, so the next caller tries again.
pub struct RunScopedTokenSource {
    inner: Arc<dyn TokenSource>,
    cached: AsyncMutex<Option<AccessToken>>,
}

impl RunScopedTokenSource {
    pub fn new(inner: Arc<dyn TokenSource>) -> Self {
        Self {
            inner,
            cached: AsyncMutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for RunScopedTokenSource {
    async fn acquire_token(&self, credentials: &ProviderCredentials) -> crate::Result<AccessToken> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            debug!("Reusing access token for this run");
            return Ok(token.clone());
        }

        let token = self.inner.acquire_token(credentials).await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}
