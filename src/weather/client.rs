//! Shared data-fetch client
//!
//! One `reqwest::Client` is built per process and reused for every coordinate;
//! it holds no credentials, those travel in the URL of each request.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::IngestError;

/// Forecast client for the Meteomatics data endpoint
#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: Client,
    base_url: String,
}

impl ForecastClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("meteomatics-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `url` and return the body as text, unmodified
    #[instrument(name = "fetch_forecast", level = "debug", skip_all)]
    pub async fn fetch(&self, url: &str) -> crate::Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::fetch(format!("Request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::fetch(format!("Status code: {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::fetch(format!("Failed to read response body: {}", e.without_url())))?;

        debug!(bytes = body.len(), "Received forecast response");
        Ok(body)
    }
}
