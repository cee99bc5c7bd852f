//! Azure Blob Storage sink over the Blob REST API
//!
//! Requests are authorised either by a shared access signature appended to
//! the URL or by Shared Key signing with the account key, whichever the
//! connection string provides. A signature wins when both are present.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, instrument};

use super::BlobSink;
use super::shared_key::{CanonicalRequest, SharedKeyCredential, format_ms_date};
use crate::error::IngestError;

const API_VERSION: &str = "2021-08-06";
const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Storage emulator account, endpoint and key (publicly documented)
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// How requests to the account are authorised
#[derive(Clone, PartialEq, Eq)]
pub enum StorageAuth {
    /// Query string appended to every blob URL
    Sas(String),
    SharedKey(SharedKeyCredential),
}

impl StorageAuth {
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self {
            StorageAuth::Sas(_) => "sas",
            StorageAuth::SharedKey(_) => "shared_key",
        }
    }
}

/// Parsed storage connection string
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConnection {
    blob_endpoint: String,
    auth: StorageAuth,
}

impl StorageConnection {
    /// Parse `Key=Value;Key=Value` pairs; values may themselves contain `=`
    pub fn parse(connection_string: &str) -> crate::Result<Self> {
        let mut pairs = HashMap::new();
        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                IngestError::config(format!(
                    "Malformed storage connection string segment '{}'",
                    part.split('=').next().unwrap_or_default()
                ))
            })?;
            pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if let Some(flag) = pairs.get("usedevelopmentstorage") {
            if !flag.eq_ignore_ascii_case("true") {
                return Err(IngestError::config(format!(
                    "Unsupported UseDevelopmentStorage value '{flag}'"
                )));
            }
            return Ok(Self {
                blob_endpoint: DEV_BLOB_ENDPOINT.to_string(),
                auth: StorageAuth::SharedKey(SharedKeyCredential::new(DEV_ACCOUNT, DEV_ACCOUNT_KEY)?),
            });
        }

        let blob_endpoint = match pairs.get("blobendpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let account = pairs.get("accountname").ok_or_else(|| {
                    IngestError::config("Storage connection string needs BlobEndpoint or AccountName")
                })?;
                let protocol = pairs
                    .get("defaultendpointsprotocol")
                    .map_or(DEFAULT_PROTOCOL, String::as_str);
                let suffix = pairs
                    .get("endpointsuffix")
                    .map_or(DEFAULT_ENDPOINT_SUFFIX, String::as_str);
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };

        if !blob_endpoint.starts_with("http://") && !blob_endpoint.starts_with("https://") {
            return Err(IngestError::config("Blob endpoint must be a valid HTTP or HTTPS URL"));
        }

        let sas = pairs
            .get("sharedaccesssignature")
            .map(|sas| sas.trim_start_matches('?'))
            .filter(|sas| !sas.is_empty());

        let auth = match (sas, pairs.get("accountkey")) {
            (Some(sas), _) => StorageAuth::Sas(sas.to_string()),
            (None, Some(key)) => {
                let account = pairs.get("accountname").ok_or_else(|| {
                    IngestError::config("Storage connection string has an AccountKey but no AccountName")
                })?;
                StorageAuth::SharedKey(SharedKeyCredential::new(account.as_str(), key)?)
            }
            (None, None) => {
                return Err(IngestError::config(
                    "Storage connection string needs a SharedAccessSignature or AccountName and AccountKey",
                ));
            }
        };

        Ok(Self { blob_endpoint, auth })
    }

    #[must_use]
    pub fn blob_endpoint(&self) -> &str {
        &self.blob_endpoint
    }

    #[must_use]
    pub fn auth(&self) -> &StorageAuth {
        &self.auth
    }

    /// Blob URL, including the SAS query when authorised by signature
    #[must_use]
    pub fn blob_url(&self, container: &str, blob_name: &str) -> String {
        let url = format!(
            "{}/{}/{}",
            self.blob_endpoint,
            urlencoding::encode(container),
            urlencoding::encode(blob_name)
        );
        match &self.auth {
            StorageAuth::Sas(sas) => format!("{url}?{sas}"),
            StorageAuth::SharedKey(_) => url,
        }
    }
}

impl fmt::Debug for StorageConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = match &self.auth {
            StorageAuth::Sas(_) => "sas(<redacted>)".to_string(),
            StorageAuth::SharedKey(credential) => format!("{credential:?}"),
        };
        f.debug_struct("StorageConnection")
            .field("blob_endpoint", &self.blob_endpoint)
            .field("auth", &auth)
            .finish()
    }
}

/// Blob sink backed by an Azure storage account
#[derive(Debug, Clone)]
pub struct AzureBlobSink {
    client: Client,
    connection: StorageConnection,
}

impl AzureBlobSink {
    pub fn new(connection: StorageConnection, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::config(format!("Failed to create storage HTTP client: {e}")))?;

        debug!(
            endpoint = %connection.blob_endpoint(),
            auth = connection.auth().scheme(),
            "Storage sink ready"
        );
        Ok(Self { client, connection })
    }

    pub fn from_connection_string(connection_string: &str, timeout: Duration) -> crate::Result<Self> {
        Self::new(StorageConnection::parse(connection_string)?, timeout)
    }

    /// Add `x-ms-date` and a Shared Key `Authorization` header; SAS requests pass through
    fn authorize(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &str,
        content_length: usize,
        content_type: Option<&str>,
        ms_headers: &[(&str, &str)],
    ) -> crate::Result<RequestBuilder> {
        let StorageAuth::SharedKey(credential) = self.connection.auth() else {
            return Ok(request);
        };

        let parsed = Url::parse(url)
            .map_err(|e| IngestError::storage(format!("Invalid blob URL: {e}")))?;
        let date = format_ms_date(Utc::now());

        let mut headers = vec![("x-ms-date", date.as_str())];
        headers.extend_from_slice(ms_headers);

        let authorization = credential.authorization(&CanonicalRequest {
            method,
            path: parsed.path(),
            content_length,
            content_type,
            ms_headers: &headers,
        })?;

        Ok(request
            .header("x-ms-date", date.as_str())
            .header(AUTHORIZATION, authorization))
    }
}

async fn describe_failure(response: Response) -> String {
    let status = response.status();
    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    match code {
        Some(code) => format!("{status} ({code})"),
        None => status.to_string(),
    }
}

#[async_trait]
impl BlobSink for AzureBlobSink {
    #[instrument(name = "put_blob", level = "debug", skip(self, content), fields(bytes = content.len()))]
    async fn put(&self, container: &str, blob_name: &str, content: &str) -> crate::Result<()> {
        let url = self.connection.blob_url(container, blob_name);

        let request = self
            .client
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(content.to_string());
        let request = self.authorize(
            request,
            "PUT",
            &url,
            content.len(),
            Some(JSON_CONTENT_TYPE),
            &[("x-ms-blob-type", "BlockBlob"), ("x-ms-version", API_VERSION)],
        )?;

        let response = request
            .send()
            .await
            .map_err(|e| IngestError::storage(format!("Upload request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            return Err(IngestError::storage(format!(
                "Upload of {container}/{blob_name} rejected: {detail}"
            )));
        }

        debug!("Blob uploaded");
        Ok(())
    }

    #[instrument(name = "get_blob", level = "debug", skip(self))]
    async fn get(&self, container: &str, blob_name: &str) -> crate::Result<Option<String>> {
        let url = self.connection.blob_url(container, blob_name);

        let request = self.client.get(&url).header("x-ms-version", API_VERSION);
        let request =
            self.authorize(request, "GET", &url, 0, None, &[("x-ms-version", API_VERSION)])?;

        let response = request
            .send()
            .await
            .map_err(|e| IngestError::storage(format!("Download request failed: {}", e.without_url())))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            return Err(IngestError::storage(format!(
                "Download of {container}/{blob_name} rejected: {detail}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::storage(format!("Failed to read blob: {}", e.without_url())))?;
        Ok(Some(body))
    }
}
