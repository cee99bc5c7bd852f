//! Shared Key authorisation for the Blob service
//!
//! `Authorization: SharedKey {account}:{signature}` where the signature is the
//! base64 HMAC-SHA256 of the canonical request, keyed with the decoded account key.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::IngestError;

type HmacSha256 = Hmac<Sha256>;

/// `x-ms-date` layout (RFC 1123, always GMT)
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Account name and decoded key
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

/// The parts of a request that go into the signature
#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Percent-encoded URL path as sent, starting with `/`
    pub path: &'a str,
    pub content_length: usize,
    pub content_type: Option<&'a str>,
    /// Every `x-ms-*` header sent with the request
    pub ms_headers: &'a [(&'a str, &'a str)],
}

impl SharedKeyCredential {
    pub fn new(account: impl Into<String>, key_base64: &str) -> crate::Result<Self> {
        let key = STANDARD
            .decode(key_base64.trim())
            .map_err(|_| IngestError::config("Storage AccountKey is not valid base64"))?;

        Ok(Self {
            account: account.into(),
            key,
        })
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Newline-separated string the service recomputes on its side
    #[must_use]
    pub fn string_to_sign(&self, request: &CanonicalRequest<'_>) -> String {
        let content_length = match request.content_length {
            0 => String::new(),
            n => n.to_string(),
        };

        // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
        // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
        // If-Unmodified-Since, Range
        let standard = [
            request.method,
            "",
            "",
            content_length.as_str(),
            "",
            request.content_type.unwrap_or_default(),
            "",
            "",
            "",
            "",
            "",
            "",
        ];

        let mut headers: Vec<(String, &str)> = request
            .ms_headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
            .collect();
        headers.sort();

        let mut out = standard.join("\n");
        out.push('\n');
        for (name, value) in headers {
            out.push_str(&name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('/');
        out.push_str(&self.account);
        out.push_str(request.path);
        out
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self, request: &CanonicalRequest<'_>) -> crate::Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| IngestError::storage(format!("Unable to sign request: {e}")))?;
        mac.update(self.string_to_sign(request).as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.account, signature))
    }
}

impl fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// `x-ms-date` header value for `at`
#[must_use]
pub fn format_ms_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}
